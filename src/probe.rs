//! Running `ffprobe` to inspect media streams.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{process::Command, time};

use crate::aspect::AspectError;

/// Anything that can describe the streams of a media file as ffprobe-style
/// JSON. The classifier only sees the raw stdout bytes.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe_streams(&self, path: &Path) -> Result<Vec<u8>, AspectError>;
}

/// Invokes the ffprobe binary as a child process.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    program: PathBuf,
    timeout: Duration,
}

impl Ffprobe {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MediaProbe for Ffprobe {
    async fn probe_streams(&self, path: &Path) -> Result<Vec<u8>, AspectError> {
        let child = self.command(path).spawn().map_err(|err| {
            AspectError::ProbeFailure(format!(
                "{} is not installed or not runnable: {err}",
                self.program.display()
            ))
        })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AspectError::ProbeFailure(format!(
                    "{} timed out after {:?} on {}",
                    self.program.display(),
                    self.timeout,
                    path.display()
                ))
            })?
            .map_err(|err| AspectError::ProbeFailure(format!("waiting for probe: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AspectError::ProbeFailure(format!(
                "{} failed on {} ({}): {}",
                self.program.display(),
                path.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}
