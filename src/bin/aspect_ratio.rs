#![forbid(unsafe_code)]

//! Prints the aspect-ratio category (`portrait`, `landscape` or `other`) of a
//! video file using ffprobe.

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tubely_tools::{
    aspect::AspectClassifier,
    config::{
        DEFAULT_CONFIG_PATH, DEFAULT_FFPROBE_PATH, DEFAULT_PROBE_TIMEOUT_SECS, read_env_config,
    },
    probe::Ffprobe,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify a video's aspect ratio with ffprobe.")]
struct Cli {
    #[arg(value_name = "FILE", help = "Video file to inspect")]
    file: PathBuf,
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Env file providing FFPROBE_PATH and PROBE_TIMEOUT_SECS")]
    config: PathBuf,
    #[arg(
        long = "ffprobe",
        value_name = "PATH",
        help = "ffprobe executable to run (overrides the config file)"
    )]
    ffprobe: Option<PathBuf>,
    #[arg(
        long = "timeout",
        value_name = "SECS",
        help = "Give up when ffprobe runs longer than this (overrides the config file)"
    )]
    timeout_secs: Option<u64>,
    #[arg(
        long = "prefix",
        help = "Print the storage key prefix (e.g. `landscape/`) instead of the bare category"
    )]
    prefix: bool,
}

impl Cli {
    /// Command-line flags win over the env file, which wins over defaults.
    fn probe(&self) -> Result<Ffprobe> {
        let file = read_env_config(&self.config)?.unwrap_or_default();
        let program = self
            .ffprobe
            .clone()
            .or(file.ffprobe_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFPROBE_PATH));
        let timeout = self
            .timeout_secs
            .or(file.probe_timeout_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
        Ok(Ffprobe::new(program, Duration::from_secs(timeout)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let probe = cli.probe()?;
    let ratio = AspectClassifier::new(probe).classify(&cli.file).await?;

    if cli.prefix {
        println!("{}", ratio.key_prefix());
    } else {
        println!("{ratio}");
    }
    Ok(())
}
