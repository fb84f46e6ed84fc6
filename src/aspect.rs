//! Coarse aspect-ratio classification of video files.
//!
//! Only the first stream reported by the probe is considered, and only its
//! width and height. The bands are open intervals around 9:16 and 16:9;
//! everything else, including zero or missing dimensions, is `other`.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::MediaProbe;

const PORTRAIT_BAND: (f64, f64) = (0.55, 0.60);
const LANDSCAPE_BAND: (f64, f64) = (1.75, 1.80);

#[derive(Debug, Error)]
pub enum AspectError {
    #[error("media probe failed: {0}")]
    ProbeFailure(String),
    #[error("unexpected probe output: {0}")]
    MalformedProbeOutput(#[source] serde_json::Error),
    #[error("probe reported no streams")]
    NoStreamsFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Portrait,
    Landscape,
    Other,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Portrait => "portrait",
            AspectRatio::Landscape => "landscape",
            AspectRatio::Other => "other",
        }
    }

    /// Storage key prefix used to group uploaded videos by orientation.
    pub fn key_prefix(self) -> String {
        format!("{}/", self.as_str())
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of `ffprobe -show_streams -print_format json` we read.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeOutput {
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

fn within(ratio: f64, (low, high): (f64, f64)) -> bool {
    ratio > low && ratio < high
}

pub fn classify_ratio(ratio: f64) -> AspectRatio {
    if within(ratio, PORTRAIT_BAND) {
        AspectRatio::Portrait
    } else if within(ratio, LANDSCAPE_BAND) {
        AspectRatio::Landscape
    } else {
        AspectRatio::Other
    }
}

/// `0 / 0` is NaN and `n / 0` is infinite; both land in `Other`.
pub fn classify_dimensions(width: i64, height: i64) -> AspectRatio {
    classify_ratio(width as f64 / height as f64)
}

pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeOutput, AspectError> {
    serde_json::from_slice(stdout).map_err(AspectError::MalformedProbeOutput)
}

pub fn classify_probe_output(stdout: &[u8]) -> Result<AspectRatio, AspectError> {
    let output = parse_probe_output(stdout)?;
    let first = output.streams.first().ok_or(AspectError::NoStreamsFound)?;
    Ok(classify_dimensions(
        first.width.unwrap_or(0),
        first.height.unwrap_or(0),
    ))
}

pub struct AspectClassifier<P> {
    probe: P,
}

impl<P: MediaProbe> AspectClassifier<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn classify(&self, path: &Path) -> Result<AspectRatio, AspectError> {
        let stdout = self.probe.probe_streams(path).await?;
        let ratio = classify_probe_output(&stdout)?;
        tracing::debug!(%ratio, "classified video");
        Ok(ratio)
    }
}
