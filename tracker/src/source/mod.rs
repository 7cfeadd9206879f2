//! Camera backends that deliver one grayscale still per `capture` call.
//!
//! - `command`: spawn a still-capture program and read the image from stdout
//! - `http`: fetch a single-frame snapshot endpoint
//!
//! Every backend decodes whatever image format it receives and converts it to
//! 8-bit luma before handing it to the sampler. A failed capture is returned
//! as an error and never replaced by a partial or stale frame.

mod command;
mod http;

use std::io::Cursor;

use image::ImageReader;
use sleep_tracker_common::config::CameraConfig;

use crate::sample::{now_secs, Sample};

pub use command::CommandSource;
pub use http::HttpSnapshotSource;

/// Something that can take a still picture on demand.
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    /// Block until one complete frame is available.
    async fn capture(&mut self) -> Result<Sample, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to spawn capture command {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("capture command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("capture did not complete within {0}s")]
    Timeout(u64),
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to decode captured image: {0}")]
    Decode(String),
}

/// The backends `main` can build from config.
pub enum CameraSource {
    Command(CommandSource),
    Http(HttpSnapshotSource),
}

impl CameraSource {
    pub fn from_config(config: &CameraConfig) -> Result<Self, CaptureError> {
        match config.mode.as_str() {
            "http" => Ok(Self::Http(HttpSnapshotSource::new(
                &config.url,
                config.timeout_secs,
            )?)),
            _ => Ok(Self::Command(CommandSource::new(
                config.command.clone(),
                config.timeout_secs,
            ))),
        }
    }
}

impl ImageSource for CameraSource {
    async fn capture(&mut self) -> Result<Sample, CaptureError> {
        match self {
            Self::Command(source) => source.capture().await,
            Self::Http(source) => source.capture().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Command(source) => source.name(),
            Self::Http(source) => source.name(),
        }
    }
}

/// Decode an encoded still (JPEG, PNG, ...) into a grayscale sample stamped
/// with the current time.
pub(crate) fn decode_sample(encoded: &[u8]) -> Result<Sample, CaptureError> {
    let img = ImageReader::new(Cursor::new(encoded))
        .with_guessed_format()
        .map_err(|e| CaptureError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CaptureError::Decode(e.to_string()))?;
    Ok(Sample::new(img.to_luma8(), now_secs()))
}
