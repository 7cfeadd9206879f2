use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, error};

use super::{decode_sample, CaptureError, ImageSource};
use crate::sample::Sample;

/// Runs an external still-capture program once per sample and decodes the
/// image it writes to stdout, e.g. `libcamera-still -n -t 1 --encoding jpg -o -`
/// on a Raspberry Pi or `ffmpeg -f v4l2 -i /dev/video0 -frames:v 1 -f image2pipe -`
/// on a USB webcam.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandSource {
    /// `argv[0]` is the program; the rest are its arguments.
    pub fn new(mut argv: Vec<String>, timeout_secs: u64) -> Self {
        let program = if argv.is_empty() {
            String::new()
        } else {
            argv.remove(0)
        };
        Self {
            program,
            args: argv,
            timeout_secs,
        }
    }
}

impl ImageSource for CommandSource {
    async fn capture(&mut self) -> Result<Sample, CaptureError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout_secs))?
            .map_err(|e| CaptureError::Spawn(self.program.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(program = self.program, status = %output.status, stderr = %stderr, "capture command failed");
            return Err(CaptureError::CommandFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        debug!(
            program = self.program,
            bytes = output.stdout.len(),
            "capture command finished"
        );
        decode_sample(&output.stdout)
    }

    fn name(&self) -> &str {
        "command"
    }
}
