mod window;

use std::time::Duration;

use sleep_tracker_common::config::SamplingConfig;
use sleep_tracker_common::record::{encode_batch, DifferenceRecord};
use tracing::{debug, info, warn};

use crate::diff::{compute_differences, DiffError, Differences};
use crate::sample::Sample;
use crate::shutdown::ShutdownFlag;
use crate::sink::{LogSink, SinkError};
use crate::source::{CaptureError, ImageSource};

use window::{ReferenceWindow, WindowBuffer};

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("run log failed: {0}")]
    Sink(#[from] SinkError),
    #[error("comparison failed: {0}")]
    Diff(#[from] DiffError),
}

/// Where the loop is in its capture/compare/log cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Sampling,
    WindowClosed,
    Continuing,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub delay_secs: f64,
    pub pause: Duration,
    /// Write a partially filled window on graceful shutdown. Off by default:
    /// the open window is dropped.
    pub flush_on_shutdown: bool,
}

impl From<&SamplingConfig> for SamplerSettings {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            delay_secs: config.delay_secs,
            // Validated configs always fit; anything larger just never wakes.
            pause: Duration::try_from_secs_f64(config.pause_secs).unwrap_or(Duration::MAX),
            flush_on_shutdown: config.flush_on_shutdown,
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: u64,
    pub windows_flushed: u64,
    pub records_written: u64,
    pub discarded_records: u64,
}

/// The reference and current slots. Only exists once both have been captured,
/// so nothing can be compared against a missing reference.
struct Slots {
    reference: Sample,
    current: Sample,
}

/// Samples the camera until shutdown is requested, comparing each sample with
/// the one before it and with the window's reference sample, and appending one
/// log line per closed window.
pub struct SamplingLoop<S, K> {
    source: S,
    sink: K,
    shutdown: ShutdownFlag,
    settings: SamplerSettings,
    window: ReferenceWindow,
    buffer: WindowBuffer,
    phase: Phase,
    summary: RunSummary,
    /// Capture time of the reference sample the open window is measured from.
    reference_at: f64,
}

impl<S: ImageSource, K: LogSink> SamplingLoop<S, K> {
    pub fn new(source: S, sink: K, shutdown: ShutdownFlag, settings: SamplerSettings) -> Self {
        Self {
            source,
            sink,
            shutdown,
            window: ReferenceWindow::new(settings.delay_secs),
            settings,
            buffer: WindowBuffer::default(),
            phase: Phase::Initializing,
            summary: RunSummary::default(),
            reference_at: 0.0,
        }
    }

    #[cfg(test)]
    fn phase(&self) -> Phase {
        self.phase
    }

    /// Run until shutdown is requested or a capture/write fails.
    ///
    /// The sink is closed on every exit path, errors included.
    pub async fn run(&mut self) -> Result<RunSummary, SamplerError> {
        let outcome = self.drive().await;

        self.enter(Phase::ShuttingDown);
        let closed = self.sink.close();
        self.enter(Phase::Stopped);

        match outcome {
            Ok(()) => {
                closed?;
                Ok(self.summary)
            }
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close run log after error");
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), SamplerError> {
        self.enter(Phase::Initializing);
        let mut slots = self.initialize().await?;
        info!(
            source = self.source.name(),
            delay_secs = self.window.delay_secs(),
            "sampling started"
        );

        while !self.shutdown.is_requested() {
            self.enter(Phase::Sampling);
            let previous = self.update_current(&mut slots).await?;

            if self.is_window_elapsed(&slots) {
                self.enter(Phase::WindowClosed);
                self.flush_window()?;
                self.update_reference(&mut slots).await?;
            } else {
                self.enter(Phase::Continuing);
                let diffs = self.compute_differences(&previous, &slots)?;
                let record = DifferenceRecord::new(
                    slots.current.captured_at(),
                    diffs.vs_previous,
                    diffs.vs_reference,
                );
                debug!(
                    time = record.time,
                    last_frame_diff = diffs.vs_previous,
                    keyframe_diff = diffs.vs_reference,
                    buffered = self.buffer.len() + 1,
                    "sample compared"
                );
                self.buffer.push(record);
                tokio::time::sleep(self.settings.pause).await;
            }
        }

        if self.settings.flush_on_shutdown && !self.buffer.is_empty() {
            info!(records = self.buffer.len(), "flushing open window on shutdown");
            self.flush_window()?;
        } else if !self.buffer.is_empty() {
            self.summary.discarded_records = self.buffer.len() as u64;
            info!(
                records = self.buffer.len(),
                "dropping records of the open window on shutdown"
            );
        }
        Ok(())
    }

    async fn capture(&mut self) -> Result<Sample, CaptureError> {
        let sample = self.source.capture().await?;
        self.summary.samples += 1;
        Ok(sample)
    }

    /// Capture the first reference sample, then the first current sample.
    async fn initialize(&mut self) -> Result<Slots, CaptureError> {
        let reference = self.capture().await?;
        let current = self.capture().await?;
        debug!(
            reference_at = reference.captured_at(),
            current_at = current.captured_at(),
            "initial samples captured"
        );
        self.reference_at = reference.captured_at();
        Ok(Slots { reference, current })
    }

    /// Capture a fresh reference sample, opening the next window at its
    /// capture time.
    async fn update_reference(&mut self, slots: &mut Slots) -> Result<(), CaptureError> {
        slots.reference = self.capture().await?;
        let reference_at = slots.reference.captured_at();
        debug_assert!(
            reference_at >= self.reference_at,
            "reference moved backwards: {reference_at} < {}",
            self.reference_at
        );
        debug!(
            reference_at,
            previous_reference_at = self.reference_at,
            "new reference sample"
        );
        self.reference_at = reference_at;
        Ok(())
    }

    /// Capture a new current sample and hand back the one it replaces.
    async fn update_current(&mut self, slots: &mut Slots) -> Result<Sample, CaptureError> {
        let next = self.capture().await?;
        Ok(std::mem::replace(&mut slots.current, next))
    }

    fn is_window_elapsed(&self, slots: &Slots) -> bool {
        self.window.is_elapsed(&slots.reference, &slots.current)
    }

    fn compute_differences(
        &self,
        previous: &Sample,
        slots: &Slots,
    ) -> Result<Differences, DiffError> {
        compute_differences(previous, &slots.current, &slots.reference)
    }

    /// Append the buffered window as one line and start an empty buffer.
    fn flush_window(&mut self) -> Result<(), SamplerError> {
        let line = encode_batch(self.buffer.records()).map_err(SinkError::from)?;
        self.sink.append_line(&line)?;

        let records = self.buffer.len() as u64;
        self.buffer.clear();
        self.summary.windows_flushed += 1;
        self.summary.records_written += records;
        info!(
            records,
            windows = self.summary.windows_flushed,
            window_start = self.reference_at,
            "window closed, batch written"
        );
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "sampler phase");
            self.phase = phase;
        }
    }

    #[cfg(test)]
    fn reference_at(&self) -> f64 {
        self.reference_at
    }

    #[cfg(test)]
    fn sink(&self) -> &K {
        &self.sink
    }
}
