use sleep_tracker_common::record::DifferenceRecord;

use crate::sample::Sample;

/// The span during which one reference sample stays fixed.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceWindow {
    delay_secs: f64,
}

impl ReferenceWindow {
    pub fn new(delay_secs: f64) -> Self {
        Self { delay_secs }
    }

    pub fn delay_secs(&self) -> f64 {
        self.delay_secs
    }

    /// True once `current` is strictly more than `delay` seconds after `reference`.
    pub fn is_elapsed(&self, reference: &Sample, current: &Sample) -> bool {
        is_window_elapsed(reference.captured_at(), current.captured_at(), self.delay_secs)
    }
}

pub fn is_window_elapsed(reference_at: f64, current_at: f64, delay_secs: f64) -> bool {
    current_at - reference_at > delay_secs
}

/// Records collected against the current reference sample, written out as
/// one batch when the window closes.
#[derive(Debug, Default)]
pub struct WindowBuffer {
    records: Vec<DifferenceRecord>,
}

impl WindowBuffer {
    pub fn push(&mut self, record: DifferenceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DifferenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Empty the buffer for the next window.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn at(t: f64) -> Sample {
        Sample::new(GrayImage::new(1, 1), t)
    }

    #[test]
    fn equality_does_not_close_the_window() {
        assert!(!is_window_elapsed(0.0, 10.0, 10.0));
        assert!(is_window_elapsed(0.0, 10.000001, 10.0));
        assert!(!is_window_elapsed(100.0, 105.0, 10.0));
    }

    #[test]
    fn window_uses_sample_timestamps() {
        let window = ReferenceWindow::new(10.0);
        assert!(!window.is_elapsed(&at(1000.0), &at(1009.9)));
        assert!(!window.is_elapsed(&at(1000.0), &at(1010.0)));
        assert!(window.is_elapsed(&at(1000.0), &at(1011.0)));
    }

    #[test]
    fn zero_delay_closes_on_any_later_sample() {
        let window = ReferenceWindow::new(0.0);
        assert!(!window.is_elapsed(&at(5.0), &at(5.0)));
        assert!(window.is_elapsed(&at(5.0), &at(5.5)));
    }

    #[test]
    fn buffer_keeps_insertion_order_until_cleared() {
        let mut buffer = WindowBuffer::default();
        assert!(buffer.is_empty());
        buffer.push(DifferenceRecord::new(1.0, 0, 0));
        buffer.push(DifferenceRecord::new(2.0, 5, 9));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.records()[1].time, "2");

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
