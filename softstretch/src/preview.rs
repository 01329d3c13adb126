//! Live preview of the soft stretch while the user edits settings.
//!
//! A [`PreviewSession`] holds the histogram and medians captured once for the
//! view and recomputes the stretch on demand. Updates never queue: a request
//! that arrives while another computation is running is dropped, and the
//! caller simply asks again on the next settings change.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::config::SoftStretchConfig;
use crate::histogram::{Histogram, HistogramError};
use crate::pipeline::{soft_stretch, SoftStretch, StretchError};

/// Histogram and medians of the previewed view.
#[derive(Debug)]
pub struct PreviewSession {
    histogram: Histogram,
    medians: Vec<f64>,
    busy: AtomicBool,
}

/// Clears the busy flag when the update finishes, including on panic.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PreviewSession {
    pub fn new(histogram: Histogram, medians: Vec<f64>) -> Result<Self, HistogramError> {
        histogram.validate_medians(&medians)?;
        Ok(Self {
            histogram,
            medians,
            busy: AtomicBool::new(false),
        })
    }

    /// Capture the session with medians taken from the histogram itself.
    pub fn from_histogram(histogram: Histogram) -> Self {
        let medians = histogram.medians();
        Self {
            histogram,
            medians,
            busy: AtomicBool::new(false),
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Recompute the stretch for `config`.
    ///
    /// Returns None when another update is still running.
    pub fn try_update(
        &self,
        config: &SoftStretchConfig,
    ) -> Option<Result<SoftStretch, StretchError>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Preview update skipped, previous update still running");
            return None;
        }
        let _guard = BusyGuard(&self.busy);

        Some(soft_stretch(&self.histogram, &self.medians, config))
    }
}
