//! In-memory histogram of refresh-cycle durations.
//! The orchestrator records one sample per completed cycle, the API reads.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::{AppError, Result};

/// Longest cycle tracked exactly: one hour, in milliseconds.
const MAX_TRACKED_MS: u64 = 3_600_000;

/// Values stored in milliseconds.
pub struct CycleStats {
    inner: Mutex<Histogram<u64>>,
}

impl CycleStats {
    /// Tracks 1 ms to 1 h, 3 significant figures.
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_MS, 3)
            .map_err(|e| AppError::Config(format!("cycle histogram: {e:?}")))?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    pub fn record_ms(&self, ms: u64) {
        if let Ok(mut h) = self.inner.lock() {
            h.saturating_record(ms);
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        self.record_ms(ms);
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        (
            Some(h.value_at_quantile(0.5)),
            Some(h.value_at_quantile(0.95)),
            Some(h.value_at_quantile(0.99)),
        )
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}
