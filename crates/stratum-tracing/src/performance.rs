//! Drop-guard timing for performance spans.

use std::time::Instant;

/// Timing guard logged when dropped.
///
/// Created by the [`perf_span!`](crate::perf_span) macro; the elapsed time is
/// emitted as a `debug` event when the guard leaves scope. When a threshold
/// is given, spans shorter than the threshold are dropped silently.
#[derive(Debug)]
pub struct PerformanceSpan {
    name: &'static str,
    threshold_us: Option<u64>,
    started: Instant,
}

impl PerformanceSpan {
    /// Start timing a named span.
    pub fn new(name: &'static str, threshold_us: Option<u64>) -> Self {
        Self {
            name,
            threshold_us,
            started: Instant::now(),
        }
    }

    /// Name of the span being timed.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let duration_us = self.started.elapsed().as_micros() as u64;
        if let Some(threshold) = self.threshold_us {
            if duration_us < threshold {
                return;
            }
        }
        tracing::debug!(
            target: "perf",
            span = self.name,
            duration_us = duration_us,
            "perf_span_complete"
        );
    }
}
