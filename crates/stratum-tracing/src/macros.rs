//! Convenience macros for performance instrumentation.

/// Create a performance span with optional field capture.
///
/// Returns a [`crate::performance::PerformanceSpan`] guard that logs its
/// duration when dropped. With fields, a `debug_span` carrying the fields is
/// entered for the guard's lifetime.
///
/// # Example
///
/// ```rust
/// use stratum_tracing::perf_span;
///
/// {
///     let _span = perf_span!("launch", lanes = 256);
///     // ... timed work ...
/// } // duration logged here
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, None)
    }};
}

/// Emit a standardized performance event at debug level.
///
/// # Example
///
/// ```rust
/// use stratum_tracing::perf_event;
///
/// perf_event!("arena_reserve", bytes = 4096, chunks = 1);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}
