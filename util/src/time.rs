//! Time conversion helpers

/// Convert a chrono duration into fractional seconds.
///
/// Returns `None` when the duration does not fit in nanoseconds, far longer
/// than any session this software runs.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_nanoseconds().map(|ns| ns as f64 * 1.0e-9)
}
