use std::time::Duration;

mod task;
pub use task::Periodic;

/// Converts a duration to fractional seconds, clamping zero durations to one millisecond so
/// it is always safe to divide by the result.
#[inline]
pub fn secs_f64_nonzero(duration: Duration) -> f64 {
    duration.max(Duration::from_millis(1)).as_secs_f64()
}

#[allow(non_upper_case_globals)]
pub mod constants {
    pub const KiB: u32 = 1024;
    pub const MiB: u32 = 1024 * KiB;
}
