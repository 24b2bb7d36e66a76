//! Drive control module
//!
//! Converts body motion commands (twists or per-axle steering demands) into
//! coordinated wheel rate and steering angle demands, while tracking the
//! vehicle's pose through dead-reckoning odometry.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_ackermann;
mod calc_four_wheel_steer;
mod cmd;
mod cmd_buffer;
mod limiter;
mod odometry;
mod params;
mod state;
mod veh_geom;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use cmd_buffer::*;
pub use limiter::*;
pub use odometry::*;
pub use params::*;
pub use state::*;
pub use veh_geom::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Linear speed estimate below which twist commanded steering is held at
/// zero, since the steering angle is undefined for a stationary vehicle.
///
/// Units: meters/second
pub const STEER_VEL_THRESHOLD_MS: f64 = 0.01;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl cyclic processing.
///
/// A processing error aborts the whole cycle, the caller shall keep applying
/// the previous demands.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("NaN {0} reading, aborting the cycle")]
    NanSensorReading(&'static str),
}

/// Possible errors that can occur during DriveCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlInitError {
    #[error("Failed to load the parameter file: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Invalid configuration ({} problems): {}", .0.len(), .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Failed to initialise the archives: {0}")]
    ArchiveInitError(#[from] util::archive::ArchiveError),
}
