//! # Drive library.
//!
//! This library allows other crates in the workspace (and the benches) to access items defined
//! inside the drive executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable
pub mod data_store;

/// Drive control module - converts body motion commands into individual wheel and steering demands
pub mod drive_ctrl;

/// Simulated joint rig - stands in for the vehicle's wheel and steering hardware
pub mod joint_rig;

/// Telemetry publication - low rate odometry publication to other threads
pub mod telem_pub;
