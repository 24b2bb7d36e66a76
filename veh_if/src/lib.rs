//! # Vehicle interface crate.
//!
//! Provides the common interfaces between the drive controller, the vehicle
//! equipment and any command sources.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive command definitions
pub mod cmd;

/// Joint-level definitions for the vehicle equipment (wheels and steering)
pub mod eqpt;

/// Telemetry definitions published by the controller
pub mod telem;
