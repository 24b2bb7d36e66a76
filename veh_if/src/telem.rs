//! # Controller telemetry definitions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Odometry state published by the drive controller.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct OdomTm {
    /// Session time at which this state was computed.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Position of the base frame in the odometry frame.
    ///
    /// Units: meters
    pub x_m: f64,

    /// Position of the base frame in the odometry frame.
    ///
    /// Units: meters
    pub y_m: f64,

    /// Heading of the base frame in the odometry frame. Accumulated, not
    /// wrapped into [-pi, pi].
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Heading as a quaternion in (x, y, z, w) order.
    pub orientation_quat: [f64; 4],

    /// Estimated linear speed of the base.
    ///
    /// Units: meters/second
    pub linear_ms: f64,

    /// Estimated angular rate of the base.
    ///
    /// Units: radians/second
    pub angular_rads: f64,

    /// Diagonal of the pose covariance matrix, in (x, y, z, roll, pitch, yaw)
    /// order.
    pub pose_cov_diag: [f64; 6],

    /// Diagonal of the twist covariance matrix, in (x, y, z, roll, pitch,
    /// yaw) order.
    pub twist_cov_diag: [f64; 6],
}

/// Transform from the odometry frame to the vehicle base frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformTm {
    /// Session time of the transform.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Name of the parent (odometry) frame.
    pub parent_frame: String,

    /// Name of the child (base) frame.
    pub child_frame: String,

    /// Translation from parent to child.
    ///
    /// Units: meters
    pub translation_m: [f64; 3],

    /// Rotation from parent to child as a quaternion in (x, y, z, w) order.
    pub rotation_quat: [f64; 4],
}
