//! # Drive commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};
use structopt::StructOpt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be executed by the drive controller.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, StructOpt)]
pub enum DriveCmd {
    /// A body twist demand.
    ///
    /// The controller translates the twist into coordinated wheel speed (and, on four wheel
    /// steering vehicles, steering angle) demands.
    #[structopt(name = "twist")]
    Twist {
        /// The linear speed of the body in meters/second.
        ///
        /// Positive speeds are "forwards", negative speeds are "backwards"
        lin_ms: f64,

        /// The angular rate of the body in radians/second.
        ///
        /// Follows the right hand rule about the body's Z+ (upwards) axis, so that a positive
        /// rate turns the vehicle to the left, and a negative rate to the right.
        ang_rads: f64
    },

    /// A speed and per-axle steering angle demand.
    ///
    /// Only accepted by four wheel steering vehicles configured for direct axle commands. The
    /// steering angles are passed straight to the steering joints.
    #[structopt(name = "axle")]
    AxleSteer {
        /// The linear speed of the body in meters/second.
        ///
        /// Positive speeds are "forwards", negative speeds are "backwards"
        speed_ms: f64,

        /// The absolute steering angle of the front axle in radians.
        ///
        /// Follows the right hand rule about the body's Z+ (upwards) axis, so that a positive
        /// angle points the wheels to the left.
        front_steer_rad: f64,

        /// The absolute steering angle of the rear axle in radians.
        ///
        /// Follows the right hand rule about the body's Z+ (upwards) axis, so that a positive
        /// angle points the wheels to the left.
        rear_steer_rad: f64
    },

    /// Start the controller, braking the vehicle and reinitialising the odometry before motion
    /// commands are accepted.
    #[structopt(name = "start")]
    Start,

    /// Halt the controller, braking the vehicle. Motion commands are rejected until the next
    /// start.
    #[structopt(name = "halt")]
    Halt
}

/// Errors which can occur when parsing a [`DriveCmd`].
#[derive(Debug, Error)]
pub enum CmdParseError {
    #[error("The command is not valid JSON: {0}")]
    InvalidJson(serde_json::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl DriveCmd {
    /// Parse a command from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, CmdParseError> {
        serde_json::from_str(json_str).map_err(CmdParseError::InvalidJson)
    }

    /// Returns true if all numeric fields of the command are finite.
    pub fn is_valid(&self) -> bool {
        match self {
            DriveCmd::Twist { lin_ms, ang_rads } =>
                lin_ms.is_finite() && ang_rads.is_finite(),
            DriveCmd::AxleSteer {
                speed_ms,
                front_steer_rad,
                rear_steer_rad
            } =>
                speed_ms.is_finite()
                && front_steer_rad.is_finite()
                && rear_steer_rad.is_finite(),
            DriveCmd::Start | DriveCmd::Halt => true
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        let cmd = DriveCmd::from_json(
            r#"{"Twist": {"lin_ms": 0.4, "ang_rads": -0.1}}"#
        ).unwrap();

        match cmd {
            DriveCmd::Twist { lin_ms, ang_rads } => {
                assert_eq!(lin_ms, 0.4);
                assert_eq!(ang_rads, -0.1);
            },
            _ => panic!("expected a twist command")
        }

        assert!(matches!(
            DriveCmd::from_json(r#"{"Halt": null}"#).unwrap(),
            DriveCmd::Halt
        ));

        assert!(DriveCmd::from_json("not json").is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(DriveCmd::Twist { lin_ms: 1.0, ang_rads: 0.0 }.is_valid());
        assert!(!DriveCmd::Twist {
            lin_ms: std::f64::NAN,
            ang_rads: 0.0
        }.is_valid());
        assert!(!DriveCmd::AxleSteer {
            speed_ms: 0.1,
            front_steer_rad: std::f64::INFINITY,
            rear_steer_rad: 0.0
        }.is_valid());
        assert!(DriveCmd::Start.is_valid());
    }
}
