//! # Vehicle equipment interface
//!
//! Joint-level definitions shared by the drive controller and whatever backs
//! the wheels and steering, be that real drivers or a simulated rig.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of joint slots on the vehicle, one per corner.
pub const NUM_AXIS_SLOTS: usize = 4;

/// Number of steering axles on the vehicle.
pub const NUM_STEER_AXLES: usize = 2;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Position of a wheel or steering joint on the vehicle.
///
/// Vehicles with a single driven axle use the front pair of slots and leave
/// the rear pair unused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisSlot {
    LeftFront,
    RightFront,
    LeftRear,
    RightRear
}

/// A steering axle of the vehicle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SteerAxle {
    Front,
    Rear
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A single controllable joint of the vehicle.
///
/// Wheel joints take rate commands in radians/second, steering joints take
/// absolute position commands in radians.
pub trait Joint {
    /// Current position of the joint in radians.
    fn position(&self) -> f64;

    /// Current rate of the joint in radians/second.
    fn velocity(&self) -> f64;

    /// Set the demand for this joint.
    fn set_command(&mut self, value: f64);
}

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Joint readings sampled at the start of a control cycle.
///
/// Slots which are not fitted on the vehicle shall read zero.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct JointReadings {
    /// Accumulated position of each wheel joint.
    ///
    /// Units: radians
    pub wheel_pos_rad: [f64; NUM_AXIS_SLOTS],

    /// Rate of each wheel joint.
    ///
    /// Units: radians/second
    pub wheel_vel_rads: [f64; NUM_AXIS_SLOTS],

    /// Absolute position of each steering joint.
    ///
    /// Units: radians
    pub steer_pos_rad: [f64; NUM_AXIS_SLOTS],
}

/// Demands produced by the drive controller for one cycle.
///
/// The default value is a brake: all wheel rates zero and all steering axles
/// at zero angle.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriveDems {
    /// Demanded rate of each wheel joint.
    ///
    /// Units: radians/second
    pub wheel_rate_rads: [f64; NUM_AXIS_SLOTS],

    /// Demanded absolute steering angle of each axle. Both joints of an axle
    /// get the same angle.
    ///
    /// Units: radians
    pub steer_abs_pos_rad: [f64; NUM_STEER_AXLES],
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl AxisSlot {
    /// All slots in index order.
    pub const ALL: [AxisSlot; NUM_AXIS_SLOTS] = [
        AxisSlot::LeftFront,
        AxisSlot::RightFront,
        AxisSlot::LeftRear,
        AxisSlot::RightRear
    ];

    /// Left hand slot of each axle, indexed front to rear.
    pub const LEFT_BY_AXLE: [AxisSlot; NUM_STEER_AXLES] =
        [AxisSlot::LeftFront, AxisSlot::LeftRear];

    /// Right hand slot of each axle, indexed front to rear.
    pub const RIGHT_BY_AXLE: [AxisSlot; NUM_STEER_AXLES] =
        [AxisSlot::RightFront, AxisSlot::RightRear];

    /// Index of this slot into the joint arrays.
    pub fn index(&self) -> usize {
        match self {
            AxisSlot::LeftFront => 0,
            AxisSlot::RightFront => 1,
            AxisSlot::LeftRear => 2,
            AxisSlot::RightRear => 3
        }
    }

    /// The axle this slot belongs to.
    pub fn axle(&self) -> SteerAxle {
        match self {
            AxisSlot::LeftFront | AxisSlot::RightFront => SteerAxle::Front,
            AxisSlot::LeftRear | AxisSlot::RightRear => SteerAxle::Rear
        }
    }
}

impl SteerAxle {
    /// Index of this axle into per-axle arrays.
    pub fn index(&self) -> usize {
        match self {
            SteerAxle::Front => 0,
            SteerAxle::Rear => 1
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
