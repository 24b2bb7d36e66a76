//! # Simulated joint rig
//!
//! Stands in for the vehicle's motor drivers when running without hardware.
//! Wheel joints track their commanded rate exactly and integrate position,
//! steering joints snap to their commanded angle. Good enough to close the
//! loop for the odometry.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::drive_ctrl::Params;
use veh_if::eqpt::{
    AxisSlot, DriveDems, Joint, JointReadings, NUM_AXIS_SLOTS,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single simulated joint.
pub struct SimJoint {
    kind: JointKind,
    pos_rad: f64,
    vel_rads: f64,
    cmd: f64,
}

/// The simulated rig, one joint per fitted slot.
#[derive(Default)]
pub struct JointRig {
    wheels: [Option<SimJoint>; NUM_AXIS_SLOTS],
    steers: [Option<SimJoint>; NUM_AXIS_SLOTS],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a simulated joint responds to its command.
enum JointKind {
    /// Tracks a rate demand.
    Wheel,

    /// Tracks an absolute position demand.
    Steer,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Joint for SimJoint {
    fn position(&self) -> f64 {
        self.pos_rad
    }

    fn velocity(&self) -> f64 {
        self.vel_rads
    }

    fn set_command(&mut self, value: f64) {
        self.cmd = value;
    }
}

impl SimJoint {
    fn new(kind: JointKind) -> Self {
        Self {
            kind,
            pos_rad: 0.0,
            vel_rads: 0.0,
            cmd: 0.0,
        }
    }

    /// Propagate the joint over `dt_s` seconds.
    fn step(&mut self, dt_s: f64) {
        match self.kind {
            JointKind::Wheel => {
                self.vel_rads = self.cmd;
                self.pos_rad += self.vel_rads * dt_s;
            }
            JointKind::Steer => {
                self.pos_rad = self.cmd;
                self.vel_rads = 0.0;
            }
        }
    }
}

impl JointRig {
    /// Build a rig with a joint for every slot named in the parameters.
    pub fn from_params(ctrl_params: &Params) -> Self {
        let mut rig = Self::default();

        for axle in 0..ctrl_params.left_wheel_joints.len() {
            for slot in
                &[AxisSlot::LEFT_BY_AXLE[axle], AxisSlot::RIGHT_BY_AXLE[axle]]
            {
                rig.wheels[slot.index()] =
                    Some(SimJoint::new(JointKind::Wheel));
            }
        }

        for axle in 0..ctrl_params.left_steer_joints.len() {
            for slot in
                &[AxisSlot::LEFT_BY_AXLE[axle], AxisSlot::RIGHT_BY_AXLE[axle]]
            {
                rig.steers[slot.index()] =
                    Some(SimJoint::new(JointKind::Steer));
            }
        }

        rig
    }

    /// Apply one cycle's demands to the fitted joints.
    pub fn apply(&mut self, dems: &DriveDems) {
        for slot in &AxisSlot::ALL {
            if let Some(joint) = self.wheels[slot.index()].as_mut() {
                joint.set_command(dems.wheel_rate_rads[slot.index()]);
            }
            if let Some(joint) = self.steers[slot.index()].as_mut() {
                joint.set_command(
                    dems.steer_abs_pos_rad[slot.axle().index()],
                );
            }
        }
    }

    /// Propagate all fitted joints over `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        for slot in &AxisSlot::ALL {
            if let Some(joint) = self.wheels[slot.index()].as_mut() {
                joint.step(dt_s);
            }
            if let Some(joint) = self.steers[slot.index()].as_mut() {
                joint.step(dt_s);
            }
        }
    }

    /// Sample the rig. Unfitted slots read zero.
    pub fn readings(&self) -> JointReadings {
        let mut readings = JointReadings::default();

        for slot in &AxisSlot::ALL {
            if let Some(joint) = self.wheels[slot.index()].as_ref() {
                readings.wheel_pos_rad[slot.index()] = joint.position();
                readings.wheel_vel_rads[slot.index()] = joint.velocity();
            }
            if let Some(joint) = self.steers[slot.index()].as_ref() {
                readings.steer_pos_rad[slot.index()] = joint.position();
            }
        }

        readings
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::TopologyKind;

    fn two_axle_params() -> Params {
        Params {
            topology: TopologyKind::FourWheelSteering,
            left_wheel_joints: vec!["wheel_lf".into(), "wheel_lr".into()],
            right_wheel_joints: vec!["wheel_rf".into(), "wheel_rr".into()],
            left_steer_joints: vec!["steer_lf".into(), "steer_lr".into()],
            right_steer_joints: vec!["steer_rf".into(), "steer_rr".into()],
            ..Params::default()
        }
    }

    #[test]
    fn test_wheels_integrate_rate() {
        let mut rig = JointRig::from_params(&two_axle_params());

        let mut dems = DriveDems::default();
        dems.wheel_rate_rads = [2.0; 4];
        rig.apply(&dems);

        for _ in 0..10 {
            rig.step(0.1);
        }

        let readings = rig.readings();
        for slot in &AxisSlot::ALL {
            assert!((readings.wheel_vel_rads[slot.index()] - 2.0).abs() < 1e-9);
            assert!((readings.wheel_pos_rad[slot.index()] - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_steering_snaps_to_angle() {
        let mut rig = JointRig::from_params(&two_axle_params());

        let mut dems = DriveDems::default();
        dems.steer_abs_pos_rad = [0.3, -0.1];
        rig.apply(&dems);
        rig.step(0.1);

        let readings = rig.readings();
        assert_eq!(readings.steer_pos_rad[AxisSlot::LeftFront.index()], 0.3);
        assert_eq!(readings.steer_pos_rad[AxisSlot::RightFront.index()], 0.3);
        assert_eq!(readings.steer_pos_rad[AxisSlot::LeftRear.index()], -0.1);
        assert_eq!(readings.steer_pos_rad[AxisSlot::RightRear.index()], -0.1);
    }

    #[test]
    fn test_unfitted_slots_read_zero() {
        let mut ctrl_params = two_axle_params();
        ctrl_params.left_wheel_joints.truncate(1);
        ctrl_params.right_wheel_joints.truncate(1);
        ctrl_params.left_steer_joints.truncate(1);
        ctrl_params.right_steer_joints.truncate(1);

        let mut rig = JointRig::from_params(&ctrl_params);

        let mut dems = DriveDems::default();
        dems.wheel_rate_rads = [5.0; 4];
        dems.steer_abs_pos_rad = [0.2, 0.4];
        rig.apply(&dems);
        rig.step(1.0);

        let readings = rig.readings();
        assert_eq!(readings.wheel_pos_rad[AxisSlot::LeftRear.index()], 0.0);
        assert_eq!(readings.wheel_vel_rads[AxisSlot::RightRear.index()], 0.0);
        assert_eq!(readings.steer_pos_rad[AxisSlot::LeftRear.index()], 0.0);

        // The fitted front slots still respond
        assert_eq!(readings.wheel_pos_rad[AxisSlot::LeftFront.index()], 5.0);
        assert_eq!(readings.steer_pos_rad[AxisSlot::RightFront.index()], 0.2);
    }
}
