//! Wheel and steering demand calculation for the four wheel steering topology

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{cmd::BufferedCmd, CmdShape, DriveCtrl, STEER_VEL_THRESHOLD_MS};
use veh_if::eqpt::{AxisSlot, DriveDems, SteerAxle};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Calculate the wheel and steering demands for a four wheel steering
    /// vehicle.
    ///
    /// Wheel speeds come from the limited linear demand and the _measured_
    /// angular rate reported by the odometry, so that the outer wheels speed
    /// up only once the vehicle is actually steering. The front wheels travel
    /// the longer arc and carry the extra `wheel_base * angular` term, the
    /// rear wheels see the plain differential speed.
    ///
    /// Steering demands depend on the command shape:
    ///
    /// - `Twist`: the steering angle is derived from the demanded angular
    ///   rate and the odometry linear speed estimate. Below
    ///   [`STEER_VEL_THRESHOLD_MS`] the angle is indeterminate and both
    ///   axles are held at zero.
    /// - `AxleSteer`: the commanded angles are passed straight through to
    ///   the steering joints, without rate limiting.
    pub(crate) fn calc_four_wheel_steer(
        &mut self,
        lin_ms: f64,
        ang_rads: f64,
        cmd: &BufferedCmd,
    ) -> DriveDems {
        let separation_m = self.effective_wheel_separation_m();
        let radius_m = self.effective_wheel_radius_m();
        let base_m = self.geom.wheel_base_m;
        let ang_est_rads = self.odometry.angular_rads();

        let diff_left_ms = lin_ms - ang_est_rads * separation_m / 2.0;
        let diff_right_ms = lin_ms + ang_est_rads * separation_m / 2.0;
        let cross_ms = base_m * ang_est_rads;

        let mut dems = DriveDems::default();

        dems.wheel_rate_rads[AxisSlot::LeftFront.index()] = lin_ms.signum()
            * (diff_left_ms.powi(2) + cross_ms.powi(2)).sqrt()
            / radius_m;
        dems.wheel_rate_rads[AxisSlot::RightFront.index()] = lin_ms.signum()
            * (diff_right_ms.powi(2) + cross_ms.powi(2)).sqrt()
            / radius_m;
        dems.wheel_rate_rads[AxisSlot::LeftRear.index()] =
            diff_left_ms / radius_m;
        dems.wheel_rate_rads[AxisSlot::RightRear.index()] =
            diff_right_ms / radius_m;

        let (front_steer_rad, rear_steer_rad) = match self.cmd_shape {
            CmdShape::Twist => {
                let lin_est_ms = self.odometry.linear_ms();

                if lin_est_ms.abs() > STEER_VEL_THRESHOLD_MS {
                    let steer_rad = (ang_rads * base_m / lin_est_ms).atan();
                    (steer_rad / 2.0, -steer_rad / 2.0)
                } else {
                    // Too slow to derive a meaningful angle, hold straight
                    self.report.steer_held_zero = true;
                    (0.0, 0.0)
                }
            }
            CmdShape::AxleSteer => (cmd.front_steer_rad, cmd.rear_steer_rad),
        };

        dems.steer_abs_pos_rad[SteerAxle::Front.index()] = front_steer_rad;
        dems.steer_abs_pos_rad[SteerAxle::Rear.index()] = rear_steer_rad;

        dems
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use crate::drive_ctrl::state::test_util::{fws_params, running_ctrl};
    use crate::drive_ctrl::state::InputData;
    use veh_if::eqpt::{AxisSlot, JointReadings, SteerAxle};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    /// Run one closed loop cycle so the odometry holds a known estimate.
    ///
    /// All wheels spin at `wheel_vel_rads` and the front axle is steered to
    /// `steer_pos_rad`.
    fn prime_odometry(
        ctrl: &mut crate::drive_ctrl::DriveCtrl,
        wheel_vel_rads: f64,
        steer_pos_rad: f64,
    ) {
        use util::module::State;

        let mut readings = JointReadings::default();
        readings.wheel_vel_rads = [wheel_vel_rads; 4];
        readings.steer_pos_rad[AxisSlot::LeftFront.index()] = steer_pos_rad;
        readings.steer_pos_rad[AxisSlot::RightFront.index()] = steer_pos_rad;

        ctrl.proc(&InputData {
            readings,
            time_s: 0.1,
        })
        .unwrap();
    }

    #[test]
    fn test_straight_line_rates() {
        let (mut ctrl, _sender) = running_ctrl(fws_params());

        // No angular estimate, so all four wheels see the plain rate. With
        // 0.5 m wheels 1 m/s is 2 rad/s.
        let cmd = Default::default();
        let dems = ctrl.calc_four_wheel_steer(1.0, 0.0, &cmd);
        for slot in &AxisSlot::ALL {
            assert_close(dems.wheel_rate_rads[slot.index()], 2.0);
        }
    }

    #[test]
    fn test_reverse_flips_front_sign() {
        let (mut ctrl, _sender) = running_ctrl(fws_params());

        let cmd = Default::default();
        let dems = ctrl.calc_four_wheel_steer(-1.0, 0.0, &cmd);
        for slot in &AxisSlot::ALL {
            assert_close(dems.wheel_rate_rads[slot.index()], -2.0);
        }
    }

    #[test]
    fn test_turning_rates_use_measured_angular() {
        let (mut ctrl, _sender) = running_ctrl(fws_params());

        // Steer the front axle and spin the wheels so the single track model
        // reports a real angular rate: lin = 2 rad/s * 0.5 m = 1 m/s,
        // ang = lin * tan(0.2) / wheel_base
        prime_odometry(&mut ctrl, 2.0, 0.2);
        let ang_est = 1.0 * 0.2f64.tan() / 2.0;
        assert_close(ctrl.odometry().angular_rads(), ang_est);

        let cmd = Default::default();
        let dems = ctrl.calc_four_wheel_steer(1.0, 0.0, &cmd);

        let diff_left = 1.0 - ang_est * 1.0 / 2.0;
        let diff_right = 1.0 + ang_est * 1.0 / 2.0;
        let cross = 2.0 * ang_est;

        // Rear wheels carry the differential term only
        assert_close(
            dems.wheel_rate_rads[AxisSlot::LeftRear.index()],
            diff_left / 0.5,
        );
        assert_close(
            dems.wheel_rate_rads[AxisSlot::RightRear.index()],
            diff_right / 0.5,
        );

        // Front wheels travel the longer arc over the wheel base
        assert_close(
            dems.wheel_rate_rads[AxisSlot::LeftFront.index()],
            (diff_left.powi(2) + cross.powi(2)).sqrt() / 0.5,
        );
        assert_close(
            dems.wheel_rate_rads[AxisSlot::RightFront.index()],
            (diff_right.powi(2) + cross.powi(2)).sqrt() / 0.5,
        );

        // Turning left, so the right side is faster and the fronts are
        // faster than their rears
        assert!(
            dems.wheel_rate_rads[AxisSlot::RightRear.index()]
                > dems.wheel_rate_rads[AxisSlot::LeftRear.index()]
        );
        assert!(
            dems.wheel_rate_rads[AxisSlot::LeftFront.index()]
                > dems.wheel_rate_rads[AxisSlot::LeftRear.index()]
        );
    }

    #[test]
    fn test_twist_steering_split_between_axles() {
        let (mut ctrl, _sender) = running_ctrl(fws_params());

        // 1 m/s linear estimate, wheels straight
        prime_odometry(&mut ctrl, 2.0, 0.0);
        assert_close(ctrl.odometry().linear_ms(), 1.0);

        // atan(0.5 * 2.0 / 1.0) split between the axles
        let cmd = Default::default();
        let dems = ctrl.calc_four_wheel_steer(1.0, 0.5, &cmd);
        let steer = 1.0f64.atan();
        assert_close(
            dems.steer_abs_pos_rad[SteerAxle::Front.index()],
            steer / 2.0,
        );
        assert_close(
            dems.steer_abs_pos_rad[SteerAxle::Rear.index()],
            -steer / 2.0,
        );
        assert!(!ctrl.report.steer_held_zero);
    }

    #[test]
    fn test_twist_steering_held_zero_at_low_speed() {
        let (mut ctrl, _sender) = running_ctrl(fws_params());

        // No linear estimate, the steering angle is indeterminate
        let cmd = Default::default();
        let dems = ctrl.calc_four_wheel_steer(0.0, 0.5, &cmd);
        assert_eq!(dems.steer_abs_pos_rad, [0.0, 0.0]);
        assert!(ctrl.report.steer_held_zero);
    }
}
