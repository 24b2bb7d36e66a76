//! Wheel demand calculation for the ackermann topology

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::DriveCtrl;
use veh_if::eqpt::{AxisSlot, DriveDems};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Calculate the wheel demands for an ackermann vehicle from the limited
    /// body twist.
    ///
    /// Only wheel speeds are commanded. The steering joints are driven by
    /// hardware outside this controller, so their demands are simply carried
    /// over from the previous cycle (zero after a brake).
    pub(crate) fn calc_ackermann(
        &mut self,
        lin_ms: f64,
        ang_rads: f64,
    ) -> DriveDems {
        let separation_m = self.effective_wheel_separation_m();
        let radius_m = self.effective_wheel_radius_m();

        // Differential speeds about the turn centre, in wheel rate units
        let rate_left_rads =
            (lin_ms - ang_rads * separation_m / 2.0) / radius_m;
        let rate_right_rads =
            (lin_ms + ang_rads * separation_m / 2.0) / radius_m;

        let mut dems = DriveDems::default();

        for axle in 0..self.num_axles {
            dems.wheel_rate_rads[AxisSlot::LEFT_BY_AXLE[axle].index()] =
                rate_left_rads;
            dems.wheel_rate_rads[AxisSlot::RIGHT_BY_AXLE[axle].index()] =
                rate_right_rads;
        }

        dems.steer_abs_pos_rad = self.held_dems.steer_abs_pos_rad;

        dems
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
