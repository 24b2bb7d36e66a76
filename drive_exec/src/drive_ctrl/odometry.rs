//! Dead-reckoning odometry
//!
//! Integrates wheel and steering readings (or, in open loop, the commanded
//! velocities) into a pose estimate in the odometry frame. Both vehicle
//! topologies reduce to a single-track model: the linear speed comes from the
//! averaged wheels and the yaw rate from the averaged front steering angle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use util::maths::RollingMean;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Heading change per step below which the exact arc equations degenerate
/// and the second order Runge-Kutta midpoint is used instead.
///
/// Units: radians
const ANG_STEP_EXACT_THRESHOLD_RAD: f64 = 1e-6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Source of the linear velocity estimate in closed loop updates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VelocitySource {
    /// Differentiate the accumulated wheel position between updates. Used by
    /// vehicles whose wheel joints report position only.
    DeltaPosition,

    /// Use the wheel velocity reading directly.
    MeasuredVelocity,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Odometry state of the vehicle.
#[derive(Debug, Clone)]
pub struct Odometry {
    // Pose in the odometry frame
    x_m: f64,
    y_m: f64,
    heading_rad: f64,

    // Smoothed velocity estimates
    linear_ms: f64,
    angular_rads: f64,

    wheel_base_m: f64,
    vel_source: VelocitySource,

    linear_mean: RollingMean,
    angular_mean: RollingMean,

    last_update_time_s: f64,

    /// Wheel position at the previous update, `None` until the first update
    /// after an init so the first step never sees a position jump.
    wheel_pos_prev_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Odometry {
    fn default() -> Self {
        Self::new(1.0, VelocitySource::DeltaPosition, 10)
    }
}

impl Odometry {
    /// Create a new odometry state.
    pub fn new(
        wheel_base_m: f64,
        vel_source: VelocitySource,
        rolling_window_size: usize,
    ) -> Self {
        Self {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            linear_ms: 0.0,
            angular_rads: 0.0,
            wheel_base_m,
            vel_source,
            linear_mean: RollingMean::new(rolling_window_size),
            angular_mean: RollingMean::new(rolling_window_size),
            last_update_time_s: 0.0,
            wheel_pos_prev_m: None,
        }
    }

    /// Reset the pose and velocity estimates, making `time_s` the reference
    /// for the next update.
    pub fn init(&mut self, time_s: f64) {
        self.x_m = 0.0;
        self.y_m = 0.0;
        self.heading_rad = 0.0;
        self.linear_ms = 0.0;
        self.angular_rads = 0.0;
        self.linear_mean.reset();
        self.angular_mean.reset();
        self.last_update_time_s = time_s;
        self.wheel_pos_prev_m = None;
    }

    /// Closed loop update from wheel and steering readings.
    ///
    /// `wheel_pos_m` and `wheel_vel_ms` are the averaged wheel position and
    /// velocity converted to linear units at the wheel rim, `steer_pos_rad`
    /// is the averaged front steering angle.
    ///
    /// Returns false (without touching the state) if no time has passed.
    pub fn update(
        &mut self,
        wheel_pos_m: f64,
        wheel_vel_ms: f64,
        steer_pos_rad: f64,
        time_s: f64,
    ) -> bool {
        let dt_s = time_s - self.last_update_time_s;
        if dt_s <= 0.0 {
            return false;
        }

        let linear_vel_ms = match self.vel_source {
            VelocitySource::DeltaPosition => {
                match self.wheel_pos_prev_m.replace(wheel_pos_m) {
                    Some(prev_m) => (wheel_pos_m - prev_m) / dt_s,
                    // First update after an init just primes the history
                    None => 0.0,
                }
            }
            VelocitySource::MeasuredVelocity => {
                self.wheel_pos_prev_m = Some(wheel_pos_m);
                wheel_vel_ms
            }
        };

        // Single track model: the steering angle sets the turn rate
        let angular_vel_rads =
            linear_vel_ms * steer_pos_rad.tan() / self.wheel_base_m;

        self.integrate(linear_vel_ms * dt_s, angular_vel_rads * dt_s);
        self.last_update_time_s = time_s;

        // Only the reported estimates are smoothed, the pose integrates the
        // raw per-step displacement
        self.linear_ms = self.linear_mean.push(linear_vel_ms);
        self.angular_rads = self.angular_mean.push(angular_vel_rads);

        true
    }

    /// Open loop update from the commanded body velocities.
    ///
    /// The commanded values become the reported estimates directly, without
    /// smoothing.
    pub fn update_open_loop(
        &mut self,
        linear_ms: f64,
        angular_rads: f64,
        time_s: f64,
    ) -> bool {
        let dt_s = time_s - self.last_update_time_s;
        if dt_s <= 0.0 {
            return false;
        }

        self.integrate(linear_ms * dt_s, angular_rads * dt_s);
        self.last_update_time_s = time_s;

        self.linear_ms = linear_ms;
        self.angular_rads = angular_rads;

        true
    }

    /// X position in the odometry frame.
    ///
    /// Units: meters
    pub fn x_m(&self) -> f64 {
        self.x_m
    }

    /// Y position in the odometry frame.
    ///
    /// Units: meters
    pub fn y_m(&self) -> f64 {
        self.y_m
    }

    /// Accumulated heading, not wrapped into [-pi, pi].
    ///
    /// Units: radians
    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }

    /// Smoothed linear speed estimate.
    ///
    /// Units: meters/second
    pub fn linear_ms(&self) -> f64 {
        self.linear_ms
    }

    /// Smoothed angular rate estimate.
    ///
    /// Units: radians/second
    pub fn angular_rads(&self) -> f64 {
        self.angular_rads
    }

    /// Advance the pose by one step of linear and angular displacement.
    fn integrate(&mut self, lin_delta_m: f64, ang_delta_rad: f64) {
        if ang_delta_rad.abs() < ANG_STEP_EXACT_THRESHOLD_RAD {
            // Straight (or nearly so): second order Runge-Kutta midpoint
            let mid_heading_rad = self.heading_rad + ang_delta_rad * 0.5;

            self.x_m += lin_delta_m * mid_heading_rad.cos();
            self.y_m += lin_delta_m * mid_heading_rad.sin();
            self.heading_rad += ang_delta_rad;
        } else {
            // Exact integration along the arc
            let heading_old_rad = self.heading_rad;
            let radius_m = lin_delta_m / ang_delta_rad;

            self.heading_rad += ang_delta_rad;
            self.x_m +=
                radius_m * (self.heading_rad.sin() - heading_old_rad.sin());
            self.y_m -=
                radius_m * (self.heading_rad.cos() - heading_old_rad.cos());
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const DT_S: f64 = 0.1;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} != {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_init_zeroes_state() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 5);

        odom.update(0.0, 1.0, 0.0, 1.0);
        odom.init(2.0);

        assert_eq!(odom.x_m(), 0.0);
        assert_eq!(odom.y_m(), 0.0);
        assert_eq!(odom.heading_rad(), 0.0);
        assert_eq!(odom.linear_ms(), 0.0);
        assert_eq!(odom.angular_rads(), 0.0);
    }

    #[test]
    fn test_update_rejects_zero_dt() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 5);
        odom.init(1.0);

        assert!(!odom.update(0.0, 1.0, 0.0, 1.0));
        assert!(!odom.update(0.0, 1.0, 0.0, 0.5));
        assert_eq!(odom.x_m(), 0.0);
    }

    #[test]
    fn test_straight_line_from_velocity() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 1);
        odom.init(0.0);

        // 1 m/s for 1 second in 0.1 s steps
        let mut time_s = 0.0;
        for _ in 0..10 {
            time_s += DT_S;
            odom.update(time_s * 1.0, 1.0, 0.0, time_s);
        }

        assert_close(odom.x_m(), 1.0, 1e-9);
        assert_close(odom.y_m(), 0.0, 1e-9);
        assert_close(odom.heading_rad(), 0.0, 1e-9);
        assert_close(odom.linear_ms(), 1.0, 1e-9);
    }

    #[test]
    fn test_straight_line_from_positions() {
        let mut odom = Odometry::new(1.0, VelocitySource::DeltaPosition, 1);
        odom.init(0.0);

        // First update only primes the position history, even with a large
        // pre-existing wheel position
        assert!(odom.update(100.0, 0.0, 0.0, DT_S));
        assert_eq!(odom.x_m(), 0.0);
        assert_eq!(odom.linear_ms(), 0.0);

        // Then 0.05 m per 0.1 s step is 0.5 m/s
        assert!(odom.update(100.05, 0.0, 0.0, 2.0 * DT_S));
        assert_close(odom.x_m(), 0.05, 1e-9);
        assert_close(odom.linear_ms(), 0.5, 1e-9);
    }

    #[test]
    fn test_zero_velocity_holds_pose() {
        let mut odom = Odometry::new(1.0, VelocitySource::DeltaPosition, 1);
        odom.init(0.0);

        // Move a little so the pose is non trivial
        odom.update(0.50, 0.0, 0.0, DT_S);
        odom.update(0.55, 0.0, 0.0, 2.0 * DT_S);
        assert_close(odom.x_m(), 0.05, 1e-9);

        // A parked vehicle, even with the wheels steered, goes nowhere
        let mut time_s = 2.0 * DT_S;
        for _ in 0..10 {
            time_s += DT_S;
            odom.update(0.55, 0.0, 0.3, time_s);
        }

        assert_close(odom.x_m(), 0.05, 1e-12);
        assert_close(odom.y_m(), 0.0, 1e-12);
        assert_close(odom.heading_rad(), 0.0, 1e-12);
        assert_close(odom.linear_ms(), 0.0, 1e-12);
        assert_close(odom.angular_rads(), 0.0, 1e-12);
    }

    #[test]
    fn test_quarter_turn_arc() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 1);
        odom.init(0.0);

        // Steering fixed so that the yaw rate equals the linear speed:
        // tan(steer)/wheel_base = 1, a circle of radius 1 m
        let steer_rad = std::f64::consts::FRAC_PI_4;
        let speed_ms = 1.0;

        // Drive a quarter of the circle (pi/2 radians of heading)
        let total_time_s = std::f64::consts::FRAC_PI_2;
        let steps = 10_000;
        let dt_s = total_time_s / steps as f64;

        let mut time_s = 0.0;
        for _ in 0..steps {
            time_s += dt_s;
            odom.update(0.0, speed_ms, steer_rad, time_s);
        }

        // A quarter turn of a unit circle starting along X+ ends at (1, 1)
        assert_close(odom.x_m(), 1.0, 1e-6);
        assert_close(odom.y_m(), 1.0, 1e-6);
        assert_close(odom.heading_rad(), std::f64::consts::FRAC_PI_2, 1e-6);
    }

    #[test]
    fn test_heading_accumulates_beyond_pi() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 1);
        odom.init(0.0);

        // Two full turns on the spot worth of heading
        let steer_rad = std::f64::consts::FRAC_PI_4;
        let mut time_s = 0.0;
        let dt_s = 0.01;
        let total_heading = 4.0 * std::f64::consts::PI;
        let steps = (total_heading / dt_s) as usize;

        for _ in 0..steps {
            time_s += dt_s;
            odom.update(0.0, 1.0, steer_rad, time_s);
        }

        // The heading is never wrapped
        assert!(odom.heading_rad() > 3.0 * std::f64::consts::PI);
    }

    #[test]
    fn test_open_loop_matches_closed_loop() {
        let mut closed = Odometry::new(2.0, VelocitySource::MeasuredVelocity, 1);
        let mut open = Odometry::new(2.0, VelocitySource::MeasuredVelocity, 1);
        closed.init(0.0);
        open.init(0.0);

        let steer_rad = 0.3f64;
        let speed_ms = 0.8;
        let ang_rads = speed_ms * steer_rad.tan() / 2.0;

        let mut time_s = 0.0;
        for _ in 0..100 {
            time_s += DT_S;
            closed.update(0.0, speed_ms, steer_rad, time_s);
            open.update_open_loop(speed_ms, ang_rads, time_s);
        }

        assert_close(closed.x_m(), open.x_m(), 1e-9);
        assert_close(closed.y_m(), open.y_m(), 1e-9);
        assert_close(closed.heading_rad(), open.heading_rad(), 1e-9);
    }

    #[test]
    fn test_velocity_smoothing_window() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 2);
        odom.init(0.0);

        odom.update(0.0, 1.0, 0.0, DT_S);
        assert_close(odom.linear_ms(), 1.0, 1e-9);

        // Window of 2 averages the last two samples
        odom.update(0.0, 3.0, 0.0, 2.0 * DT_S);
        assert_close(odom.linear_ms(), 2.0, 1e-9);

        odom.update(0.0, 3.0, 0.0, 3.0 * DT_S);
        assert_close(odom.linear_ms(), 3.0, 1e-9);
    }

    #[test]
    fn test_open_loop_velocities_not_smoothed() {
        let mut odom = Odometry::new(1.0, VelocitySource::MeasuredVelocity, 10);
        odom.init(0.0);

        odom.update_open_loop(1.0, 0.5, DT_S);
        odom.update_open_loop(3.0, 0.1, 2.0 * DT_S);

        // The reported values are the commanded ones, not a window average
        assert_eq!(odom.linear_ms(), 3.0);
        assert_eq!(odom.angular_rads(), 0.1);
    }
}
