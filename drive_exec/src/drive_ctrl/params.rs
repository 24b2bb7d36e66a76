//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Wheel and steering topology of the vehicle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// One or two driven axles with a single steering axle at the front.
    /// Steering joints are never commanded, only wheel speeds.
    Ackermann,

    /// Two driven axles, each with its own steering axle.
    FourWheelSteering
}

impl Default for TopologyKind {
    fn default() -> Self {
        TopologyKind::Ackermann
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Drive control.
#[derive(Debug, Default, Deserialize)]
pub struct Params {

    // ---- TOPOLOGY ----

    /// The wheel and steering topology of the vehicle.
    pub topology: TopologyKind,

    /// Names of the left hand wheel joints, ordered front to rear.
    pub left_wheel_joints: Vec<String>,

    /// Names of the right hand wheel joints, ordered front to rear.
    pub right_wheel_joints: Vec<String>,

    /// Names of the left hand steering joints, ordered front to rear.
    pub left_steer_joints: Vec<String>,

    /// Names of the right hand steering joints, ordered front to rear.
    pub right_steer_joints: Vec<String>,

    // ---- GEOMETRY ----

    /// The lateral distance between the left and right wheels. If not given
    /// it is resolved from the vehicle description.
    ///
    /// Units: meters.
    #[serde(default)]
    pub wheel_separation_m: Option<f64>,

    /// The radius of the vehicle's wheels. If not given it is resolved from
    /// the vehicle description.
    ///
    /// Units: meters.
    #[serde(default)]
    pub wheel_radius_m: Option<f64>,

    /// The longitudinal distance between the front and rear axles. If not
    /// given it is resolved from the vehicle description.
    ///
    /// Units: meters.
    #[serde(default)]
    pub wheel_base_m: Option<f64>,

    /// Calibration multiplier applied to the wheel separation. Ackermann
    /// topology only.
    #[serde(default = "default_multiplier")]
    pub wheel_separation_multiplier: f64,

    /// Calibration multiplier applied to the wheel radius. Ackermann
    /// topology only.
    #[serde(default = "default_multiplier")]
    pub wheel_radius_multiplier: f64,

    // ---- COMMANDS ----

    /// Time after which a buffered command is considered stale and the
    /// vehicle is brought to a stop.
    ///
    /// Units: seconds.
    #[serde(default = "default_cmd_timeout_s")]
    pub cmd_timeout_s: f64,

    /// If true the controller accepts body twist commands. If false a four
    /// wheel steering vehicle accepts direct per-axle steering commands
    /// instead. Ignored for ackermann topology, which always takes twists.
    #[serde(default = "default_true")]
    pub enable_twist_cmd: bool,

    // ---- ODOMETRY ----

    /// If true the odometry integrates the commanded velocities instead of
    /// the wheel encoder readings.
    #[serde(default)]
    pub open_loop: bool,

    /// Number of samples in the rolling window used to smooth the reported
    /// velocity estimates.
    #[serde(default = "default_velocity_rolling_window_size")]
    pub velocity_rolling_window_size: usize,

    // ---- PUBLICATION ----

    /// Rate at which the odometry telemetry is published.
    ///
    /// Units: hertz.
    #[serde(default = "default_publish_rate_hz")]
    pub publish_rate_hz: f64,

    /// Name of the vehicle's base frame in the published transform.
    #[serde(default = "default_base_frame_id")]
    pub base_frame_id: String,

    /// If true the odometry-to-base transform is published alongside the
    /// odometry state.
    #[serde(default = "default_true")]
    pub enable_odom_tf: bool,

    /// Diagonal of the published pose covariance matrix, in
    /// (x, y, z, roll, pitch, yaw) order.
    #[serde(default = "default_cov_diag")]
    pub pose_covariance_diagonal: [f64; 6],

    /// Diagonal of the published twist covariance matrix, in
    /// (x, y, z, roll, pitch, yaw) order.
    #[serde(default = "default_cov_diag")]
    pub twist_covariance_diagonal: [f64; 6],

    // ---- LIMITS ----

    /// Limits applied to the linear speed command.
    #[serde(default)]
    pub linear_limits: AxisLimitParams,

    /// Limits applied to the angular rate command.
    #[serde(default)]
    pub angular_limits: AxisLimitParams,
}

/// Limit parameters for a single command axis.
///
/// Each limit is only applied if the corresponding `has_*` flag is set. A
/// missing minimum defaults to the negated maximum.
#[derive(Debug, Default, Copy, Clone, Deserialize)]
pub struct AxisLimitParams {
    #[serde(default)]
    pub has_velocity_limits: bool,

    #[serde(default)]
    pub has_acceleration_limits: bool,

    #[serde(default)]
    pub has_jerk_limits: bool,

    /// Units: meters/second (linear) or radians/second (angular).
    #[serde(default)]
    pub max_velocity: Option<f64>,

    /// Units: meters/second (linear) or radians/second (angular).
    #[serde(default)]
    pub min_velocity: Option<f64>,

    /// Units: meters/second^2 (linear) or radians/second^2 (angular).
    #[serde(default)]
    pub max_acceleration: Option<f64>,

    /// Units: meters/second^2 (linear) or radians/second^2 (angular).
    #[serde(default)]
    pub min_acceleration: Option<f64>,

    /// Units: meters/second^3 (linear) or radians/second^3 (angular).
    #[serde(default)]
    pub max_jerk: Option<f64>,

    /// Units: meters/second^3 (linear) or radians/second^3 (angular).
    #[serde(default)]
    pub min_jerk: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters for consistency, returning a description of every
    /// problem found rather than stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut failures: Vec<String> = vec![];

        // Joint name lists must pair up left and right
        if self.left_wheel_joints.len() != self.right_wheel_joints.len() {
            failures.push(format!(
                "left and right wheel joint lists differ in length ({} vs {})",
                self.left_wheel_joints.len(),
                self.right_wheel_joints.len()
            ));
        }
        if self.left_steer_joints.len() != self.right_steer_joints.len() {
            failures.push(format!(
                "left and right steering joint lists differ in length ({} vs {})",
                self.left_steer_joints.len(),
                self.right_steer_joints.len()
            ));
        }

        // Axle counts must match the topology
        match self.topology {
            TopologyKind::Ackermann => {
                if self.left_wheel_joints.is_empty()
                    || self.left_wheel_joints.len() > 2
                {
                    failures.push(format!(
                        "ackermann topology needs 1 or 2 wheel pairs, got {}",
                        self.left_wheel_joints.len()
                    ));
                }
                if self.left_steer_joints.len() != 1 {
                    failures.push(format!(
                        "ackermann topology needs exactly 1 steering pair, got {}",
                        self.left_steer_joints.len()
                    ));
                }
            }
            TopologyKind::FourWheelSteering => {
                if self.left_wheel_joints.len() != 2 {
                    failures.push(format!(
                        "four wheel steering topology needs exactly 2 wheel pairs, got {}",
                        self.left_wheel_joints.len()
                    ));
                }
                if self.left_steer_joints.len() != 2 {
                    failures.push(format!(
                        "four wheel steering topology needs exactly 2 steering pairs, got {}",
                        self.left_steer_joints.len()
                    ));
                }
            }
        }

        // Rates, timeouts and windows
        if !(self.publish_rate_hz > 0.0) {
            failures.push(format!(
                "publish_rate_hz must be positive, got {}",
                self.publish_rate_hz
            ));
        }
        if self.cmd_timeout_s < 0.0 {
            failures.push(format!(
                "cmd_timeout_s must not be negative, got {}",
                self.cmd_timeout_s
            ));
        }
        if self.velocity_rolling_window_size == 0 {
            failures.push(
                "velocity_rolling_window_size must be at least 1".into()
            );
        }

        // Multipliers
        if !(self.wheel_separation_multiplier > 0.0) {
            failures.push(format!(
                "wheel_separation_multiplier must be positive, got {}",
                self.wheel_separation_multiplier
            ));
        }
        if !(self.wheel_radius_multiplier > 0.0) {
            failures.push(format!(
                "wheel_radius_multiplier must be positive, got {}",
                self.wheel_radius_multiplier
            ));
        }

        // Explicitly given geometry must be positive
        for (name, value) in [
            ("wheel_separation_m", self.wheel_separation_m),
            ("wheel_radius_m", self.wheel_radius_m),
            ("wheel_base_m", self.wheel_base_m)
        ].iter() {
            if let Some(v) = value {
                if !(*v > 0.0) {
                    failures.push(format!(
                        "{} must be positive, got {}", name, v
                    ));
                }
            }
        }

        // Covariance diagonals must be finite
        for (name, diag) in [
            ("pose_covariance_diagonal", &self.pose_covariance_diagonal),
            ("twist_covariance_diagonal", &self.twist_covariance_diagonal)
        ].iter() {
            if diag.iter().any(|c| !c.is_finite()) {
                failures.push(format!("{} contains non-finite entries", name));
            }
        }

        // Limit blocks
        self.linear_limits.validate("linear_limits", &mut failures);
        self.angular_limits.validate("angular_limits", &mut failures);

        failures
    }
}

impl AxisLimitParams {
    /// Check one limit block, appending any problems to `failures`.
    fn validate(&self, name: &str, failures: &mut Vec<String>) {
        let kinds = [
            (
                self.has_velocity_limits,
                "velocity",
                self.max_velocity,
                self.min_velocity
            ),
            (
                self.has_acceleration_limits,
                "acceleration",
                self.max_acceleration,
                self.min_acceleration
            ),
            (self.has_jerk_limits, "jerk", self.max_jerk, self.min_jerk)
        ];

        for (enabled, kind, max, min) in kinds.iter() {
            if !enabled {
                continue;
            }

            let max = match max {
                Some(m) => *m,
                None => {
                    failures.push(format!(
                        "{}: max_{} is required when has_{}_limits is set",
                        name, kind, kind
                    ));
                    continue;
                }
            };

            // A missing minimum defaults to -max, which always brackets zero
            let min = min.unwrap_or(-max);

            if min > 0.0 || max < 0.0 {
                failures.push(format!(
                    "{}: {} limits must bracket zero (got min {} max {})",
                    name, kind, min, max
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_multiplier() -> f64 {
    1.0
}

fn default_cmd_timeout_s() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_velocity_rolling_window_size() -> usize {
    10
}

fn default_publish_rate_hz() -> f64 {
    50.0
}

fn default_base_frame_id() -> String {
    "base_link".into()
}

fn default_cov_diag() -> [f64; 6] {
    [0.0; 6]
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn minimal_ackermann() -> Params {
        Params {
            topology: TopologyKind::Ackermann,
            left_wheel_joints: vec!["wheel_lf".into()],
            right_wheel_joints: vec!["wheel_rf".into()],
            left_steer_joints: vec!["steer_lf".into()],
            right_steer_joints: vec!["steer_rf".into()],
            wheel_separation_m: Some(0.5),
            wheel_radius_m: Some(0.1),
            wheel_base_m: Some(0.7),
            wheel_separation_multiplier: 1.0,
            wheel_radius_multiplier: 1.0,
            cmd_timeout_s: 0.5,
            enable_twist_cmd: true,
            velocity_rolling_window_size: 10,
            publish_rate_hz: 50.0,
            base_frame_id: "base_link".into(),
            enable_odom_tf: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_params_pass() {
        assert!(minimal_ackermann().validate().is_empty());
    }

    #[test]
    fn test_all_failures_collected() {
        let mut params = minimal_ackermann();
        params.right_wheel_joints.push("wheel_rr".into());
        params.publish_rate_hz = 0.0;
        params.velocity_rolling_window_size = 0;

        let failures = params.validate();

        // Every problem shows up, not just the first
        assert_eq!(failures.len(), 4);
        assert!(failures.iter().any(|f| f.contains("wheel joint lists")));
        assert!(failures.iter().any(|f| f.contains("publish_rate_hz")));
        assert!(failures
            .iter()
            .any(|f| f.contains("velocity_rolling_window_size")));
    }

    #[test]
    fn test_limit_flag_without_bound() {
        let mut params = minimal_ackermann();
        params.linear_limits.has_velocity_limits = true;

        let failures = params.validate();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("max_velocity"));
    }

    #[test]
    fn test_limits_must_bracket_zero() {
        let mut params = minimal_ackermann();
        params.angular_limits.has_acceleration_limits = true;
        params.angular_limits.max_acceleration = Some(-1.0);

        let failures = params.validate();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("bracket zero"));
    }

    #[test]
    fn test_topology_axle_counts() {
        let mut params = minimal_ackermann();
        params.topology = TopologyKind::FourWheelSteering;

        let failures = params.validate();
        assert!(failures.iter().any(|f| f.contains("2 wheel pairs")));
        assert!(failures.iter().any(|f| f.contains("2 steering pairs")));
    }

    #[test]
    fn test_deserialise_defaults() {
        let toml_str = r#"
            topology = "four_wheel_steering"
            left_wheel_joints = ["wheel_lf", "wheel_lr"]
            right_wheel_joints = ["wheel_rf", "wheel_rr"]
            left_steer_joints = ["steer_lf", "steer_lr"]
            right_steer_joints = ["steer_rf", "steer_rr"]
        "#;

        let params: Params = toml::from_str(toml_str).unwrap();

        assert_eq!(params.topology, TopologyKind::FourWheelSteering);
        assert_eq!(params.cmd_timeout_s, 0.5);
        assert_eq!(params.publish_rate_hz, 50.0);
        assert_eq!(params.velocity_rolling_window_size, 10);
        assert_eq!(params.base_frame_id, "base_link");
        assert!(params.enable_odom_tf);
        assert!(params.enable_twist_cmd);
        assert!(!params.open_loop);
        assert!(!params.linear_limits.has_velocity_limits);
    }
}
