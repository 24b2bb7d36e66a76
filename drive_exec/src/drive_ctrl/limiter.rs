//! Motion limiter for a single command axis
//!
//! Shapes a commanded value against jerk, acceleration and velocity bounds,
//! in that order, using the previous two accepted values as history. Each
//! stage feeds the next so the final value respects every enabled bound.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::AxisLimitParams;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limiter for one command axis (linear speed or angular rate).
#[derive(Debug, Default, Copy, Clone)]
pub struct MotionLimiter {
    pub has_velocity_limits: bool,
    pub has_acceleration_limits: bool,
    pub has_jerk_limits: bool,

    /// Units: command units
    pub min_velocity: f64,
    /// Units: command units
    pub max_velocity: f64,

    /// Units: command units/second
    pub min_acceleration: f64,
    /// Units: command units/second
    pub max_acceleration: f64,

    /// Units: command units/second^2
    pub min_jerk: f64,
    /// Units: command units/second^2
    pub max_jerk: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionLimiter {
    /// Build a limiter from a validated parameter block.
    ///
    /// Missing maxima read as unbounded, a missing minimum defaults to the
    /// negated maximum.
    pub fn from_params(params: &AxisLimitParams) -> Self {
        let max_velocity = params.max_velocity.unwrap_or(std::f64::INFINITY);
        let max_acceleration =
            params.max_acceleration.unwrap_or(std::f64::INFINITY);
        let max_jerk = params.max_jerk.unwrap_or(std::f64::INFINITY);

        Self {
            has_velocity_limits: params.has_velocity_limits,
            has_acceleration_limits: params.has_acceleration_limits,
            has_jerk_limits: params.has_jerk_limits,
            min_velocity: params.min_velocity.unwrap_or(-max_velocity),
            max_velocity,
            min_acceleration: params
                .min_acceleration
                .unwrap_or(-max_acceleration),
            max_acceleration,
            min_jerk: params.min_jerk.unwrap_or(-max_jerk),
            max_jerk,
        }
    }

    /// Limit `value` given the previous two accepted values and the time
    /// step since the last cycle.
    ///
    /// A non-positive `dt_s` returns the value unclamped, since no rate
    /// bound is meaningful over an empty interval.
    pub fn limit(&self, value: f64, prev1: f64, prev2: f64, dt_s: f64) -> f64 {
        if dt_s <= 0.0 {
            return value;
        }

        let mut limited = value;

        if self.has_jerk_limits {
            // Clamp the change of the first difference, scaled into value
            // units over one step
            let dt2 = dt_s * dt_s;
            let dv = limited - prev1;
            let dv_prev = prev1 - prev2;
            let ddv = clamp(
                &(dv - dv_prev),
                &(self.min_jerk * dt2),
                &(self.max_jerk * dt2),
            );

            limited = prev1 + dv_prev + ddv;
        }

        if self.has_acceleration_limits {
            let acc = (limited - prev1) / dt_s;

            limited = prev1
                + clamp(&acc, &self.min_acceleration, &self.max_acceleration)
                    * dt_s;
        }

        if self.has_velocity_limits {
            limited = clamp(&limited, &self.min_velocity, &self.max_velocity);
        }

        limited
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
