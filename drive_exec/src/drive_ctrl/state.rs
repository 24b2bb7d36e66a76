//! State structure and processing for the drive controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace};
use serde::Serialize;

// Internal
use util::archive::{ArchiveError, Archived, Archiver};
use util::module::State;
use util::params;
use util::session::Session;
use veh_if::eqpt::{AxisSlot, DriveDems, JointReadings, SteerAxle};

use crate::telem_pub::{
    telem_channel, yaw_to_quat, TelemPublisher, TelemReceiver,
};

use super::cmd::{
    BufferedCmd, CmdSender, CmdShape, LifecycleRequest, SharedFlags,
};
use super::cmd_buffer::{cmd_channel, CmdReader};
use super::limiter::MotionLimiter;
use super::odometry::{Odometry, VelocitySource};
use super::params::{Params, TopologyKind};
use super::veh_geom::{resolve_geometry, DescriptionSource, VehGeometry};
use super::{DriveCtrlError, DriveCtrlInitError};

// Standard
use std::sync::atomic::Ordering;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the fixed frame the odometry transform is expressed in.
const ODOM_FRAME_ID: &str = "odom";

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Wheel slots of a single axle vehicle.
static FRONT_AXLE_SLOTS: [AxisSlot; 2] =
    [AxisSlot::LeftFront, AxisSlot::RightFront];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive controller state.
#[derive(Default)]
pub struct DriveCtrl {
    /// Controller parameters.
    pub(crate) params: Params,

    /// Resolved vehicle geometry.
    pub(crate) geom: VehGeometry,

    /// Current controller mode.
    pub(crate) mode: CtrlMode,

    /// Number of wheel pairs being driven.
    pub(crate) num_axles: usize,

    /// Shape of motion command accepted by this configuration.
    pub(crate) cmd_shape: CmdShape,

    /// Pose and velocity estimator.
    pub(crate) odometry: Odometry,

    /// Limiter applied to the linear speed command.
    pub(crate) limiter_lin: MotionLimiter,

    /// Limiter applied to the angular rate command.
    pub(crate) limiter_ang: MotionLimiter,

    /// The limited command applied on the previous cycle.
    pub(crate) last0_cmd: AcceptedCmd,

    /// The limited command applied two cycles ago.
    pub(crate) last1_cmd: AcceptedCmd,

    /// The demands applied on the previous cycle.
    pub(crate) held_dems: DriveDems,

    /// Status report for the current cycle.
    pub(crate) report: StatusReport,

    /// Session time of the previous cycle.
    last_cycle_time_s: f64,

    /// Publication accumulator, stepped by whole periods.
    last_publish_time_s: f64,

    /// Period between telemetry publications.
    publish_period_s: f64,

    /// Flags shared with the command senders.
    shared: Arc<SharedFlags>,

    /// Consumer side of the command buffer.
    cmd_reader: Option<CmdReader>,

    /// Sender handle staged here by `init` until the owner collects it.
    cmd_sender: Option<CmdSender>,

    /// Producer side of the telemetry slot.
    telem_pub: TelemPublisher,

    /// Receiver handle staged here by `init` until the owner collects it.
    telem_rx: Option<TelemReceiver>,

    arch_report: Archiver,
    arch_odom: Archiver,
    arch_dems: Archiver,
}

/// Initialisation data for the drive controller.
pub struct DriveCtrlInitData {
    /// Path of the parameter file relative to the software's `params`
    /// directory.
    pub params_file: String,

    /// Vehicle description used to resolve any geometry not given in the
    /// parameters.
    pub desc: Option<Box<dyn DescriptionSource>>,
}

/// Input data for drive controller processing.
#[derive(Debug, Copy, Clone, Default)]
pub struct InputData {
    /// Joint sensor readings for this cycle.
    pub readings: JointReadings,

    /// Session time of this cycle.
    ///
    /// Units: seconds
    pub time_s: f64,
}

/// A limited command as applied to the vehicle, kept as limiter history.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct AcceptedCmd {
    pub(crate) lin_ms: f64,
    pub(crate) ang_rads: f64,
}

/// Status report for drive controller processing.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Session time of the cycle this report covers.
    pub time_s: f64,

    /// True if the controller was running this cycle.
    pub running: bool,

    /// True if the buffered command was stale and the vehicle was brought
    /// to a stop.
    pub cmd_stale: bool,

    /// True if the linear demand was modified by the limiter.
    pub lin_limited: bool,

    /// True if the angular demand was modified by the limiter.
    pub ang_limited: bool,

    /// True if the steering was held at zero because the vehicle is too
    /// slow to derive an angle from the demanded rate.
    pub steer_held_zero: bool,

    /// True if odometry telemetry was published this cycle.
    pub odom_published: bool,

    /// True if a due publication was skipped because the consumer held the
    /// telemetry slot.
    pub publish_skipped_busy: bool,
}

/// Flat csv record of the odometry state.
#[derive(Serialize)]
struct OdomRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    linear_ms: f64,
    angular_rads: f64,
}

/// Flat csv record of the output demands.
#[derive(Serialize)]
struct DemsRecord {
    time_s: f64,
    wheel_rate_lf_rads: f64,
    wheel_rate_rf_rads: f64,
    wheel_rate_lr_rads: f64,
    wheel_rate_rr_rads: f64,
    steer_front_rad: f64,
    steer_rear_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Mode of the drive controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CtrlMode {
    /// Holding the brake, motion commands are rejected.
    Stopped,

    /// Executing motion commands.
    Running,
}

impl Default for CtrlMode {
    fn default() -> Self {
        CtrlMode::Stopped
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = DriveCtrlInitData;
    type InitError = DriveCtrlInitError;

    type InputData = InputData;
    type OutputData = DriveDems;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the parameter file path and an optional vehicle
    /// description.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        let ctrl_params: Params = params::load(&init_data.params_file)?;

        self.init_from_params(ctrl_params, init_data.desc.as_deref())?;

        // Create the arch folder for drive_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("drive_ctrl");
        std::fs::create_dir_all(arch_path)
            .map_err(ArchiveError::FileCreateError)?;

        // Initialise the archivers
        self.arch_report = Archiver::from_path(
            session, "drive_ctrl/status_report.csv"
        )?;
        self.arch_odom = Archiver::from_path(
            session, "drive_ctrl/odometry.csv"
        )?;
        self.arch_dems = Archiver::from_path(
            session, "drive_ctrl/demands.csv"
        )?;

        Ok(())
    }

    /// Perform cyclic processing of the drive controller.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport {
            time_s: input_data.time_s,
            ..StatusReport::default()
        };

        // Lifecycle requests are taken up at the start of the cycle so the
        // mode is settled before anything is calculated
        match self.shared.take_lifecycle_request() {
            Some(LifecycleRequest::Start) => {
                if self.mode == CtrlMode::Stopped {
                    self.starting(input_data.time_s);
                }
            }
            Some(LifecycleRequest::Stop) => {
                if self.mode == CtrlMode::Running {
                    self.stopping();
                }
            }
            None => (),
        }

        // While stopped hold the brake
        if self.mode == CtrlMode::Stopped {
            self.held_dems = DriveDems::default();
            return Ok((self.held_dems, self.report));
        }

        self.report.running = true;

        // A NaN reading aborts the cycle before any state is touched, so a
        // glitching sensor cannot corrupt the pose estimate
        if !self.params.open_loop {
            self.check_readings(&input_data.readings)?;
        }

        // Update the pose and velocity estimates
        if self.params.open_loop {
            self.odometry.update_open_loop(
                self.last0_cmd.lin_ms,
                self.last0_cmd.ang_rads,
                input_data.time_s,
            );
        } else {
            let (wheel_pos_rad, wheel_vel_rads) =
                self.mean_wheel_readings(&input_data.readings);
            let steer_pos_rad = self.mean_front_steer(&input_data.readings);
            let radius_m = self.effective_wheel_radius_m();

            self.odometry.update(
                wheel_pos_rad * radius_m,
                wheel_vel_rads * radius_m,
                steer_pos_rad,
                input_data.time_s,
            );
        }

        self.publish_telem(input_data.time_s);

        // Take the latest buffered command
        let mut cmd = match self.cmd_reader {
            Some(ref mut reader) => reader.read_latest(),
            None => BufferedCmd::default(),
        };

        // A stale command brings the vehicle to a stop
        let stale = match cmd.stamp_s {
            Some(stamp_s) => {
                input_data.time_s - stamp_s > self.params.cmd_timeout_s
            }
            None => true,
        };
        if stale {
            cmd.lin_ms = 0.0;
            cmd.ang_rads = 0.0;
            if self.cmd_shape == CmdShape::AxleSteer {
                cmd.front_steer_rad = 0.0;
                cmd.rear_steer_rad = 0.0;
            }
            self.report.cmd_stale = true;
        }

        // Shape the demands against the limits
        let dt_s = input_data.time_s - self.last_cycle_time_s;
        let lin_ms = self.limiter_lin.limit(
            cmd.lin_ms,
            self.last0_cmd.lin_ms,
            self.last1_cmd.lin_ms,
            dt_s,
        );
        let ang_rads = self.limiter_ang.limit(
            cmd.ang_rads,
            self.last0_cmd.ang_rads,
            self.last1_cmd.ang_rads,
            dt_s,
        );
        self.report.lin_limited = lin_ms != cmd.lin_ms;
        self.report.ang_limited = ang_rads != cmd.ang_rads;

        // The history holds the commands as applied, not as demanded
        self.last1_cmd = self.last0_cmd;
        self.last0_cmd = AcceptedCmd { lin_ms, ang_rads };

        let dems = match self.params.topology {
            TopologyKind::Ackermann => self.calc_ackermann(lin_ms, ang_rads),
            TopologyKind::FourWheelSteering => {
                self.calc_four_wheel_steer(lin_ms, ang_rads, &cmd)
            }
        };

        trace!(
            "DriveCtrl output:\n    wheel: {:?}\n    steer: {:?}",
            dems.wheel_rate_rads,
            dems.steer_abs_pos_rad
        );

        self.held_dems = dems;
        self.last_cycle_time_s = input_data.time_s;

        Ok((dems, self.report))
    }
}

impl Archived for DriveCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;

        self.arch_odom.serialise(OdomRecord {
            time_s: self.report.time_s,
            x_m: self.odometry.x_m(),
            y_m: self.odometry.y_m(),
            heading_rad: self.odometry.heading_rad(),
            linear_ms: self.odometry.linear_ms(),
            angular_rads: self.odometry.angular_rads(),
        })?;

        self.arch_dems.serialise(DemsRecord {
            time_s: self.report.time_s,
            wheel_rate_lf_rads: self.held_dems.wheel_rate_rads
                [AxisSlot::LeftFront.index()],
            wheel_rate_rf_rads: self.held_dems.wheel_rate_rads
                [AxisSlot::RightFront.index()],
            wheel_rate_lr_rads: self.held_dems.wheel_rate_rads
                [AxisSlot::LeftRear.index()],
            wheel_rate_rr_rads: self.held_dems.wheel_rate_rads
                [AxisSlot::RightRear.index()],
            steer_front_rad: self.held_dems.steer_abs_pos_rad
                [SteerAxle::Front.index()],
            steer_rear_rad: self.held_dems.steer_abs_pos_rad
                [SteerAxle::Rear.index()],
        })?;

        Ok(())
    }
}

impl DriveCtrl {
    /// Initialise the controller from already loaded parameters.
    ///
    /// Every problem with the configuration is collected before returning,
    /// so a bad file can be fixed in one pass rather than one error at a
    /// time.
    pub fn init_from_params(
        &mut self,
        ctrl_params: Params,
        desc: Option<&dyn DescriptionSource>,
    ) -> Result<(), DriveCtrlInitError> {
        let mut failures = ctrl_params.validate();
        let geom = resolve_geometry(&ctrl_params, desc, &mut failures);

        if !failures.is_empty() {
            return Err(DriveCtrlInitError::InvalidConfig(failures));
        }

        self.num_axles = ctrl_params.left_wheel_joints.len();

        self.cmd_shape = match ctrl_params.topology {
            TopologyKind::Ackermann => CmdShape::Twist,
            TopologyKind::FourWheelSteering => {
                if ctrl_params.enable_twist_cmd {
                    CmdShape::Twist
                } else {
                    CmdShape::AxleSteer
                }
            }
        };

        // A single axle gives a usable distance signal, so velocity can be
        // derived from position deltas. With two axles the averaged position
        // folds in the steering offsets and the measured rates are used
        // instead.
        let vel_source = match ctrl_params.topology {
            TopologyKind::Ackermann => VelocitySource::DeltaPosition,
            TopologyKind::FourWheelSteering => VelocitySource::MeasuredVelocity,
        };

        self.odometry = Odometry::new(
            geom.wheel_base_m,
            vel_source,
            ctrl_params.velocity_rolling_window_size,
        );
        self.limiter_lin = MotionLimiter::from_params(&ctrl_params.linear_limits);
        self.limiter_ang =
            MotionLimiter::from_params(&ctrl_params.angular_limits);
        self.publish_period_s = 1.0 / ctrl_params.publish_rate_hz;

        // Command channel
        let (writer, reader) = cmd_channel();
        self.shared = Arc::new(SharedFlags::default());
        self.cmd_reader = Some(reader);
        self.cmd_sender = Some(CmdSender::new(
            writer,
            self.shared.clone(),
            self.cmd_shape,
        ));

        // Telemetry slot, with the fixed fields set once here
        let (telem_pub, telem_rx) = telem_channel();
        let base_frame = ctrl_params.base_frame_id.clone();
        let pose_cov = ctrl_params.pose_covariance_diagonal;
        let twist_cov = ctrl_params.twist_covariance_diagonal;
        telem_pub.setup(move |slot| {
            slot.odom.pose_cov_diag = pose_cov;
            slot.odom.twist_cov_diag = twist_cov;
            slot.transform.parent_frame = ODOM_FRAME_ID.into();
            slot.transform.child_frame = base_frame;
        });
        self.telem_pub = telem_pub;
        self.telem_rx = Some(telem_rx);

        self.geom = geom;
        self.params = ctrl_params;
        self.mode = CtrlMode::Stopped;
        self.held_dems = DriveDems::default();
        self.last0_cmd = AcceptedCmd::default();
        self.last1_cmd = AcceptedCmd::default();

        Ok(())
    }

    /// Bring the controller into its running mode.
    ///
    /// The brake is applied, the limiter history is cleared and the odometry
    /// restarts from the origin at `time_s`.
    pub fn starting(&mut self, time_s: f64) {
        info!("DriveCtrl starting");

        self.held_dems = DriveDems::default();
        self.last0_cmd = AcceptedCmd::default();
        self.last1_cmd = AcceptedCmd::default();
        self.odometry.init(time_s);
        self.last_publish_time_s = time_s;
        self.last_cycle_time_s = time_s;
        self.mode = CtrlMode::Running;
        self.shared.running.store(true, Ordering::Release);
    }

    /// Bring the controller into its stopped mode, applying the brake.
    pub fn stopping(&mut self) {
        info!("DriveCtrl stopping");

        self.held_dems = DriveDems::default();
        self.mode = CtrlMode::Stopped;
        self.shared.running.store(false, Ordering::Release);
    }

    /// Take the command sender handle.
    ///
    /// Returns `None` if the controller is not initialised or the handle was
    /// already taken.
    pub fn take_cmd_sender(&mut self) -> Option<CmdSender> {
        self.cmd_sender.take()
    }

    /// Take the telemetry receiver handle.
    ///
    /// Returns `None` if the controller is not initialised or the handle was
    /// already taken.
    pub fn take_telem_receiver(&mut self) -> Option<TelemReceiver> {
        self.telem_rx.take()
    }

    /// True if the controller is in its running mode.
    pub fn is_running(&self) -> bool {
        self.mode == CtrlMode::Running
    }

    /// Get the controller's pose and velocity estimator.
    pub fn odometry(&self) -> &Odometry {
        &self.odometry
    }

    /// Get the controller's parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Get the wheel separation with any calibration multiplier applied.
    pub(crate) fn effective_wheel_separation_m(&self) -> f64 {
        match self.params.topology {
            TopologyKind::Ackermann => {
                self.geom.wheel_separation_m
                    * self.params.wheel_separation_multiplier
            }
            TopologyKind::FourWheelSteering => self.geom.wheel_separation_m,
        }
    }

    /// Get the wheel radius with any calibration multiplier applied.
    pub(crate) fn effective_wheel_radius_m(&self) -> f64 {
        match self.params.topology {
            TopologyKind::Ackermann => {
                self.geom.wheel_radius_m * self.params.wheel_radius_multiplier
            }
            TopologyKind::FourWheelSteering => self.geom.wheel_radius_m,
        }
    }

    /// Get the wheel slots in use for the configured number of axles.
    fn active_wheel_slots(&self) -> &'static [AxisSlot] {
        if self.num_axles < 2 {
            &FRONT_AXLE_SLOTS
        } else {
            &AxisSlot::ALL
        }
    }

    /// Check the readings the odometry will consume for NaNs.
    fn check_readings(
        &self,
        readings: &JointReadings,
    ) -> Result<(), DriveCtrlError> {
        for slot in self.active_wheel_slots() {
            if readings.wheel_pos_rad[slot.index()].is_nan() {
                return Err(DriveCtrlError::NanSensorReading("wheel position"));
            }
            if readings.wheel_vel_rads[slot.index()].is_nan() {
                return Err(DriveCtrlError::NanSensorReading("wheel velocity"));
            }
        }

        // Only the front steering readings feed the odometry
        for slot in &FRONT_AXLE_SLOTS {
            if readings.steer_pos_rad[slot.index()].is_nan() {
                return Err(DriveCtrlError::NanSensorReading(
                    "steering position",
                ));
            }
        }

        Ok(())
    }

    /// Average the wheel position and velocity over the active slots.
    ///
    /// Units: (radians, radians/second)
    fn mean_wheel_readings(&self, readings: &JointReadings) -> (f64, f64) {
        let slots = self.active_wheel_slots();

        let mut pos_sum_rad = 0.0;
        let mut vel_sum_rads = 0.0;
        for slot in slots {
            pos_sum_rad += readings.wheel_pos_rad[slot.index()];
            vel_sum_rads += readings.wheel_vel_rads[slot.index()];
        }

        let num_slots = slots.len() as f64;
        (pos_sum_rad / num_slots, vel_sum_rads / num_slots)
    }

    /// Average the steering angle over the front pair.
    ///
    /// Units: radians
    fn mean_front_steer(&self, readings: &JointReadings) -> f64 {
        (readings.steer_pos_rad[AxisSlot::LeftFront.index()]
            + readings.steer_pos_rad[AxisSlot::RightFront.index()])
            / 2.0
    }

    /// Publish the odometry telemetry if a publication is due.
    fn publish_telem(&mut self, time_s: f64) {
        if self.last_publish_time_s + self.publish_period_s >= time_s {
            return;
        }

        // Stepping by whole periods holds the average rate even when a
        // publication lands late
        self.last_publish_time_s += self.publish_period_s;

        let x_m = self.odometry.x_m();
        let y_m = self.odometry.y_m();
        let heading_rad = self.odometry.heading_rad();
        let quat = yaw_to_quat(heading_rad);
        let linear_ms = self.odometry.linear_ms();
        let angular_rads = self.odometry.angular_rads();
        let tf_enabled = self.params.enable_odom_tf;

        let published = self.telem_pub.try_publish(move |slot| {
            slot.seq += 1;
            slot.odom.time_s = time_s;
            slot.odom.x_m = x_m;
            slot.odom.y_m = y_m;
            slot.odom.heading_rad = heading_rad;
            slot.odom.orientation_quat = quat;
            slot.odom.linear_ms = linear_ms;
            slot.odom.angular_rads = angular_rads;

            slot.transform_fresh = tf_enabled;
            if tf_enabled {
                slot.transform.time_s = time_s;
                slot.transform.translation_m = [x_m, y_m, 0.0];
                slot.transform.rotation_quat = quat;
            }
        });

        if published {
            self.report.odom_published = true;
        } else {
            self.report.publish_skipped_busy = true;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::drive_ctrl::params::AxisLimitParams;

    /// Parameters for a single axle ackermann vehicle with explicit
    /// geometry: 0.5 m separation, 0.1 m wheels, 1 m wheel base.
    pub(crate) fn ack_params() -> Params {
        Params {
            topology: TopologyKind::Ackermann,
            left_wheel_joints: vec!["wheel_lf".into()],
            right_wheel_joints: vec!["wheel_rf".into()],
            left_steer_joints: vec!["steer_lf".into()],
            right_steer_joints: vec!["steer_rf".into()],
            wheel_separation_m: Some(0.5),
            wheel_radius_m: Some(0.1),
            wheel_base_m: Some(1.0),
            wheel_separation_multiplier: 1.0,
            wheel_radius_multiplier: 1.0,
            cmd_timeout_s: 0.5,
            enable_twist_cmd: true,
            velocity_rolling_window_size: 1,
            publish_rate_hz: 50.0,
            base_frame_id: "base_link".into(),
            enable_odom_tf: true,
            ..Params::default()
        }
    }

    /// Parameters for a four wheel steering vehicle with explicit geometry:
    /// 1 m separation, 0.5 m wheels, 2 m wheel base.
    pub(crate) fn fws_params() -> Params {
        Params {
            topology: TopologyKind::FourWheelSteering,
            left_wheel_joints: vec!["wheel_lf".into(), "wheel_lr".into()],
            right_wheel_joints: vec!["wheel_rf".into(), "wheel_rr".into()],
            left_steer_joints: vec!["steer_lf".into(), "steer_lr".into()],
            right_steer_joints: vec!["steer_rf".into(), "steer_rr".into()],
            wheel_separation_m: Some(1.0),
            wheel_radius_m: Some(0.5),
            wheel_base_m: Some(2.0),
            wheel_separation_multiplier: 1.0,
            wheel_radius_multiplier: 1.0,
            cmd_timeout_s: 0.5,
            enable_twist_cmd: true,
            velocity_rolling_window_size: 1,
            publish_rate_hz: 50.0,
            base_frame_id: "base_link".into(),
            enable_odom_tf: true,
            ..Params::default()
        }
    }

    /// Limits with only an acceleration bound of +/-1 unit/s^2.
    pub(crate) fn accel_limits() -> AxisLimitParams {
        AxisLimitParams {
            has_acceleration_limits: true,
            max_acceleration: Some(1.0),
            ..AxisLimitParams::default()
        }
    }

    /// Initialise and start a controller, returning it with its command
    /// sender.
    pub(crate) fn running_ctrl(ctrl_params: Params) -> (DriveCtrl, CmdSender) {
        let mut ctrl = DriveCtrl::default();
        ctrl.init_from_params(ctrl_params, None).unwrap();
        let sender = ctrl.take_cmd_sender().unwrap();
        ctrl.starting(0.0);
        (ctrl, sender)
    }
}
