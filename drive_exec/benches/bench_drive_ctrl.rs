//! # Drive Control Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use drive_lib::drive_ctrl::{
    AxisLimitParams, DriveCtrl, InputData, MotionLimiter, Odometry, Params,
    TopologyKind, VelocitySource,
};
use util::module::State;
use veh_if::cmd::DriveCmd;
use veh_if::eqpt::JointReadings;

fn drive_ctrl_benchmark(c: &mut Criterion) {
    // ---- Limiter ----

    let limiter = MotionLimiter::from_params(&AxisLimitParams {
        has_velocity_limits: true,
        has_acceleration_limits: true,
        has_jerk_limits: true,
        max_velocity: Some(1.0),
        max_acceleration: Some(0.5),
        max_jerk: Some(5.0),
        ..Default::default()
    });

    c.bench_function("MotionLimiter::limit", |b| {
        b.iter(|| limiter.limit(0.9, 0.5, 0.45, 0.01))
    });

    // ---- Odometry ----

    c.bench_function("Odometry::update", |b| {
        let mut odom = Odometry::new(1.0, VelocitySource::DeltaPosition, 10);
        odom.init(0.0);
        let mut time_s = 0.0;
        let mut pos_m = 0.0;
        b.iter(|| {
            time_s += 0.01;
            pos_m += 0.01;
            odom.update(pos_m, 1.0, 0.1, time_s)
        })
    });

    // ---- Full cycle ----

    let params = Params {
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
        velocity_rolling_window_size: 10,
        publish_rate_hz: 50.0,
        base_frame_id: "base_link".into(),
        enable_odom_tf: true,
        ..Default::default()
    };

    let mut ctrl = DriveCtrl::default();
    ctrl.init_from_params(params, None).unwrap();
    let mut sender = ctrl.take_cmd_sender().unwrap();
    ctrl.starting(0.0);

    c.bench_function("DriveCtrl::proc", |b| {
        let mut readings = JointReadings::default();
        readings.wheel_vel_rads = [2.0; 4];
        let mut time_s = 0.0;
        b.iter(|| {
            time_s += 0.01;
            sender
                .ingest_stamped(
                    &DriveCmd::Twist {
                        lin_ms: 1.0,
                        ang_rads: 0.1,
                    },
                    time_s,
                )
                .unwrap();
            readings.wheel_pos_rad = [time_s * 2.0; 4];
            ctrl.proc(&InputData { readings, time_s }).unwrap()
        })
    });
}

criterion_group!(benches, drive_ctrl_benchmark);
criterion_main!(benches);
