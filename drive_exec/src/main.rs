//! Main drive-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Spawn the command and telemetry threads
//!     - Main loop:
//!         - Joint sensing
//!         - Drive control processing
//!         - Demand output to the joints
//!         - Archive writing
//!
//! Commands are read from a script and fed into the controller's command
//! buffer from a separate thread, the same way a remote operator interface
//! would feed it. Odometry telemetry is consumed by another thread.
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State`
//!        trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use drive_lib::{
    data_store::DataStore,
    drive_ctrl::{DriveCtrlInitData, InputData, VehDescription},
    joint_rig::JointRig,
};
use veh_if::eqpt::DriveDems;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.01;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Period between polls of the command script.
const CMD_POLL_PERIOD: Duration = Duration::from_millis(10);

/// Period between polls of the telemetry slot.
const TELEM_POLL_PERIOD: Duration = Duration::from_millis(10);

/// Parameter file used when none is given on the command line.
const DEFAULT_PARAM_FILE: &str = "drive_ctrl_ackermann.toml";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Summary of the run, saved into the session at shutdown.
#[derive(Serialize)]
struct RunSummary {
    num_cycles: u128,
    num_consec_cycle_overruns: u64,
    final_x_m: f64,
    final_y_m: f64,
    final_heading_rad: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- COMMAND LINE ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let (script_path, params_file) = match args.len() {
        2 => (args[1].clone(), String::from(DEFAULT_PARAM_FILE)),
        3 => (args[1].clone(), args[2].clone()),
        _ => {
            return Err(eyre!(
                "Expected one or two arguments (script path and optional parameter file), \
                found {}",
                args.len() - 1
            ))
        }
    };

    // ---- INITIALISE COMMAND SOURCE ----

    info!("Loading script from \"{}\"", script_path);

    let mut script = ScriptInterpreter::new(&script_path).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} commands\n",
        script.get_duration(),
        script.get_num_cmds()
    );

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    let veh_desc =
        VehDescription::load("veh_desc.toml").wrap_err("Failed to load the vehicle description")?;

    ds.drive_ctrl
        .init(
            DriveCtrlInitData {
                params_file,
                desc: Some(Box::new(veh_desc)),
            },
            &session,
        )
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    // The rig stands in for the motor drivers
    let mut joint_rig = JointRig::from_params(ds.drive_ctrl.params());

    info!("Module initialisation complete\n");

    // ---- SPAWN WORKER THREADS ----

    let mut cmd_sender = ds
        .drive_ctrl
        .take_cmd_sender()
        .ok_or_else(|| eyre!("DriveCtrl command sender not available"))?;
    let mut telem_rx = ds
        .drive_ctrl
        .take_telem_receiver()
        .ok_or_else(|| eyre!("DriveCtrl telemetry receiver not available"))?;

    let script_done = Arc::new(AtomicBool::new(false));
    let stop_threads = Arc::new(AtomicBool::new(false));

    // The command thread plays the script into the controller, the same path
    // commands from an operator interface would take
    let cmd_thread = {
        let script_done = script_done.clone();
        thread::spawn(move || loop {
            match script.get_pending_cmds() {
                PendingCmds::None => (),
                PendingCmds::Some(cmd_vec) => {
                    for cmd in cmd_vec.iter() {
                        if let Err(e) = cmd_sender.ingest(cmd) {
                            warn!("Command rejected: {}", e);
                        }
                    }
                }
                // Signal the main loop when the end of the script is reached
                PendingCmds::EndOfScript => {
                    info!("End of command script reached");
                    script_done.store(true, Ordering::Release);
                    break;
                }
            }

            thread::sleep(CMD_POLL_PERIOD);
        })
    };

    // The telemetry thread consumes the odometry publications
    let telem_thread = {
        let stop = stop_threads.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                if let Some(sample) = telem_rx.latest() {
                    debug!(
                        "Odom TM: pos ({:.3}, {:.3}) m, heading {:.3} rad, lin {:.3} m/s",
                        sample.odom.x_m,
                        sample.odom.y_m,
                        sample.odom.heading_rad,
                        sample.odom.linear_ms
                    );
                }

                thread::sleep(TELEM_POLL_PERIOD);
            }
        })
    };

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- DATA INPUT ----

        joint_rig.step(CYCLE_PERIOD_S);

        ds.drive_ctrl_input = InputData {
            readings: joint_rig.readings(),
            time_s: ds.cycle_time_s,
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.drive_ctrl.proc(&ds.drive_ctrl_input) {
            Ok((o, r)) => {
                ds.drive_ctrl_output = o;
                ds.drive_ctrl_status_rpt = r;
            }
            Err(e) => {
                // The previous demands stay applied, a single bad cycle is
                // recoverable
                warn!("Error during DriveCtrl processing: {}", e)
            }
        };

        // Send the demands to the rig
        joint_rig.apply(&ds.drive_ctrl_output);

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.drive_ctrl.write() {
            warn!("Could not write DriveCtrl archives: {}", e);
        }

        // ---- MONITORING ----

        if ds.is_1_hz_cycle {
            info!(
                "Pose: ({:.3}, {:.3}) m, heading {:.3} rad",
                ds.drive_ctrl.odometry().x_m(),
                ds.drive_ctrl.odometry().y_m(),
                ds.drive_ctrl.odometry().heading_rad()
            );
        }

        // ---- END OF SCRIPT ----

        if script_done.load(Ordering::Acquire) {
            info!("Stopping the controller");
            ds.drive_ctrl.stopping();
            joint_rig.apply(&DriveDems::default());
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    stop_threads.store(true, Ordering::Release);

    if cmd_thread.join().is_err() {
        warn!("The command thread panicked");
    }
    if telem_thread.join().is_err() {
        warn!("The telemetry thread panicked");
    }

    util::session::save(
        "run_summary.json",
        RunSummary {
            num_cycles: ds.num_cycles,
            num_consec_cycle_overruns: ds.num_consec_cycle_overruns,
            final_x_m: ds.drive_ctrl.odometry().x_m(),
            final_y_m: ds.drive_ctrl.odometry().y_m(),
            final_heading_rad: ds.drive_ctrl.odometry().heading_rad(),
        },
    );

    session.exit();

    info!("End of execution");

    Ok(())
}
