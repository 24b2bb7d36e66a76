//! Command ingestion for DriveCtrl
//!
//! The [`CmdSender`] lives on the command source's thread (scripts, remote
//! links and so on). Motion commands are validated here and pushed into the
//! realtime command buffer, lifecycle commands are turned into request flags
//! which the control cycle picks up at the start of its next iteration.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

// Internal
use super::CmdWriter;
use util::session::get_elapsed_seconds;
use veh_if::cmd::DriveCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion command as held in the realtime command buffer.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BufferedCmd {
    /// Demanded linear speed of the body.
    ///
    /// Units: meters/second
    pub lin_ms: f64,

    /// Demanded angular rate of the body.
    ///
    /// Units: radians/second
    pub ang_rads: f64,

    /// Demanded front axle steering angle. Only used in direct axle command
    /// mode.
    ///
    /// Units: radians
    pub front_steer_rad: f64,

    /// Demanded rear axle steering angle. Only used in direct axle command
    /// mode.
    ///
    /// Units: radians
    pub rear_steer_rad: f64,

    /// Session time at which the command was ingested. `None` until the
    /// first command arrives, which reads as infinitely stale.
    pub stamp_s: Option<f64>,
}

/// Flags shared between the ingestion context and the control cycle.
#[derive(Default)]
pub(crate) struct SharedFlags {
    /// True while the controller is in its running mode.
    pub(crate) running: AtomicBool,

    /// Pending lifecycle request, one of the `LIFECYCLE_*` values.
    lifecycle_req: AtomicU8,
}

/// Command sender handle, the single entry point for feeding commands into
/// the controller from other threads.
pub struct CmdSender {
    writer: CmdWriter,
    shared: Arc<SharedFlags>,
    shape: CmdShape,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Shape of motion command the controller is configured to accept.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CmdShape {
    /// Body twists (linear speed and angular rate).
    Twist,

    /// Linear speed plus direct per-axle steering angles.
    AxleSteer,
}

impl Default for CmdShape {
    fn default() -> Self {
        CmdShape::Twist
    }
}

/// A lifecycle transition requested through the command stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum LifecycleRequest {
    Start,
    Stop,
}

/// Possible errors during command ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Can't accept new commands, the controller is not running")]
    NotRunning,

    #[error("The command shape does not match the configured command mode")]
    ShapeMismatch,

    #[error("The command contains non-finite values")]
    NonFinite,
}

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const LIFECYCLE_NONE: u8 = 0;
const LIFECYCLE_START: u8 = 1;
const LIFECYCLE_STOP: u8 = 2;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SharedFlags {
    /// Record a lifecycle request, overwriting any request not yet taken.
    pub(crate) fn request(&self, req: LifecycleRequest) {
        let raw = match req {
            LifecycleRequest::Start => LIFECYCLE_START,
            LifecycleRequest::Stop => LIFECYCLE_STOP,
        };
        self.lifecycle_req.store(raw, Ordering::Release);
    }

    /// Take the pending lifecycle request, clearing it.
    pub(crate) fn take_lifecycle_request(&self) -> Option<LifecycleRequest> {
        match self.lifecycle_req.swap(LIFECYCLE_NONE, Ordering::AcqRel) {
            LIFECYCLE_START => Some(LifecycleRequest::Start),
            LIFECYCLE_STOP => Some(LifecycleRequest::Stop),
            _ => None,
        }
    }
}

impl CmdSender {
    pub(crate) fn new(
        writer: CmdWriter,
        shared: Arc<SharedFlags>,
        shape: CmdShape,
    ) -> Self {
        Self {
            writer,
            shared,
            shape,
        }
    }

    /// Ingest a command, stamping it with the current session time.
    pub fn ingest(&mut self, cmd: &DriveCmd) -> Result<(), IngestError> {
        self.ingest_stamped(cmd, get_elapsed_seconds())
    }

    /// Ingest a command with an explicit timestamp.
    ///
    /// Lifecycle commands are always accepted. Motion commands are rejected
    /// unless the controller is running, the command matches the configured
    /// shape and all its values are finite. Rejections are logged here since
    /// the caller may not have anywhere better to report them.
    pub fn ingest_stamped(
        &mut self,
        cmd: &DriveCmd,
        time_s: f64,
    ) -> Result<(), IngestError> {
        match *cmd {
            DriveCmd::Start => {
                debug!("Start requested");
                self.shared.request(LifecycleRequest::Start);
                Ok(())
            }
            DriveCmd::Halt => {
                debug!("Halt requested");
                self.shared.request(LifecycleRequest::Stop);
                Ok(())
            }
            DriveCmd::Twist { lin_ms, ang_rads } => {
                self.check_motion_accepted(cmd, CmdShape::Twist)?;

                self.writer.write(BufferedCmd {
                    lin_ms,
                    ang_rads,
                    front_steer_rad: 0.0,
                    rear_steer_rad: 0.0,
                    stamp_s: Some(time_s),
                });

                debug!(
                    "Buffered twist command: lin {} m/s, ang {} rad/s",
                    lin_ms, ang_rads
                );
                Ok(())
            }
            DriveCmd::AxleSteer {
                speed_ms,
                front_steer_rad,
                rear_steer_rad,
            } => {
                self.check_motion_accepted(cmd, CmdShape::AxleSteer)?;

                self.writer.write(BufferedCmd {
                    lin_ms: speed_ms,
                    ang_rads: 0.0,
                    front_steer_rad,
                    rear_steer_rad,
                    stamp_s: Some(time_s),
                });

                debug!(
                    "Buffered axle command: speed {} m/s, front {} rad, rear {} rad",
                    speed_ms, front_steer_rad, rear_steer_rad
                );
                Ok(())
            }
        }
    }

    /// Check the gate conditions for a motion command.
    fn check_motion_accepted(
        &self,
        cmd: &DriveCmd,
        shape: CmdShape,
    ) -> Result<(), IngestError> {
        if !self.shared.running.load(Ordering::Acquire) {
            error!("Can't accept new commands, the controller is not running");
            return Err(IngestError::NotRunning);
        }

        if self.shape != shape {
            error!(
                "Rejecting {:?}: the controller is configured for {:?} commands",
                cmd, self.shape
            );
            return Err(IngestError::ShapeMismatch);
        }

        if !cmd.is_valid() {
            error!("Rejecting {:?}: non-finite values", cmd);
            return Err(IngestError::NonFinite);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::cmd_channel;

    fn sender_and_reader(
        shape: CmdShape,
        running: bool,
    ) -> (CmdSender, crate::drive_ctrl::CmdReader, Arc<SharedFlags>) {
        let (writer, reader) = cmd_channel();
        let shared = Arc::new(SharedFlags::default());
        shared.running.store(running, Ordering::Release);

        (CmdSender::new(writer, shared.clone(), shape), reader, shared)
    }

    #[test]
    fn test_motion_rejected_when_not_running() {
        let (mut sender, mut reader, _) =
            sender_and_reader(CmdShape::Twist, false);

        let result = sender.ingest_stamped(
            &DriveCmd::Twist {
                lin_ms: 1.0,
                ang_rads: 0.0,
            },
            1.0,
        );

        assert!(matches!(result, Err(IngestError::NotRunning)));
        assert_eq!(reader.read_latest().stamp_s, None);
    }

    #[test]
    fn test_twist_buffered_when_running() {
        let (mut sender, mut reader, _) =
            sender_and_reader(CmdShape::Twist, true);

        sender
            .ingest_stamped(
                &DriveCmd::Twist {
                    lin_ms: 0.4,
                    ang_rads: -0.2,
                },
                3.0,
            )
            .unwrap();

        let cmd = reader.read_latest();
        assert_eq!(cmd.lin_ms, 0.4);
        assert_eq!(cmd.ang_rads, -0.2);
        assert_eq!(cmd.stamp_s, Some(3.0));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (mut sender, _, _) = sender_and_reader(CmdShape::Twist, true);

        let result = sender.ingest_stamped(
            &DriveCmd::AxleSteer {
                speed_ms: 0.2,
                front_steer_rad: 0.1,
                rear_steer_rad: -0.1,
            },
            1.0,
        );

        assert!(matches!(result, Err(IngestError::ShapeMismatch)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let (mut sender, mut reader, _) =
            sender_and_reader(CmdShape::Twist, true);

        let result = sender.ingest_stamped(
            &DriveCmd::Twist {
                lin_ms: std::f64::NAN,
                ang_rads: 0.0,
            },
            1.0,
        );

        assert!(matches!(result, Err(IngestError::NonFinite)));
        assert_eq!(reader.read_latest().stamp_s, None);
    }

    #[test]
    fn test_lifecycle_always_accepted() {
        let (mut sender, _, shared) = sender_and_reader(CmdShape::Twist, false);

        sender.ingest_stamped(&DriveCmd::Start, 1.0).unwrap();
        assert_eq!(
            shared.take_lifecycle_request(),
            Some(LifecycleRequest::Start)
        );

        // The request is cleared once taken
        assert_eq!(shared.take_lifecycle_request(), None);

        sender.ingest_stamped(&DriveCmd::Halt, 2.0).unwrap();
        assert_eq!(
            shared.take_lifecycle_request(),
            Some(LifecycleRequest::Stop)
        );
    }

    #[test]
    fn test_axle_cmd_fills_steering() {
        let (mut sender, mut reader, _) =
            sender_and_reader(CmdShape::AxleSteer, true);

        sender
            .ingest_stamped(
                &DriveCmd::AxleSteer {
                    speed_ms: 0.3,
                    front_steer_rad: 0.2,
                    rear_steer_rad: -0.2,
                },
                5.0,
            )
            .unwrap();

        let cmd = reader.read_latest();
        assert_eq!(cmd.lin_ms, 0.3);
        assert_eq!(cmd.ang_rads, 0.0);
        assert_eq!(cmd.front_steer_rad, 0.2);
        assert_eq!(cmd.rear_steer_rad, -0.2);
    }
}
