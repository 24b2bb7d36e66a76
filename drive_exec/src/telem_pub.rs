//! # Telemetry publication
//!
//! Odometry telemetry is handed from the control cycle to the consumer
//! thread through a single shared slot holding only the latest sample. The
//! control cycle writes with [`TelemPublisher::try_publish`], which skips
//! the cycle rather than block if the consumer is mid read. The consumer
//! polls [`TelemReceiver::latest`], which yields a sample only when the
//! sequence number has moved on since the last poll.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::UnitQuaternion;

// Internal
use veh_if::telem::{OdomTm, TransformTm};

// Standard
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The shared telemetry slot.
///
/// `seq` increments on every publication so a receiver can tell a fresh
/// sample from one it has already seen.
#[derive(Clone, Default)]
pub struct TelemSlot {
    /// Publication sequence number, `0` until the first publication.
    pub seq: u64,

    /// The latest odometry sample.
    pub odom: OdomTm,

    /// The latest odometry transform.
    pub transform: TransformTm,

    /// True if `transform` was refreshed by the last publication. Stays
    /// false when the transform output is disabled.
    pub transform_fresh: bool,
}

/// Producer half of the telemetry slot, held by the controller.
#[derive(Default)]
pub struct TelemPublisher {
    slot: Arc<Mutex<TelemSlot>>,
}

/// Consumer half of the telemetry slot.
pub struct TelemReceiver {
    slot: Arc<Mutex<TelemSlot>>,
    last_seq: u64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a connected publisher/receiver pair around an empty slot.
pub fn telem_channel() -> (TelemPublisher, TelemReceiver) {
    let slot = Arc::new(Mutex::new(TelemSlot::default()));

    (
        TelemPublisher { slot: slot.clone() },
        TelemReceiver { slot, last_seq: 0 },
    )
}

/// Convert a heading about the vertical axis into an `[i, j, k, w]`
/// quaternion.
pub fn yaw_to_quat(yaw_rad: f64) -> [f64; 4] {
    let quat = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad);
    [
        quat.coords[0],
        quat.coords[1],
        quat.coords[2],
        quat.coords[3],
    ]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TelemPublisher {
    /// Mutate the slot, waiting for the lock.
    ///
    /// For one off setup (frame names, covariances) before the consumer
    /// starts polling, not for use inside the control cycle.
    pub fn setup<F: FnOnce(&mut TelemSlot)>(&self, func: F) {
        if let Ok(mut slot) = self.slot.lock() {
            func(&mut slot);
        }
    }

    /// Mutate the slot if it is free, never blocking.
    ///
    /// Returns true if the slot was updated, false if the consumer held it
    /// and the publication was skipped.
    pub fn try_publish<F: FnOnce(&mut TelemSlot)>(&self, func: F) -> bool {
        match self.slot.try_lock() {
            Ok(mut slot) => {
                func(&mut slot);
                true
            }
            Err(_) => false,
        }
    }
}

impl TelemReceiver {
    /// Get the latest sample, or `None` if nothing new was published since
    /// the previous call.
    pub fn latest(&mut self) -> Option<TelemSlot> {
        let slot = match self.slot.lock() {
            Ok(s) => s,
            Err(_) => return None,
        };

        if slot.seq == self.last_seq {
            return None;
        }

        self.last_seq = slot.seq;
        Some(slot.clone())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_latest_only_yields_new_samples() {
        let (telem_pub, mut telem_rx) = telem_channel();

        // Nothing published yet
        assert!(telem_rx.latest().is_none());

        assert!(telem_pub.try_publish(|slot| {
            slot.seq += 1;
            slot.odom.x_m = 1.5;
        }));

        let sample = telem_rx.latest().unwrap();
        assert_eq!(sample.seq, 1);
        assert_eq!(sample.odom.x_m, 1.5);

        // Same sample is not yielded twice
        assert!(telem_rx.latest().is_none());

        assert!(telem_pub.try_publish(|slot| {
            slot.seq += 1;
            slot.odom.x_m = 2.5;
        }));
        assert_eq!(telem_rx.latest().unwrap().odom.x_m, 2.5);
    }

    #[test]
    fn test_try_publish_skips_when_slot_held() {
        let (telem_pub, telem_rx) = telem_channel();

        let guard = telem_rx.slot.lock().unwrap();
        assert!(!telem_pub.try_publish(|slot| slot.seq += 1));
        drop(guard);

        assert!(telem_pub.try_publish(|slot| slot.seq += 1));
    }

    #[test]
    fn test_yaw_to_quat() {
        let quat = yaw_to_quat(0.0);
        assert!((quat[3] - 1.0).abs() < 1e-12);

        // Quarter turn to the left
        let quat = yaw_to_quat(std::f64::consts::FRAC_PI_2);
        let half = std::f64::consts::FRAC_PI_4;
        assert!(quat[0].abs() < 1e-12);
        assert!(quat[1].abs() < 1e-12);
        assert!((quat[2] - half.sin()).abs() < 1e-12);
        assert!((quat[3] - half.cos()).abs() < 1e-12);
    }
}
