//! Session management
//!
//! A session is a timestamped directory holding everything produced by one
//! run of an executable: the log file, archives and any saved data products.
//! Creating the [`Session`] also fixes the session epoch, the zero point of
//! the timebase that [`get_elapsed_seconds`] reports against.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A request to the save thread: session-relative path plus the data.
type SaveRequest = (PathBuf, Box<dyn Serialize + Send>);

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();
static SAVE_SENDER: OnceCell<Mutex<Sender<SaveRequest>>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Chrono format string for directory and file timestamps.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Time the save thread sleeps for when there is no data waiting to be saved.
const SAVE_THREAD_IDLE_SLEEP: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle on the current session's directories and save thread.
#[derive(Clone)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    save_stop: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (DRIVE_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, has a session already been \
         created in this process? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session under `$DRIVE_SW_ROOT/{sessions_dir}`.
    ///
    /// Creates the directory `{exec_name}_{timestamp}` with an `arch`
    /// subdirectory, fixes the session epoch and spawns the save thread.
    /// Only one session may be created per process.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let timestamp = SESSION_EPOCH
            .get()
            .ok_or(SessionError::CannotGetEpoch)?
            .format(TIMESTAMP_FORMAT);

        let root =
            crate::host::get_drive_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        // Session directory and the archive directory within it
        let mut session_root = root;
        session_root.push(sessions_dir);
        session_root.push(format!("{}_{}", exec_name, timestamp));

        let arch_root = session_root.join("arch");
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = session_root.join(format!("{}.log", exec_name));

        // The save thread owns the receiving end of the request channel, the
        // sender lives in the static so anything in the process can save
        let (save_tx, save_rx) = channel();
        SAVE_SENDER.init_once(|| Mutex::new(save_tx));

        let save_stop = Arc::new(AtomicBool::new(false));
        {
            let stop = save_stop.clone();
            let root = session_root.clone();
            thread::spawn(move || save_thread(stop, root, save_rx));
        }

        Ok(Session {
            session_root,
            arch_root,
            log_file_path,
            save_stop,
        })
    }

    /// Exit the session, waiting for the save thread to finish any pending
    /// saves.
    pub fn exit(self) {
        info!("Stopping save thread");

        self.save_stop.store(true, Ordering::Relaxed);

        // The save thread flips the flag back once its queue is drained
        while self.save_stop.load(Ordering::Relaxed) {
            thread::sleep(SAVE_THREAD_IDLE_SLEEP);
        }

        info!("Save thread exited");
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// # Panics
/// - This function will panic if the session epoch has not been
///   initialised, which is performed on creating a new Session instance.
pub fn get_elapsed_seconds() -> f64 {
    let epoch = SESSION_EPOCH
        .get()
        .expect("Cannot get the session epoch!");

    time::duration_to_seconds(Utc::now() - *epoch).unwrap_or(std::f64::NAN)
}

/// Return a reference to the session's epoch.
///
/// # Panics
/// - This function will panic if the session epoch has not been
///   initialised, which is performed on creating a new Session instance.
pub fn get_epoch() -> &'static DateTime<Utc> {
    SESSION_EPOCH
        .get()
        .expect("Cannot get the session epoch!")
}

/// Save the given data into the session-relative path.
///
/// The write happens on the session's save thread. Only `.json` paths are
/// currently understood. Failures are logged, not returned, since the caller
/// has usually moved on by the time the write lands.
pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(path: P, data: T) {
    let sender = match SAVE_SENDER.get() {
        Some(s) => s,
        None => {
            warn!("Cannot save data as no session has been created yet");
            return;
        }
    };

    match sender.lock() {
        Ok(tx) => {
            if let Err(e) = tx.send((path.as_ref().to_path_buf(), Box::new(data))) {
                warn!(
                    "Couldn't send data to the save thread for {:?}: {}",
                    path.as_ref(),
                    e
                );
            }
        }
        Err(_) => warn!("Couldn't get lock on the save sender"),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Background thread draining save requests into the session directory.
fn save_thread(stop: Arc<AtomicBool>, session_root: PathBuf, rx: Receiver<SaveRequest>) {
    loop {
        // Drain everything waiting before considering a stop
        while let Ok((path, data)) = rx.try_recv() {
            let full_path = session_root.join(path);

            match full_path.extension().and_then(|e| e.to_str()) {
                Some("json") => {
                    if let Err(e) = write_json(&full_path, data.as_ref()) {
                        warn!("Couldn't save {:?}: {}", full_path, e);
                    }
                }
                ext => warn!(
                    "Unrecognised file extension for {:?} (got {:?})",
                    full_path, ext
                ),
            }
        }

        if stop.load(Ordering::Relaxed) {
            // Flipping the flag back tells `Session::exit` we are done
            stop.store(false, Ordering::Relaxed);
            break;
        }

        thread::sleep(SAVE_THREAD_IDLE_SLEEP);
    }
}

/// Write one data product as pretty JSON, creating parent directories.
fn write_json(
    path: &Path,
    data: &(dyn Serialize + Send),
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(path)?;

    serde_json::to_writer_pretty(&file, data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}
