//! # Drive command script interpreter module
//!
//! This module provides an interpreter for drive command scripts, allowing
//! timed sequences of commands to be played into the controller.
//!
//! Scripts are plain text files in which each line gives a session time in
//! seconds and a JSON encoded command, for example:
//!
//! ```text
//! 1.0: {"Start": null};
//! 2.5: {"Twist": {"lin_ms": 0.4, "ang_rads": 0.0}};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use veh_if::cmd::{CmdParseError, DriveCmd};
use crate::session::get_elapsed_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
pub struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The command to run
    cmd: DriveCmd
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_cmds` to acquire a list of commands that need executing.
pub struct ScriptInterpreter {
    _script_path: PathBuf,
    cmds: VecDeque<Command>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("No script file at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script contains no command lines")]
    ScriptEmpty,

    #[error("Bad timestamp in the script ({0}), expected a float like 1.0")]
    InvalidTimestamp(String),

    #[error("Bad command in the script at {0} s: {1}")]
    InvalidCmd(f64, CmdParseError)
}

pub enum PendingCmds {
    None,
    Some(Vec<DriveCmd>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path.display().to_string()));
        }

        let script =
            fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        Ok(ScriptInterpreter {
            _script_path: path,
            cmds: parse_script(&script)?
        })
    }

    /// Return a vector of pending commands, or `None` if no commands need
    /// executing now.
    pub fn get_pending_cmds(&mut self) -> PendingCmds {
        self.get_pending_cmds_at(get_elapsed_seconds())
    }

    /// Return the commands pending at the given session time.
    ///
    /// Commands are pending once their execution time has passed. Each
    /// command is handed out exactly once; when the queue runs dry the
    /// script is over.
    pub fn get_pending_cmds_at(&mut self, current_time_s: f64) -> PendingCmds {
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript
        }

        let mut due: Vec<DriveCmd> = vec![];

        while self
            .cmds
            .front()
            .map_or(false, |c| c.exec_time_s < current_time_s)
        {
            if let Some(command) = self.cmds.pop_front() {
                due.push(command.cmd);
            }
        }

        if due.is_empty() {
            PendingCmds::None
        }
        else {
            PendingCmds::Some(due)
        }
    }

    /// Get the number of commands in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        self.cmds.back().map_or(0.0, |c| c.exec_time_s)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse the text of a script into a queue of timed commands.
///
/// Lines have the form `time: payload;`. Anything not matching the pattern,
/// including comment lines, is skipped.
fn parse_script(script: &str) -> Result<VecDeque<Command>, ScriptError> {
    let mut cmd_queue: VecDeque<Command> = VecDeque::new();

    let line_re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
        .multi_line(true)
        .build()
        .unwrap();

    for cap in line_re.captures_iter(script) {
        let time_str = cap.get(1).map_or("", |m| m.as_str());
        let exec_time_s: f64 = time_str
            .parse()
            .map_err(|_| ScriptError::InvalidTimestamp(time_str.to_string()))?;

        // The payload is JSON only
        let payload = cap.get(3).map_or("", |m| m.as_str());
        let cmd = DriveCmd::from_json(payload)
            .map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

        cmd_queue.push_back(Command { exec_time_s, cmd });
    }

    if cmd_queue.is_empty() {
        return Err(ScriptError::ScriptEmpty)
    }

    Ok(cmd_queue)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
        1.0: {"Start": null};
        2.0: {"Twist": {"lin_ms": 0.4, "ang_rads": 0.1}};
        5.5: {"Halt": null};
    "#;

    #[test]
    fn test_parse_script() {
        let cmds = parse_script(SCRIPT).unwrap();

        assert_eq!(cmds.len(), 3);
        assert!(matches!(cmds[0].cmd, DriveCmd::Start));
        assert!(matches!(cmds[2].cmd, DriveCmd::Halt));
        assert_eq!(cmds[1].exec_time_s, 2.0);
    }

    #[test]
    fn test_parse_rejects_bad_cmd() {
        let script = r#"1.0: {"Sideways": null};"#;

        assert!(matches!(
            parse_script(script),
            Err(ScriptError::InvalidCmd(_, _))
        ));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(parse_script(""), Err(ScriptError::ScriptEmpty)));
    }

    #[test]
    fn test_pending_cmds() {
        let mut si = ScriptInterpreter {
            _script_path: PathBuf::new(),
            cmds: parse_script(SCRIPT).unwrap()
        };

        assert_eq!(si.get_num_cmds(), 3);
        assert_eq!(si.get_duration(), 5.5);

        // Before the first command nothing is pending
        assert!(matches!(si.get_pending_cmds_at(0.5), PendingCmds::None));

        // At 2.5 s both the start and the twist are due
        match si.get_pending_cmds_at(2.5) {
            PendingCmds::Some(v) => assert_eq!(v.len(), 2),
            _ => panic!("expected pending commands")
        }

        // Drain the rest, then the script is over
        match si.get_pending_cmds_at(10.0) {
            PendingCmds::Some(v) => assert_eq!(v.len(), 1),
            _ => panic!("expected pending commands")
        }
        assert!(matches!(
            si.get_pending_cmds_at(10.0),
            PendingCmds::EndOfScript
        ));
    }
}
