//! Parameter file loading
//!
//! Parameter files are TOML documents under `$DRIVE_SW_ROOT/params`. Any
//! deserialisable struct can be loaded, so each module defines its own
//! parameter struct and carries its own defaults.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use serde::de::DeserializeOwned;
use std::fs;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (DRIVE_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file into the given struct.
///
/// `param_file_path` is relative to the `$DRIVE_SW_ROOT/params` directory.
pub fn load<P: DeserializeOwned>(param_file_path: &str) -> Result<P, LoadError> {
    let mut path =
        crate::host::get_drive_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    let text = fs::read_to_string(path).map_err(LoadError::FileLoadError)?;

    toml::from_str(&text).map_err(LoadError::DeserialiseError)
}
