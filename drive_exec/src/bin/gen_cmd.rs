//! # Script line generator
//!
//! Builds a single drive command from its arguments and prints it in the form
//! the script interpreter reads, ready to paste into a script file:
//!
//! ```text
//! $ gen_cmd -t 1.5 twist -- 0.4 0.1
//! 1.5: {"Twist":{"lin_ms":0.4,"ang_rads":0.1}};
//! ```
//!
//! Note the `--` before numeric arguments, which stops negative values being
//! read as flags.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Report};
use structopt::StructOpt;
use veh_if::cmd::DriveCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "gen_cmd", about = "Prints drive commands as script lines")]
struct Opts {
    /// Session time at which the command should execute.
    #[structopt(short = "t", long, default_value = "0.0")]
    time_s: f64,

    /// The command to print.
    #[structopt(subcommand)]
    cmd: DriveCmd,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let json =
        serde_json::to_string(&opts.cmd).wrap_err("Could not serialise the command")?;

    println!("{}: {};", opts.time_s, json);

    Ok(())
}
