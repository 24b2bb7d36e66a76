//! Module framework
//!
//! Control modules follow one lifecycle: initialise once against the
//! session, then run a processing step every cycle of the executive's main
//! loop. The [`State`] trait fixes that contract so executives can drive
//! any module the same way.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The state and lifecycle of a control module.
///
/// `init` runs once before the main loop starts. `proc` runs every cycle
/// and either yields the module's output plus a status report, or an error
/// the executive handles (usually by holding the previous output for a
/// cycle).
pub trait State {
    /// Data required during initialisation
    type InitData;
    /// An error which can occur during initialisation.
    type InitError;

    /// Data required for cyclic processing.
    type InputData;
    /// Data produced by cyclic processing.
    type OutputData;
    /// A report on the status of the cyclic processing.
    type StatusReport;
    /// An error which can occur during cyclic processing.
    type ProcError;

    /// Initialise the module within the given session.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Perform one cycle's processing.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
