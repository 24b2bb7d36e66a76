//! Latest-value command buffer
//!
//! A wait-free single-producer single-consumer cell which always hands the
//! consumer the most recently completed write. Older values are dropped, the
//! consumer never sees a partial write and neither side ever blocks, so the
//! control cycle can read from it without risking a stall.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// Internal
use super::BufferedCmd;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Bit set in `mid` when the middle slot holds a value the reader has not
/// taken yet.
const FRESH: u8 = 0b100;

/// Mask extracting the slot index from `mid`.
const IDX_MASK: u8 = 0b011;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Storage shared between the writer and reader handles.
///
/// The three slots are exchanged through `mid`: at all times the writer's
/// back slot, the index packed into `mid` and the reader's front slot are a
/// permutation of {0, 1, 2}, so each slot has exactly one owner and the slot
/// named by `mid` is owned by nobody.
struct Shared {
    slots: [UnsafeCell<BufferedCmd>; 3],
    mid: AtomicU8,
}

// One side only ever touches the slot it currently owns, ownership is handed
// over through the AcqRel swaps on `mid`.
unsafe impl Sync for Shared {}
unsafe impl Send for Shared {}

/// Producer handle of the command buffer. Exactly one exists per buffer.
pub struct CmdWriter {
    shared: Arc<Shared>,
    back: u8,
}

/// Consumer handle of the command buffer. Exactly one exists per buffer.
pub struct CmdReader {
    shared: Arc<Shared>,
    front: u8,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a connected writer/reader pair.
///
/// Until the first write the reader gets the default command, whose missing
/// timestamp marks it as never valid.
pub fn cmd_channel() -> (CmdWriter, CmdReader) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(BufferedCmd::default()),
            UnsafeCell::new(BufferedCmd::default()),
            UnsafeCell::new(BufferedCmd::default()),
        ],
        mid: AtomicU8::new(1),
    });

    (
        CmdWriter {
            shared: shared.clone(),
            back: 0,
        },
        CmdReader { shared, front: 2 },
    )
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CmdWriter {
    /// Publish a command, replacing any value the reader has not taken yet.
    pub fn write(&mut self, cmd: BufferedCmd) {
        // The back slot is owned by this writer, no other reference to it
        // exists until the swap below hands it over.
        unsafe {
            *self.shared.slots[self.back as usize].get() = cmd;
        }

        let prev = self
            .shared
            .mid
            .swap(self.back | FRESH, Ordering::AcqRel);
        self.back = prev & IDX_MASK;
    }
}

impl CmdReader {
    /// Get the most recently written command, or the value returned last
    /// time if nothing new has been written since.
    pub fn read_latest(&mut self) -> BufferedCmd {
        if self.shared.mid.load(Ordering::Acquire) & FRESH != 0 {
            let prev = self.shared.mid.swap(self.front, Ordering::AcqRel);
            self.front = prev & IDX_MASK;
        }

        // The front slot is owned by this reader until its index is swapped
        // back into `mid`.
        unsafe { *self.shared.slots[self.front as usize].get() }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
