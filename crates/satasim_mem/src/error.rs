//! Error types for the bus memory model.

use std::io;

/// Errors from constructing or loading a [`BusMemory`](crate::BusMemory).
#[derive(Debug, thiserror::Error)]
pub enum MemError {
    /// The memory image could not be read or written.
    #[error("memory image I/O error: {0}")]
    Io(#[from] io::Error),

    /// The image held fewer words than the memory; the rest was zero-filled.
    #[error("only read {read} of {expected} words; remainder zero-filled")]
    ShortImage {
        /// Words read from the image.
        read: usize,
        /// Words of storage.
        expected: usize,
    },

    /// The acknowledgment delay must be at least one step.
    #[error("invalid bus delay {0}: must be at least 1")]
    InvalidDelay(u32),

    /// Beat width must be a power of two between 1 and 16 words.
    #[error("invalid beat width {0}: must be a power of two in 1..=16")]
    InvalidBeatWidth(u32),
}
