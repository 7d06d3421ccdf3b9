//! Error types for the link-layer device model.
//!
//! Protocol failures (bad CRC, aborted frames) are link states, not errors.
//! [`LinkError`] covers disk image I/O and out-of-range sector access.

use std::io;

/// Errors from disk image handling.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The disk image could not be read or written.
    #[error("disk image I/O error: {0}")]
    Io(#[from] io::Error),

    /// The image file was smaller than the configured disk; the tail was
    /// zero-filled.
    #[error("disk image holds {read} of {expected} bytes; remainder zero-filled")]
    ShortImage {
        /// Bytes actually read.
        read: usize,
        /// Bytes the disk holds.
        expected: usize,
    },

    /// A transfer addressed sectors beyond the end of the disk.
    #[error("LBA {lba} + {count} sectors exceeds disk of {sectors} sectors")]
    LbaOutOfRange {
        /// First sector of the transfer.
        lba: u64,
        /// Number of sectors requested.
        count: usize,
        /// Sectors on the disk.
        sectors: usize,
    },
}
