//! SATA link primitives and their 32-bit codewords.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A link-layer primitive from the closed set the simulator understands.
///
/// Primitives travel on the same 32-bit lanes as data; they are told apart
/// by the out-of-band primitive flag on [`PhyWord`](crate::PhyWord), never
/// by inspecting the value alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Primitive {
    /// Clock compensation / link bring-up filler.
    Align,
    /// Idle filler between frames.
    Sync,
    /// Transmitter has a frame ready.
    XRdy,
    /// Receiver is ready for a frame.
    RRdy,
    /// Start of frame.
    Sof,
    /// End of frame.
    Eof,
    /// Transmitter waits for frame termination status.
    Wtrm,
    /// Frame received without error.
    Ok,
    /// Frame received with an error.
    Err,
    /// Reception in progress.
    RIp,
}

impl Primitive {
    /// All primitives, in declaration order.
    pub const ALL: [Primitive; 10] = [
        Primitive::Align,
        Primitive::Sync,
        Primitive::XRdy,
        Primitive::RRdy,
        Primitive::Sof,
        Primitive::Eof,
        Primitive::Wtrm,
        Primitive::Ok,
        Primitive::Err,
        Primitive::RIp,
    ];

    /// Returns the 32-bit codeword transmitted for this primitive.
    pub const fn code(self) -> u32 {
        match self {
            Primitive::Align => 0xBC4A_4A7B,
            Primitive::Sync => 0x7C95_B5B5,
            Primitive::XRdy => 0x7CB5_5757,
            Primitive::RRdy => 0x7C95_4A4A,
            Primitive::Sof => 0x7CB5_3737,
            Primitive::Eof => 0x7CB5_D5D5,
            Primitive::Wtrm => 0x7CB5_5858,
            Primitive::Ok => 0x7CB5_3535,
            Primitive::Err => 0x7CB5_5656,
            Primitive::RIp => 0x7CB5_5555,
        }
    }

    /// Decodes a codeword, returning `None` for values outside the set.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Returns the conventional protocol name (e.g. `"R_IP"`).
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Align => "ALIGN",
            Primitive::Sync => "SYNC",
            Primitive::XRdy => "XRDY",
            Primitive::RRdy => "RRDY",
            Primitive::Sof => "SOF",
            Primitive::Eof => "EOF",
            Primitive::Wtrm => "WTRM",
            Primitive::Ok => "OK",
            Primitive::Err => "ERR",
            Primitive::RIp => "R_IP",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
