//! Per-frame scrambler and CRC state with wire byte ordering.
//!
//! [`FrameCodec`] owns both engines so they can only be reseeded together.
//! Words are scrambled in host order and byte-swapped onto the wire; the
//! receive path reverses that.

use satasim_common::swap_endian;

use crate::crc::Crc32;
use crate::scrambler::Scrambler;

/// Scrambler and CRC state for one direction of one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameCodec {
    scrambler: Scrambler,
    crc: Crc32,
}

impl FrameCodec {
    /// Creates a codec at the frame-start state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reseeds scrambler and CRC for a new frame.
    pub fn reset(&mut self) {
        self.scrambler.reset();
        self.crc.reset();
    }

    /// Encodes one host-order data word for transmission, folding it into
    /// the CRC.
    pub fn encode_data(&mut self, word: u32) -> u32 {
        self.crc.advance(word);
        swap_endian(self.scrambler.scramble(word))
    }

    /// Encodes the frame's CRC trailer. The trailer is scrambled but not
    /// folded into the CRC.
    pub fn encode_crc(&mut self) -> u32 {
        let crc = self.crc.value();
        swap_endian(self.scrambler.scramble(crc))
    }

    /// Descrambles one received wire word into host order. The CRC is not
    /// touched; see [`FrameCodec::accumulate`].
    pub fn decode(&mut self, wire: u32) -> u32 {
        self.scrambler.scramble(swap_endian(wire))
    }

    /// Folds a received host-order data word into the CRC.
    pub fn accumulate(&mut self, word: u32) {
        self.crc.advance(word);
    }

    /// Returns the CRC accumulated so far.
    pub fn crc(&self) -> u32 {
        self.crc.value()
    }
}
