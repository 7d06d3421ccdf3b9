//! PHY words and the wire byte swap.
//!
//! Every word crossing the simulated link is 32 data bits plus a primitive
//! flag. On the PHY ports this is a 33-bit value with the flag at bit 32.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::primitive::Primitive;

/// Bit position of the primitive flag in a packed 33-bit PHY value.
pub const PRIMITIVE_BIT: u32 = 32;

/// One 32-bit word on the link with its out-of-band primitive flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct PhyWord {
    /// The 32 data bits.
    pub data: u32,
    /// Whether `data` is to be interpreted as a primitive codeword.
    pub primitive: bool,
}

impl PhyWord {
    /// Creates a word carrying the given primitive.
    pub const fn primitive(p: Primitive) -> Self {
        Self {
            data: p.code(),
            primitive: true,
        }
    }

    /// Creates a data (non-primitive) word.
    pub const fn data(data: u32) -> Self {
        Self {
            data,
            primitive: false,
        }
    }

    /// Returns the primitive carried by this word, if it is flagged as one
    /// and its codeword is recognised.
    pub fn as_primitive(self) -> Option<Primitive> {
        if self.primitive {
            Primitive::from_code(self.data)
        } else {
            None
        }
    }

    /// Returns `true` if this word is the given primitive.
    pub fn is(self, p: Primitive) -> bool {
        self.primitive && self.data == p.code()
    }

    /// Packs into the 33-bit port representation.
    pub const fn packed(self) -> u64 {
        let mut v = self.data as u64;
        if self.primitive {
            v |= 1 << PRIMITIVE_BIT;
        }
        v
    }

    /// Unpacks a 33-bit port value. Bits above the flag are ignored.
    pub const fn from_packed(v: u64) -> Self {
        Self {
            data: v as u32,
            primitive: (v >> PRIMITIVE_BIT) & 1 != 0,
        }
    }
}

impl fmt::Display for PhyWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_primitive() {
            Some(p) => write!(f, "{p}"),
            None if self.primitive => write!(f, "P:{:08x}", self.data),
            None => write!(f, "{:08x}", self.data),
        }
    }
}

/// Reverses the byte order of a 32-bit word.
pub const fn swap_endian(v: u32) -> u32 {
    v.swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_endian_reverses_bytes() {
        assert_eq!(swap_endian(0x1122_3344), 0x4433_2211);
        assert_eq!(swap_endian(0x0000_0039), 0x3900_0000);
    }

    #[test]
    fn packed_places_flag_at_bit_32() {
        let w = PhyWord::primitive(Primitive::Sync);
        assert_eq!(w.packed(), (1u64 << 32) | 0x7C95_B5B5);
        assert_eq!(PhyWord::data(0xDEAD_BEEF).packed(), 0xDEAD_BEEF);
        assert_eq!(PhyWord::from_packed(w.packed()), w);
    }

    #[test]
    fn data_word_with_primitive_value_is_not_a_primitive() {
        let w = PhyWord::data(Primitive::Sof.code());
        assert_eq!(w.as_primitive(), None);
        assert!(!w.is(Primitive::Sof));
    }

    #[test]
    fn display_names_primitives() {
        assert_eq!(PhyWord::primitive(Primitive::Eof).to_string(), "EOF");
        assert_eq!(PhyWord::data(0x39).to_string(), "00000039");
    }
}
