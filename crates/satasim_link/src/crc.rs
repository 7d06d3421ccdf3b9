//! Frame CRC.
//!
//! A bit-serial CRC-32 over each frame's data words, MSB first, seeded with a
//! non-standard initial value.

/// CRC generator polynomial.
pub const CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;
/// Register value loaded at link reset and at the start of every frame.
pub const CRC_INITIAL: u32 = 0x5232_5032;

/// Folds one 32-bit word into the CRC register, most significant bit first.
pub fn advance_crc(prior: u32, word: u32) -> u32 {
    let mut crc = prior;
    for bit in (0..32).rev() {
        let feedback = (crc >> 31) ^ ((word >> bit) & 1);
        crc <<= 1;
        if feedback != 0 {
            crc ^= CRC_POLYNOMIAL;
        }
    }
    crc
}

/// Stateful CRC accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// Creates an accumulator at the initial value.
    pub fn new() -> Self {
        Self { value: CRC_INITIAL }
    }

    /// Reloads the initial value.
    pub fn reset(&mut self) {
        self.value = CRC_INITIAL;
    }

    /// Folds one word into the register.
    pub fn advance(&mut self, word: u32) {
        self.value = advance_crc(self.value, word);
    }

    /// Returns the current register value.
    pub fn value(&self) -> u32 {
        self.value
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
