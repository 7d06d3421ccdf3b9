//! Link data scrambler.
//!
//! A 16-bit LFSR produces 32 pseudo-random bits per data word. The same
//! sequence is XORed onto the data on transmit and off it on receive, so
//! both ends must reseed at the same frame boundary.

/// LFSR feedback polynomial.
pub const SCRAMBLER_POLYNOMIAL: u16 = 0xA011;
/// Fill loaded at link reset and at the start of every frame.
pub const SCRAMBLER_INITIAL: u16 = 0xFFFF;

/// Advances the LFSR by 32 bits from `prior`.
///
/// Returns the 32-bit mask and the new fill. Bit `k` of the mask is the fill's
/// MSB before the `k`-th shift.
pub fn scramble_function(prior: u16) -> (u32, u16) {
    let mut fill = prior;
    let mut mask = 0u32;
    for k in 0..32 {
        let msb = fill >> 15;
        mask |= u32::from(msb) << k;
        fill <<= 1;
        if msb != 0 {
            fill ^= SCRAMBLER_POLYNOMIAL;
        }
    }
    (mask, fill)
}

/// Stateful scrambler, advanced one word at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scrambler {
    fill: u16,
}

impl Scrambler {
    /// Creates a scrambler at the initial fill.
    pub fn new() -> Self {
        Self::with_fill(SCRAMBLER_INITIAL)
    }

    /// Creates a scrambler at an arbitrary fill.
    pub fn with_fill(fill: u16) -> Self {
        Self { fill }
    }

    /// Reloads the initial fill.
    pub fn reset(&mut self) {
        self.fill = SCRAMBLER_INITIAL;
    }

    /// Returns the current fill.
    pub fn fill(&self) -> u16 {
        self.fill
    }

    /// Returns the next 32-bit mask and advances.
    pub fn next_mask(&mut self) -> u32 {
        let (mask, fill) = scramble_function(self.fill);
        self.fill = fill;
        mask
    }

    /// Scrambles (or unscrambles) one word.
    pub fn scramble(&mut self, data: u32) -> u32 {
        data ^ self.next_mask()
    }
}

impl Default for Scrambler {
    fn default() -> Self {
        Self::new()
    }
}
