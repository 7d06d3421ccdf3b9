//! Backing storage and the per-step bus interface.

use std::fs;
use std::path::Path;

use tracing::{info, trace, warn};

use crate::error::MemError;
use crate::queue::DelayQueue;
use crate::stall::StallSource;

/// Largest supported beat, in words (one select nibble per word in a `u64`).
pub const MAX_BEAT_WORDS: u32 = 16;

/// Construction parameters for a [`BusMemory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Storage size in words; rounded up to a power of two.
    pub words: usize,
    /// Steps from an accepted request to its acknowledgment.
    pub delay: u32,
    /// Stall probability denominator; zero disables stalls.
    pub stall_one_in: u32,
    /// Seed for the stall generator; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Words transferred per bus beat.
    pub words_per_beat: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            words: 1 << 20,
            delay: 4,
            stall_one_in: 64,
            seed: None,
            words_per_beat: 1,
        }
    }
}

/// Bus master signals for one step.
///
/// Multi-word beats list words most significant first: `data[k]` goes to
/// word `addr * width + k` and is selected by nibble `width - 1 - k` of
/// `sel`. Within a nibble, bit 3 selects bits 31:24 and bit 0 bits 7:0.
/// Words missing from a short `data` slice are treated as unselected.
#[derive(Clone, Copy, Debug, Default)]
pub struct BusRequest<'a> {
    /// Bus cycle in progress.
    pub cyc: bool,
    /// Request strobe.
    pub stb: bool,
    /// Write enable.
    pub we: bool,
    /// Beat address.
    pub addr: u32,
    /// Write data.
    pub data: &'a [u32],
    /// Byte selects.
    pub sel: u64,
}

/// Target responses for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStatus {
    /// The request was not accepted this step.
    pub stall: bool,
    /// A request accepted `delay` steps ago completes now.
    pub ack: bool,
}

/// Delayed-acknowledgment memory on a pipelined bus.
#[derive(Debug, Clone)]
pub struct BusMemory {
    mem: Vec<u32>,
    width: usize,
    queue: DelayQueue,
    stall: StallSource,
}

impl BusMemory {
    /// Creates zero-filled memory.
    pub fn new(config: &BusConfig) -> Result<Self, MemError> {
        if config.delay == 0 {
            return Err(MemError::InvalidDelay(config.delay));
        }
        let w = config.words_per_beat;
        if w == 0 || w > MAX_BEAT_WORDS || !w.is_power_of_two() {
            return Err(MemError::InvalidBeatWidth(w));
        }
        let width = w as usize;
        let len = config.words.max(width).next_power_of_two();
        Ok(Self {
            mem: vec![0; len],
            width,
            queue: DelayQueue::new(config.delay as usize, width),
            stall: StallSource::new(config.stall_one_in, config.seed),
        })
    }

    /// Storage size in words.
    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    /// Words per beat.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The in-flight response queue.
    pub fn queue(&self) -> &DelayQueue {
        &self.queue
    }

    fn index(&self, word_addr: usize) -> usize {
        word_addr % self.mem.len()
    }

    /// Reads a word, wrapping the address.
    pub fn word(&self, addr: usize) -> u32 {
        self.mem[self.index(addr)]
    }

    /// Writes a word, wrapping the address.
    pub fn set_word(&mut self, addr: usize, value: u32) {
        let i = self.index(addr);
        self.mem[i] = value;
    }

    /// Advances one bus-domain step.
    ///
    /// `out` receives the read data of the acknowledged request; it is only
    /// meaningful when `ack` is set.
    pub fn apply(&mut self, req: &BusRequest<'_>, out: &mut [u32]) -> BusStatus {
        if !req.cyc {
            self.queue.clear();
            return BusStatus::default();
        }

        let ack = self.queue.advance(out);
        let stall = req.stb && self.stall.sample();

        if req.stb && !stall {
            let base = req.addr as usize * self.width;
            if req.we {
                if req.data.len() < self.width {
                    warn!(
                        addr = req.addr,
                        words = req.data.len(),
                        width = self.width,
                        "short write beat; missing words left unwritten"
                    );
                }
                for (k, &value) in req.data.iter().take(self.width).enumerate() {
                    let nibble = (req.sel >> ((self.width - 1 - k) * 4)) & 0x0F;
                    self.write_masked(base + k, value, nibble as u8);
                }
                trace!(addr = req.addr, sel = req.sel, "bus write");
                self.queue.accept(None);
            } else {
                let words: Vec<u32> = (0..self.width).map(|k| self.word(base + k)).collect();
                trace!(addr = req.addr, data = ?words, "bus read");
                self.queue.accept(Some(words.as_slice()));
            }
        }

        BusStatus { stall, ack }
    }

    fn write_masked(&mut self, addr: usize, value: u32, nibble: u8) {
        let mut mask = 0u32;
        for byte in 0..4 {
            if nibble & (1 << byte) != 0 {
                mask |= 0xFF << (byte * 8);
            }
        }
        let i = self.index(addr);
        self.mem[i] = (self.mem[i] & !mask) | (value & mask);
    }

    /// Bulk-loads big-endian bytes starting at word `addr`. A trailing
    /// partial word is padded with zeros.
    pub fn load_bytes(&mut self, addr: usize, bytes: &[u8]) {
        for (k, chunk) in bytes.chunks(4).enumerate() {
            let mut b = [0u8; 4];
            b[..chunk.len()].copy_from_slice(chunk);
            self.set_word(addr + k, u32::from_be_bytes(b));
        }
    }

    /// Loads an image of big-endian words into memory from address zero.
    ///
    /// Storage not covered by the file is zero-filled. A missing file or one
    /// shorter than the memory is reported as an error after filling.
    pub fn load_file(&mut self, path: &Path) -> Result<(), MemError> {
        self.mem.fill(0);
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load memory image; using zeros");
                return Err(e.into());
            }
        };
        let read = (bytes.len() / 4).min(self.mem.len());
        self.load_bytes(0, &bytes[..read * 4]);
        info!(path = %path.display(), words = read, "loaded memory image");
        if read < self.mem.len() {
            warn!(read, expected = self.mem.len(), "short memory image; tail zero-filled");
            return Err(MemError::ShortImage {
                read,
                expected: self.mem.len(),
            });
        }
        Ok(())
    }

    /// Writes the whole memory to `path` as big-endian words.
    pub fn save_file(&self, path: &Path) -> Result<(), MemError> {
        let bytes: Vec<u8> = self.mem.iter().flat_map(|w| w.to_be_bytes()).collect();
        fs::write(path, bytes)?;
        Ok(())
    }
}
