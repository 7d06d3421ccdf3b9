//! Conformance helpers for the SATA device simulator.
//!
//! [`HostPort`] plays the controller side of the link against a
//! [`SataDevice`]: it performs the OOB handshake, exchanges frames with the
//! same scrambling and CRC rules the device uses, and wraps the ATA commands
//! the device understands. [`bus_write`] and [`bus_read`] act as a pipelined
//! bus master for [`BusMemory`]. Every helper is bounded by a step limit and
//! reports [`HarnessError::Timeout`] instead of spinning forever.

#![warn(missing_docs)]

use satasim_common::fis::{MAX_DATA_FIS_WORDS, SECTOR_WORDS};
use satasim_common::{AtaCommand, Fis, FisError, PhyWord, PioSetup, Primitive, RegD2h, RegH2d};
use satasim_config::SimConfig;
use satasim_link::{
    DiskImage, FrameCodec, LinkError, RxSignals, SataDevice, TxSignals, TxStatus,
};
use satasim_mem::{BusMemory, BusRequest, MemError};

/// Default per-operation step limit.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// Failures observed by the host-side helpers.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// An operation did not finish within its step limit.
    #[error("{operation} did not finish within {steps} steps")]
    Timeout {
        /// What was being waited for.
        operation: &'static str,
        /// Steps spent before giving up.
        steps: usize,
    },

    /// The device answered a host frame with ERR.
    #[error("device rejected the frame")]
    Rejected,

    /// A frame from the device failed its CRC check.
    #[error("frame from device failed its CRC check")]
    BadCrc,

    /// A frame from the device could not be decoded.
    #[error("undecodable frame from device: {0}")]
    Fis(#[from] FisError),

    /// The configured disk image could not be loaded.
    #[error("disk image: {0}")]
    Disk(#[from] LinkError),

    /// The configured memory could not be built or its image loaded.
    #[error("bus memory: {0}")]
    Memory(#[from] MemError),

    /// The device sent a different FIS than the protocol calls for.
    #[error("expected {expected}, device sent FIS type {got:#04x}")]
    UnexpectedFis {
        /// FIS the host was waiting for.
        expected: &'static str,
        /// Type byte actually received.
        got: u8,
    },
}

/// A frame received from the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Descrambled payload words, host order, without the CRC trailer.
    pub words: Vec<u32>,
    /// Data words exactly as they appeared on the wire, trailer included.
    pub wire: Vec<u32>,
    /// Whether the trailer matched the payload.
    pub crc_ok: bool,
}

/// Counts steps against a limit for one operation.
struct Budget {
    operation: &'static str,
    limit: usize,
    used: usize,
}

impl Budget {
    fn spend(&mut self) -> Result<(), HarnessError> {
        if self.used >= self.limit {
            return Err(HarnessError::Timeout {
                operation: self.operation,
                steps: self.used,
            });
        }
        self.used += 1;
        Ok(())
    }
}

/// Host controller model driving one [`SataDevice`].
#[derive(Debug)]
pub struct HostPort {
    device: SataDevice,
    step_limit: usize,
    steps: u64,
}

impl HostPort {
    /// Wraps a device. The link is not brought up; see [`HostPort::bring_up`].
    pub fn new(device: SataDevice) -> Self {
        Self {
            device,
            step_limit: DEFAULT_STEP_LIMIT,
            steps: 0,
        }
    }

    /// Builds a device from a loaded configuration.
    ///
    /// The disk has `disk.sectors` sectors, filled from `disk.image` when one
    /// is configured. A missing or short image is an error.
    pub fn from_config(config: &SimConfig) -> Result<Self, HarnessError> {
        let mut disk = DiskImage::new(config.disk.sectors);
        if let Some(path) = &config.disk.image {
            disk.load(path)?;
        }
        Ok(Self::new(SataDevice::new(config.to_link_config(), disk)))
    }

    /// Sets the step limit applied to each operation.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// The device under test.
    pub fn device(&self) -> &SataDevice {
        &self.device
    }

    /// The device under test, mutably.
    pub fn device_mut(&mut self) -> &mut SataDevice {
        &mut self.device
    }

    /// Total steps driven so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn budget(&self, operation: &'static str) -> Budget {
        Budget {
            operation,
            limit: self.step_limit,
            used: 0,
        }
    }

    /// Drives one full step: a TX edge followed by an RX edge.
    pub fn cycle(&mut self, tx: &TxSignals) -> (TxStatus, RxSignals) {
        self.steps += 1;
        let status = self.device.step_tx(tx);
        let rx = self.device.step_rx();
        (status, rx)
    }

    /// Sends one word with the link up and returns the device's word.
    pub fn send(&mut self, word: PhyWord) -> PhyWord {
        let (_, rx) = self.cycle(&TxSignals {
            word,
            ..TxSignals::default()
        });
        rx.word
    }

    fn send_primitive(&mut self, p: Primitive) -> PhyWord {
        self.send(PhyWord::primitive(p))
    }

    /// Runs the OOB handshake: COMRESET, wait for COMINIT, COMWAKE, wait for
    /// COMWAKE, then wait for the PHY to report ready.
    pub fn bring_up(&mut self) -> Result<(), HarnessError> {
        let idle = TxSignals {
            elecidle: true,
            ..TxSignals::default()
        };

        let mut budget = self.budget("COMRESET");
        loop {
            budget.spend()?;
            let (status, rx) = self.cycle(&TxSignals {
                cominit: true,
                ..idle
            });
            if status.comfinish {
                if !rx.cominit {
                    self.wait_for(&idle, "COMINIT", |rx| rx.cominit)?;
                }
                break;
            }
        }

        let mut budget = self.budget("COMWAKE");
        loop {
            budget.spend()?;
            let (status, rx) = self.cycle(&TxSignals {
                comwake: true,
                ..idle
            });
            if status.comfinish {
                if !rx.comwake {
                    self.wait_for(&idle, "device COMWAKE", |rx| rx.comwake)?;
                }
                break;
            }
        }

        self.wait_for(&idle, "PHY ready", |rx| rx.phy_ready)?;
        Ok(())
    }

    fn wait_for(
        &mut self,
        tx: &TxSignals,
        operation: &'static str,
        done: impl Fn(&RxSignals) -> bool,
    ) -> Result<RxSignals, HarnessError> {
        let mut budget = self.budget(operation);
        loop {
            budget.spend()?;
            let (_, rx) = self.cycle(tx);
            if done(&rx) {
                return Ok(rx);
            }
        }
    }

    /// Sends SYNC until the device also sends SYNC.
    pub fn wait_idle(&mut self) -> Result<(), HarnessError> {
        let mut budget = self.budget("link idle");
        loop {
            budget.spend()?;
            if self.send_primitive(Primitive::Sync).is(Primitive::Sync) {
                return Ok(());
            }
        }
    }

    /// Transmits one frame of host-order words and returns the device's
    /// verdict: `true` for OK, `false` for ERR.
    pub fn send_frame(&mut self, words: &[u32]) -> Result<bool, HarnessError> {
        let mut budget = self.budget("RRDY");
        loop {
            budget.spend()?;
            if self.send_primitive(Primitive::XRdy).is(Primitive::RRdy) {
                break;
            }
        }

        let mut codec = FrameCodec::new();
        self.send_primitive(Primitive::Sof);
        for &word in words {
            self.send(PhyWord::data(codec.encode_data(word)));
        }
        self.send(PhyWord::data(codec.encode_crc()));
        self.send_primitive(Primitive::Eof);

        let mut budget = self.budget("frame status");
        let ok = loop {
            budget.spend()?;
            match self.send_primitive(Primitive::Wtrm).as_primitive() {
                Some(Primitive::Ok) => break true,
                Some(Primitive::Err) => break false,
                _ => {}
            }
        };
        self.send_primitive(Primitive::Sync);
        Ok(ok)
    }

    /// Waits for the device to transmit a frame and receives it, answering
    /// OK or ERR according to its CRC.
    pub fn receive_frame(&mut self) -> Result<ReceivedFrame, HarnessError> {
        let mut budget = self.budget("XRDY");
        loop {
            budget.spend()?;
            if self.send_primitive(Primitive::Sync).is(Primitive::XRdy) {
                break;
            }
        }

        let mut budget = self.budget("SOF");
        loop {
            budget.spend()?;
            if self.send_primitive(Primitive::RRdy).is(Primitive::Sof) {
                break;
            }
        }

        let mut wire = Vec::new();
        let mut budget = self.budget("EOF");
        loop {
            budget.spend()?;
            let word = self.send_primitive(Primitive::RIp);
            if word.is(Primitive::Eof) {
                break;
            }
            if !word.primitive {
                wire.push(word.data);
            }
        }

        let mut codec = FrameCodec::new();
        let mut words: Vec<u32> = wire.iter().map(|&w| codec.decode(w)).collect();
        let trailer = words.pop();
        for &w in &words {
            codec.accumulate(w);
        }
        let crc_ok = !words.is_empty() && trailer == Some(codec.crc());

        let verdict = if crc_ok { Primitive::Ok } else { Primitive::Err };
        self.send_primitive(verdict);
        Ok(ReceivedFrame {
            words,
            wire,
            crc_ok,
        })
    }

    /// Sends a frame and fails if the device rejects it.
    pub fn send_fis(&mut self, fis: &Fis) -> Result<(), HarnessError> {
        if self.send_frame(&fis.to_words())? {
            Ok(())
        } else {
            Err(HarnessError::Rejected)
        }
    }

    /// Receives one frame and decodes it.
    pub fn receive_fis(&mut self) -> Result<Fis, HarnessError> {
        let frame = self.receive_frame()?;
        if !frame.crc_ok {
            return Err(HarnessError::BadCrc);
        }
        Ok(Fis::parse(&frame.words)?)
    }

    fn expect_d2h(&mut self) -> Result<RegD2h, HarnessError> {
        match self.receive_fis()? {
            Fis::RegD2h(d2h) => Ok(d2h),
            other => Err(unexpected("Register D2H", &other)),
        }
    }

    /// Issues WRITE DMA for `data` starting at `lba`. `data` must be a whole
    /// number of sectors, at most 256. Returns the completion FIS.
    pub fn dma_write(&mut self, lba: u64, data: &[u32]) -> Result<RegD2h, HarnessError> {
        let sectors = data.len() / SECTOR_WORDS;
        self.send_fis(&Fis::RegH2d(RegH2d::new(
            AtaCommand::DmaWrite,
            lba,
            sectors as u8,
        )))?;
        for chunk in data.chunks(MAX_DATA_FIS_WORDS) {
            match self.receive_fis()? {
                Fis::DmaActivate => {}
                Fis::RegD2h(d2h) => return Ok(d2h),
                other => return Err(unexpected("DMA Activate", &other)),
            }
            self.send_fis(&Fis::Data(chunk.to_vec()))?;
        }
        self.expect_d2h()
    }

    /// Issues READ DMA for `sectors` sectors at `lba` and collects the data.
    pub fn dma_read(&mut self, lba: u64, sectors: u8) -> Result<(Vec<u32>, RegD2h), HarnessError> {
        self.send_fis(&Fis::RegH2d(RegH2d::new(AtaCommand::DmaRead, lba, sectors)))?;
        let mut data = Vec::new();
        loop {
            match self.receive_fis()? {
                Fis::Data(words) => data.extend(words),
                Fis::RegD2h(d2h) => return Ok((data, d2h)),
                other => return Err(unexpected("Data or Register D2H", &other)),
            }
        }
    }

    /// Issues WRITE BUFFER with one sector of data.
    pub fn pio_write_buffer(&mut self, data: &[u32]) -> Result<RegD2h, HarnessError> {
        self.send_fis(&Fis::RegH2d(RegH2d::new(AtaCommand::PioWriteBuffer, 0, 1)))?;
        self.expect_pio_setup()?;
        self.send_fis(&Fis::Data(data.to_vec()))?;
        self.expect_d2h()
    }

    /// Issues READ BUFFER and returns the sector it carries.
    pub fn pio_read_buffer(&mut self) -> Result<Vec<u32>, HarnessError> {
        self.send_fis(&Fis::RegH2d(RegH2d::new(AtaCommand::PioReadBuffer, 0, 1)))?;
        self.expect_pio_setup()?;
        match self.receive_fis()? {
            Fis::Data(words) => Ok(words),
            other => Err(unexpected("Data", &other)),
        }
    }

    fn expect_pio_setup(&mut self) -> Result<PioSetup, HarnessError> {
        match self.receive_fis()? {
            Fis::PioSetup(setup) => Ok(setup),
            other => Err(unexpected("PIO Setup", &other)),
        }
    }
}

fn unexpected(expected: &'static str, got: &Fis) -> HarnessError {
    HarnessError::UnexpectedFis {
        expected,
        got: got.type_byte(),
    }
}

/// Builds the bus memory described by a loaded configuration, filled from
/// `memory.image` when one is configured. A missing or short image is an
/// error.
pub fn memory_from_config(config: &SimConfig) -> Result<BusMemory, HarnessError> {
    let mut mem = BusMemory::new(&config.to_bus_config())?;
    if let Some(path) = &config.memory.image {
        mem.load_file(path)?;
    }
    Ok(mem)
}

/// Writes `words` starting at beat `addr` with back-to-back strobes,
/// retrying stalled beats, and waits for every acknowledgment. Returns the
/// steps taken.
pub fn bus_write(
    mem: &mut BusMemory,
    addr: u32,
    words: &[u32],
    step_limit: usize,
) -> Result<usize, HarnessError> {
    let width = mem.width();
    let beats: Vec<&[u32]> = words.chunks(width).collect();
    let mut out = vec![0; width];
    let mut budget = Budget {
        operation: "bus write",
        limit: step_limit,
        used: 0,
    };
    let (mut issued, mut acked) = (0, 0);
    while acked < beats.len() {
        budget.spend()?;
        let stb = issued < beats.len();
        let req = BusRequest {
            cyc: true,
            stb,
            we: true,
            addr: addr.wrapping_add(issued as u32),
            data: beats.get(issued).copied().unwrap_or(&[]),
            sel: u64::MAX,
        };
        let status = mem.apply(&req, &mut out);
        if stb && !status.stall {
            issued += 1;
        }
        if status.ack {
            acked += 1;
        }
    }
    Ok(budget.used)
}

/// Reads `beats` beats starting at `addr` with back-to-back strobes and
/// returns the data in address order.
pub fn bus_read(
    mem: &mut BusMemory,
    addr: u32,
    beats: usize,
    step_limit: usize,
) -> Result<Vec<u32>, HarnessError> {
    let width = mem.width();
    let mut out = vec![0; width];
    let mut data = Vec::with_capacity(beats * width);
    let mut budget = Budget {
        operation: "bus read",
        limit: step_limit,
        used: 0,
    };
    let mut issued = 0;
    while data.len() < beats * width {
        budget.spend()?;
        let stb = issued < beats;
        let req = BusRequest {
            cyc: true,
            stb,
            addr: addr.wrapping_add(issued as u32),
            ..BusRequest::default()
        };
        let status = mem.apply(&req, &mut out);
        if stb && !status.stall {
            issued += 1;
        }
        if status.ack {
            data.extend_from_slice(&out);
        }
    }
    Ok(data)
}
