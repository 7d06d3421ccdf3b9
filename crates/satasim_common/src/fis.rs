//! Frame Information Structures exchanged over the link.
//!
//! All layouts are given in the host's internal (little-endian) word order:
//! the FIS type lives in the low byte of word 0. Byte swapping for the wire
//! happens in the link layer, not here.

use serde::{Deserialize, Serialize};

/// Register FIS, host to device.
pub const FIS_TYPE_REG_H2D: u8 = 0x27;
/// Register FIS, device to host.
pub const FIS_TYPE_REG_D2H: u8 = 0x34;
/// DMA Activate FIS.
pub const FIS_TYPE_DMA_ACT: u8 = 0x39;
/// Data FIS.
pub const FIS_TYPE_DATA: u8 = 0x46;
/// PIO Setup FIS.
pub const FIS_TYPE_PIO_SETUP: u8 = 0x5F;

/// ATA READ DMA command code.
pub const CMD_DMA_READ: u8 = 0xC8;
/// ATA WRITE DMA command code.
pub const CMD_DMA_WRITE: u8 = 0xCA;
/// ATA READ BUFFER (PIO) command code.
pub const CMD_PIO_READ_BUFFER: u8 = 0xE4;
/// ATA WRITE BUFFER (PIO) command code.
pub const CMD_PIO_WRITE_BUFFER: u8 = 0xE8;

/// Bytes per sector.
pub const SECTOR_SIZE: usize = 512;
/// 32-bit words per sector.
pub const SECTOR_WORDS: usize = SECTOR_SIZE / 4;
/// Largest Data FIS payload, in words (8 KiB).
pub const MAX_DATA_FIS_WORDS: usize = 2048;

/// Device register value with the LBA-mode bit set.
pub const DEVICE_LBA: u8 = 0x40;

/// Status byte reported by a successful Register D2H completion.
pub const STATUS_COMPLETE: u8 = 0x77;
/// Status byte for an aborted command (DRDY | DSC | ERR).
pub const STATUS_ERROR: u8 = 0x51;
/// Error byte for an aborted command (ABRT).
pub const ERROR_ABORT: u8 = 0x04;
/// Extended status reported in PIO Setup word 3.
pub const PIO_E_STATUS: u8 = 0x01;
/// Direction flag in PIO Setup word 0, byte 1: data flows device to host.
pub const PIO_DIR_TO_HOST: u8 = 0x20;

/// Errors from decoding a FIS word sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FisError {
    /// The frame held no words at all.
    #[error("empty FIS")]
    Empty,

    /// Word 0 carried a type byte outside the supported set.
    #[error("unknown FIS type {0:#04x}")]
    UnknownType(u8),

    /// The frame was shorter than its type's fixed layout.
    #[error("FIS type {fis_type:#04x} needs {expected} words, got {got}")]
    Truncated {
        /// The FIS type byte.
        fis_type: u8,
        /// Minimum number of words for this type.
        expected: usize,
        /// Number of words received.
        got: usize,
    },
}

/// The ATA command carried in a Register H2D FIS.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AtaCommand {
    /// READ DMA.
    DmaRead,
    /// WRITE DMA.
    DmaWrite,
    /// READ BUFFER via PIO.
    PioReadBuffer,
    /// WRITE BUFFER via PIO.
    PioWriteBuffer,
    /// Any command code the simulated device does not implement.
    Other(u8),
}

impl AtaCommand {
    /// Decodes a command byte.
    pub fn from_code(code: u8) -> Self {
        match code {
            CMD_DMA_READ => AtaCommand::DmaRead,
            CMD_DMA_WRITE => AtaCommand::DmaWrite,
            CMD_PIO_READ_BUFFER => AtaCommand::PioReadBuffer,
            CMD_PIO_WRITE_BUFFER => AtaCommand::PioWriteBuffer,
            other => AtaCommand::Other(other),
        }
    }

    /// Returns the command byte.
    pub fn code(self) -> u8 {
        match self {
            AtaCommand::DmaRead => CMD_DMA_READ,
            AtaCommand::DmaWrite => CMD_DMA_WRITE,
            AtaCommand::PioReadBuffer => CMD_PIO_READ_BUFFER,
            AtaCommand::PioWriteBuffer => CMD_PIO_WRITE_BUFFER,
            AtaCommand::Other(code) => code,
        }
    }
}

/// A host-to-device register FIS.
///
/// Word 0 follows the controller's command register: type in byte 0,
/// `0x40 | LBA[27:24]` in byte 1, the command in byte 2, features in byte 3.
/// Words 1..3 carry LBA[23:0], LBA[47:24], and the sector count.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RegH2d {
    /// The command to execute.
    pub command: AtaCommand,
    /// Features register.
    pub features: u8,
    /// Starting logical block address (48 bits used).
    pub lba: u64,
    /// Raw 8-bit sector count; zero means 256.
    pub count: u8,
}

impl RegH2d {
    /// Fixed word length emitted by [`RegH2d::to_words`].
    pub const WORDS: usize = 5;

    /// Creates a command FIS for `count` sectors starting at `lba`.
    pub fn new(command: AtaCommand, lba: u64, count: u8) -> Self {
        Self {
            command,
            features: 0,
            lba,
            count,
        }
    }

    /// Number of sectors this command transfers.
    pub fn sector_count(&self) -> usize {
        if self.count == 0 {
            256
        } else {
            self.count as usize
        }
    }

    /// Encodes the FIS.
    pub fn to_words(&self) -> Vec<u32> {
        let lba_hi_nibble = ((self.lba >> 24) & 0x0F) as u32;
        vec![
            (u32::from(self.features) << 24)
                | (u32::from(self.command.code()) << 16)
                | ((u32::from(DEVICE_LBA) | lba_hi_nibble) << 8)
                | u32::from(FIS_TYPE_REG_H2D),
            (u32::from(DEVICE_LBA) << 24) | (self.lba & 0xFF_FFFF) as u32,
            ((self.lba >> 24) & 0xFF_FFFF) as u32,
            u32::from(self.count),
            0,
        ]
    }

    fn parse(words: &[u32]) -> Self {
        let w0 = words[0];
        let word = |i: usize| words.get(i).copied().unwrap_or(0);
        let mut lba = u64::from(word(1) & 0xFF_FFFF) | (u64::from(word(2) & 0xFF_FFFF) << 24);
        if word(2) == 0 {
            // 28-bit form: only the command register's nibble carries LBA[27:24].
            lba |= u64::from((w0 >> 8) & 0x0F) << 24;
        }
        Self {
            command: AtaCommand::from_code((w0 >> 16) as u8),
            features: (w0 >> 24) as u8,
            lba,
            count: word(3) as u8,
        }
    }
}

/// A device-to-host register FIS, used to report command completion.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RegD2h {
    /// Status register.
    pub status: u8,
    /// Error register.
    pub error: u8,
    /// Byte 1 of word 0 (interrupt / port multiplier bits).
    pub flags: u8,
    /// Device register.
    pub device: u8,
    /// Logical block address echoed back to the host (48 bits used).
    pub lba: u64,
    /// Sector count.
    pub count: u16,
}

impl RegD2h {
    /// Fixed word length of this FIS.
    pub const WORDS: usize = 4;

    /// A successful completion for the given command position.
    pub fn complete(lba: u64, count: u16) -> Self {
        Self {
            status: STATUS_COMPLETE,
            error: 0,
            flags: 0,
            device: DEVICE_LBA,
            lba,
            count,
        }
    }

    /// An aborted command.
    pub fn aborted(lba: u64, count: u16) -> Self {
        Self {
            status: STATUS_ERROR,
            error: ERROR_ABORT,
            flags: 0,
            device: DEVICE_LBA,
            lba,
            count,
        }
    }

    /// Returns `true` if the status byte has ERR set and the error byte is
    /// non-zero.
    pub fn is_error(&self) -> bool {
        self.status & 0x01 != 0 && self.error != 0
    }

    /// Encodes the FIS.
    pub fn to_words(&self) -> Vec<u32> {
        vec![
            (u32::from(self.error) << 24)
                | (u32::from(self.status) << 16)
                | (u32::from(self.flags) << 8)
                | u32::from(FIS_TYPE_REG_D2H),
            (u32::from(self.device) << 24) | (self.lba & 0xFF_FFFF) as u32,
            ((self.lba >> 24) & 0xFF_FFFF) as u32,
            u32::from(self.count),
        ]
    }

    fn parse(words: &[u32]) -> Self {
        Self {
            status: (words[0] >> 16) as u8,
            error: (words[0] >> 24) as u8,
            flags: (words[0] >> 8) as u8,
            device: (words[1] >> 24) as u8,
            lba: u64::from(words[1] & 0xFF_FFFF) | (u64::from(words[2] & 0xFF_FFFF) << 24),
            count: words[3] as u16,
        }
    }
}

/// A PIO Setup FIS announcing a programmed-I/O data phase.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PioSetup {
    /// `true` when the following data flows device to host.
    pub to_host: bool,
    /// Status register.
    pub status: u8,
    /// Ending status, reported in word 3.
    pub e_status: u8,
    /// Bytes in the data phase.
    pub transfer_bytes: u16,
}

impl PioSetup {
    /// Fixed word length of this FIS.
    pub const WORDS: usize = 5;

    /// A setup for a single-sector transfer in the given direction.
    pub fn sector(to_host: bool) -> Self {
        Self {
            to_host,
            status: 0,
            e_status: PIO_E_STATUS,
            transfer_bytes: SECTOR_SIZE as u16,
        }
    }

    /// Encodes the FIS.
    pub fn to_words(&self) -> Vec<u32> {
        let dir = if self.to_host { PIO_DIR_TO_HOST } else { 0 };
        vec![
            (u32::from(self.status) << 16) | (u32::from(dir) << 8) | u32::from(FIS_TYPE_PIO_SETUP),
            0,
            0,
            u32::from(self.e_status) << 24,
            u32::from(self.transfer_bytes) << 8,
        ]
    }

    fn parse(words: &[u32]) -> Self {
        Self {
            to_host: (words[0] >> 8) as u8 & PIO_DIR_TO_HOST != 0,
            status: (words[0] >> 16) as u8,
            e_status: (words[3] >> 24) as u8,
            transfer_bytes: (words[4] >> 8) as u16,
        }
    }
}

/// A decoded Frame Information Structure.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Fis {
    /// Host-to-device register FIS.
    RegH2d(RegH2d),
    /// Device-to-host register FIS.
    RegD2h(RegD2h),
    /// DMA Activate: the device is ready for the next host Data FIS.
    DmaActivate,
    /// PIO Setup.
    PioSetup(PioSetup),
    /// Data FIS payload (excluding the type word).
    Data(Vec<u32>),
}

impl Fis {
    /// Returns the FIS type byte.
    pub fn type_byte(&self) -> u8 {
        match self {
            Fis::RegH2d(_) => FIS_TYPE_REG_H2D,
            Fis::RegD2h(_) => FIS_TYPE_REG_D2H,
            Fis::DmaActivate => FIS_TYPE_DMA_ACT,
            Fis::PioSetup(_) => FIS_TYPE_PIO_SETUP,
            Fis::Data(_) => FIS_TYPE_DATA,
        }
    }

    /// Encodes the FIS into host-order words.
    pub fn to_words(&self) -> Vec<u32> {
        match self {
            Fis::RegH2d(f) => f.to_words(),
            Fis::RegD2h(f) => f.to_words(),
            Fis::DmaActivate => vec![u32::from(FIS_TYPE_DMA_ACT)],
            Fis::PioSetup(f) => f.to_words(),
            Fis::Data(payload) => {
                let mut words = Vec::with_capacity(payload.len() + 1);
                words.push(u32::from(FIS_TYPE_DATA));
                words.extend_from_slice(payload);
                words
            }
        }
    }

    /// Decodes host-order words into a FIS.
    ///
    /// A Register H2D FIS only requires word 0; missing LBA and count words
    /// read as zero.
    pub fn parse(words: &[u32]) -> Result<Self, FisError> {
        let first = *words.first().ok_or(FisError::Empty)?;
        let fis_type = first as u8;
        let need = |expected: usize| {
            if words.len() < expected {
                Err(FisError::Truncated {
                    fis_type,
                    expected,
                    got: words.len(),
                })
            } else {
                Ok(())
            }
        };
        match fis_type {
            FIS_TYPE_REG_H2D => Ok(Fis::RegH2d(RegH2d::parse(words))),
            FIS_TYPE_REG_D2H => {
                need(RegD2h::WORDS)?;
                Ok(Fis::RegD2h(RegD2h::parse(words)))
            }
            FIS_TYPE_DMA_ACT => Ok(Fis::DmaActivate),
            FIS_TYPE_PIO_SETUP => {
                need(PioSetup::WORDS)?;
                Ok(Fis::PioSetup(PioSetup::parse(words)))
            }
            FIS_TYPE_DATA => Ok(Fis::Data(words[1..].to_vec())),
            other => Err(FisError::UnknownType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dma_write_command_word_matches_driver_layout() {
        let fis = RegH2d::new(AtaCommand::DmaWrite, 0x0A12_3456, 1);
        let words = fis.to_words();
        // Driver: SATA_DMA_WRITE | ((sector >> 16) & 0x0f00)
        assert_eq!(words[0], 0x00CA_4027 | 0x0A00);
        assert_eq!(words[1] & 0xFF_FFFF, 0x12_3456);
        assert_eq!(words[3], 1);
    }

    #[test]
    fn reg_h2d_parse_recovers_fields() {
        let fis = RegH2d::new(AtaCommand::DmaRead, 0x0123_4567_89AB, 8);
        match Fis::parse(&fis.to_words()).unwrap() {
            Fis::RegH2d(back) => assert_eq!(back, fis),
            other => panic!("expected RegH2d, got {other:?}"),
        }
    }

    #[test]
    fn reg_h2d_short_form_uses_command_nibble() {
        // Only the command register word: LBA[27:24] comes from byte 1.
        match Fis::parse(&[0x00C8_4527]).unwrap() {
            Fis::RegH2d(f) => {
                assert_eq!(f.command, AtaCommand::DmaRead);
                assert_eq!(f.lba, 0x0500_0000);
                assert_eq!(f.sector_count(), 256);
            }
            other => panic!("expected RegH2d, got {other:?}"),
        }
    }

    #[test]
    fn d2h_complete_matches_response_template() {
        let words = RegD2h::complete(0, 0).to_words();
        assert_eq!(words[0], 0x0077_0034);
        assert_eq!(words.len(), RegD2h::WORDS);
    }

    #[test]
    fn d2h_aborted_reports_error() {
        let d2h = RegD2h::aborted(7, 1);
        assert!(d2h.is_error());
        assert!(!RegD2h::complete(7, 1).is_error());
        assert_eq!(d2h.to_words()[0], 0x0451_0034);
    }

    #[test]
    fn dma_activate_is_single_word() {
        assert_eq!(Fis::DmaActivate.to_words(), vec![0x0000_0039]);
    }

    #[test]
    fn pio_setup_matches_response_template() {
        let words = PioSetup::sector(false).to_words();
        assert_eq!(
            words,
            vec![0x0000_005F, 0, 0, 0x0100_0000, 0x0002_0000]
        );
        let back = Fis::parse(&PioSetup::sector(true).to_words()).unwrap();
        assert_eq!(back, Fis::PioSetup(PioSetup::sector(true)));
    }

    #[test]
    fn data_fis_carries_payload() {
        let fis = Fis::Data(vec![1, 2, 3]);
        let words = fis.to_words();
        assert_eq!(words, vec![0x46, 1, 2, 3]);
        assert_eq!(Fis::parse(&words).unwrap(), fis);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Fis::parse(&[]), Err(FisError::Empty));
        assert_eq!(Fis::parse(&[0x12]), Err(FisError::UnknownType(0x12)));
        assert!(matches!(
            Fis::parse(&[0x34, 0]),
            Err(FisError::Truncated { expected: 4, got: 2, .. })
        ));
    }

    #[test]
    fn command_codes_roundtrip() {
        for code in [0xC8, 0xCA, 0xE4, 0xE8, 0xEC] {
            assert_eq!(AtaCommand::from_code(code).code(), code);
        }
        assert_eq!(AtaCommand::from_code(0xEC), AtaCommand::Other(0xEC));
    }
}
