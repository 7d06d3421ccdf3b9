//! Command handling for received frames.
//!
//! The first word of each good frame selects what the device does next: a
//! register FIS starts a DMA or PIO command, a Data FIS feeds the command in
//! progress. Replies are returned as FISes for the link to queue.

use satasim_common::fis::{MAX_DATA_FIS_WORDS, SECTOR_WORDS};
use satasim_common::{AtaCommand, Fis, PioSetup, RegD2h, RegH2d};
use tracing::{debug, warn};

use crate::disk::DiskImage;

/// The data phase the device is expecting from the host, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transfer {
    None,
    /// WRITE DMA in progress.
    DmaWrite {
        command: RegH2d,
        /// Words stored so far.
        done: usize,
        /// Words the command transfers in total.
        total: usize,
    },
    /// WRITE BUFFER awaiting its Data FIS.
    PioWrite { command: RegH2d },
}

/// Device command state and the PIO sector buffer.
#[derive(Clone, Debug)]
pub struct Responder {
    transfer: Transfer,
    pio_buffer: Vec<u32>,
}

impl Responder {
    /// Creates a responder with no command in progress.
    pub fn new() -> Self {
        Self {
            transfer: Transfer::None,
            pio_buffer: vec![0; SECTOR_WORDS],
        }
    }

    /// Abandons any command in progress. The PIO buffer survives.
    pub fn reset(&mut self) {
        self.transfer = Transfer::None;
    }

    /// `true` while a DMA write or PIO write is waiting for host data.
    pub fn is_busy(&self) -> bool {
        self.transfer != Transfer::None
    }

    /// Contents of the one-sector PIO buffer.
    pub fn pio_buffer(&self) -> &[u32] {
        &self.pio_buffer
    }

    /// Handles one received frame and returns the replies to send, in order.
    pub fn handle(&mut self, frame: &[u32], disk: &mut DiskImage) -> Vec<Fis> {
        match Fis::parse(frame) {
            Ok(Fis::RegH2d(command)) => self.handle_command(command, disk),
            Ok(Fis::Data(payload)) => self.handle_data(&payload, disk),
            Ok(other) => {
                debug!(fis_type = other.type_byte(), "ignoring device-to-host FIS from host");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "undecodable frame");
                Vec::new()
            }
        }
    }

    fn handle_command(&mut self, command: RegH2d, disk: &mut DiskImage) -> Vec<Fis> {
        let count = command.sector_count();
        debug!(command = ?command.command, lba = command.lba, count, "command received");
        match command.command {
            AtaCommand::DmaWrite => {
                if let Err(e) = disk.check_range(command.lba, count) {
                    warn!(error = %e, "WRITE DMA rejected");
                    return vec![Self::aborted(&command)];
                }
                self.transfer = Transfer::DmaWrite {
                    command,
                    done: 0,
                    total: count * SECTOR_WORDS,
                };
                vec![Fis::DmaActivate]
            }
            AtaCommand::DmaRead => match disk.read_sectors(command.lba, count) {
                Ok(words) => {
                    let mut replies: Vec<Fis> = words
                        .chunks(MAX_DATA_FIS_WORDS)
                        .map(|chunk| Fis::Data(chunk.to_vec()))
                        .collect();
                    replies.push(Self::complete(&command));
                    replies
                }
                Err(e) => {
                    warn!(error = %e, "READ DMA rejected");
                    vec![Self::aborted(&command)]
                }
            },
            AtaCommand::PioWriteBuffer => {
                self.transfer = Transfer::PioWrite { command };
                vec![Fis::PioSetup(PioSetup::sector(false))]
            }
            AtaCommand::PioReadBuffer => vec![
                Fis::PioSetup(PioSetup::sector(true)),
                Fis::Data(self.pio_buffer.clone()),
            ],
            AtaCommand::Other(code) => {
                warn!(code, "unsupported command");
                vec![Self::aborted(&command)]
            }
        }
    }

    fn handle_data(&mut self, payload: &[u32], disk: &mut DiskImage) -> Vec<Fis> {
        match self.transfer {
            Transfer::DmaWrite {
                command,
                done,
                total,
            } => {
                let take = payload.len().min(total - done);
                if let Err(e) = disk.write_words(command.lba, done, &payload[..take]) {
                    warn!(error = %e, "WRITE DMA data dropped");
                    self.transfer = Transfer::None;
                    return vec![Self::aborted(&command)];
                }
                let done = done + take;
                if done < total {
                    self.transfer = Transfer::DmaWrite {
                        command,
                        done,
                        total,
                    };
                    vec![Fis::DmaActivate]
                } else {
                    self.transfer = Transfer::None;
                    vec![Self::complete(&command)]
                }
            }
            Transfer::PioWrite { command } => {
                let n = payload.len().min(SECTOR_WORDS);
                self.pio_buffer[..n].copy_from_slice(&payload[..n]);
                self.transfer = Transfer::None;
                vec![Self::complete(&command)]
            }
            Transfer::None => {
                warn!(words = payload.len(), "Data FIS with no command in progress");
                Vec::new()
            }
        }
    }

    fn complete(command: &RegH2d) -> Fis {
        Fis::RegD2h(RegD2h::complete(command.lba, command.sector_count() as u16))
    }

    fn aborted(command: &RegH2d) -> Fis {
        Fis::RegD2h(RegD2h::aborted(command.lba, command.sector_count() as u16))
    }
}

impl Default for Responder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(cmd: AtaCommand, lba: u64, count: u8) -> Vec<u32> {
        RegH2d::new(cmd, lba, count).to_words()
    }

    fn data_frame(payload: &[u32]) -> Vec<u32> {
        Fis::Data(payload.to_vec()).to_words()
    }

    #[test]
    fn dma_write_single_sector() {
        let mut disk = DiskImage::new(8);
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::DmaWrite, 2, 1), &mut disk);
        assert_eq!(replies, vec![Fis::DmaActivate]);
        assert!(r.is_busy());

        let payload: Vec<u32> = (0..SECTOR_WORDS as u32).collect();
        let replies = r.handle(&data_frame(&payload), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(d)] if !d.is_error() && d.lba == 2));
        assert!(!r.is_busy());
        assert_eq!(disk.read_sectors(2, 1).unwrap(), payload);
    }

    #[test]
    fn dma_write_over_several_data_fises() {
        let mut disk = DiskImage::new(64);
        let mut r = Responder::new();
        r.handle(&command(AtaCommand::DmaWrite, 0, 20), &mut disk);
        let first = vec![0xAAAA_AAAA; MAX_DATA_FIS_WORDS];
        assert_eq!(r.handle(&data_frame(&first), &mut disk), vec![Fis::DmaActivate]);
        let second = vec![0xBBBB_BBBB; 4 * SECTOR_WORDS];
        let replies = r.handle(&data_frame(&second), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(_)]));
        assert_eq!(disk.read_sectors(15, 1).unwrap()[0], 0xAAAA_AAAA);
        assert_eq!(disk.read_sectors(16, 1).unwrap()[0], 0xBBBB_BBBB);
        assert_eq!(disk.read_sectors(19, 1).unwrap()[SECTOR_WORDS - 1], 0xBBBB_BBBB);
    }

    #[test]
    fn dma_read_splits_large_transfers() {
        let mut disk = DiskImage::new(32);
        disk.write_words(0, 0, &[0x1111_1111]).unwrap();
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::DmaRead, 0, 20), &mut disk);
        assert_eq!(replies.len(), 3);
        match &replies[0] {
            Fis::Data(words) => {
                assert_eq!(words.len(), MAX_DATA_FIS_WORDS);
                assert_eq!(words[0], 0x1111_1111);
            }
            other => panic!("expected Data, got {other:?}"),
        }
        match &replies[1] {
            Fis::Data(words) => assert_eq!(words.len(), 4 * SECTOR_WORDS),
            other => panic!("expected Data, got {other:?}"),
        }
        assert!(matches!(&replies[2], Fis::RegD2h(d) if d.count == 20));
    }

    #[test]
    fn out_of_range_read_is_aborted() {
        let mut disk = DiskImage::new(4);
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::DmaRead, 4, 1), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(d)] if d.is_error()));
        let replies = r.handle(&command(AtaCommand::DmaWrite, 3, 2), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(d)] if d.is_error()));
        assert!(!r.is_busy());
    }

    #[test]
    fn write_range_check_leaves_the_disk_alone() {
        let mut disk = DiskImage::new(4);
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::DmaWrite, 3, 1), &mut disk);
        assert_eq!(replies, vec![Fis::DmaActivate]);
        assert!(r.is_busy());
        assert!(disk.as_bytes().iter().all(|&b| b == 0));

        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::DmaWrite, 0, 0), &mut disk);
        assert!(
            matches!(replies.as_slice(), [Fis::RegD2h(d)] if d.is_error() && d.count == 256),
            "256-sector write on a 4-sector disk"
        );
    }

    #[test]
    fn pio_buffer_write_then_read() {
        let mut disk = DiskImage::new(1);
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::PioWriteBuffer, 0, 1), &mut disk);
        assert_eq!(replies, vec![Fis::PioSetup(PioSetup::sector(false))]);

        let payload: Vec<u32> = (100..100 + SECTOR_WORDS as u32).collect();
        let replies = r.handle(&data_frame(&payload), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(d)] if !d.is_error()));
        assert_eq!(r.pio_buffer(), payload.as_slice());

        let replies = r.handle(&command(AtaCommand::PioReadBuffer, 0, 1), &mut disk);
        assert_eq!(
            replies,
            vec![Fis::PioSetup(PioSetup::sector(true)), Fis::Data(payload)]
        );
    }

    #[test]
    fn unknown_command_is_aborted() {
        let mut disk = DiskImage::new(1);
        let mut r = Responder::new();
        let replies = r.handle(&command(AtaCommand::Other(0xEC), 0, 1), &mut disk);
        assert!(matches!(replies.as_slice(), [Fis::RegD2h(d)] if d.is_error()));
    }

    #[test]
    fn stray_data_and_garbage_are_ignored() {
        let mut disk = DiskImage::new(1);
        let mut r = Responder::new();
        assert!(r.handle(&data_frame(&[1, 2]), &mut disk).is_empty());
        assert!(r.handle(&[0x0000_0012], &mut disk).is_empty());
        assert!(r.handle(&[0x0000_0039], &mut disk).is_empty());
    }
}
