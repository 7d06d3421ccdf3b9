//! Flat sector store backing the simulated drive.
//!
//! The image is held in memory as raw bytes in 512-byte sectors. Words handed
//! to and from the link are assembled little-endian (byte 0 is bits 7:0),
//! matching the host's internal representation.

use std::fs;
use std::path::Path;

use satasim_common::fis::{SECTOR_SIZE, SECTOR_WORDS};
use tracing::{info, warn};

use crate::error::LinkError;

/// In-memory disk image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskImage {
    bytes: Vec<u8>,
}

impl DiskImage {
    /// Creates a zero-filled disk of `sectors` sectors.
    pub fn new(sectors: usize) -> Self {
        Self {
            bytes: vec![0; sectors * SECTOR_SIZE],
        }
    }

    /// Wraps raw bytes, zero-padding to a whole number of sectors.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let rem = bytes.len() % SECTOR_SIZE;
        if rem != 0 {
            bytes.resize(bytes.len() + SECTOR_SIZE - rem, 0);
        }
        Self { bytes }
    }

    /// Opens an image file, sizing the disk to the file.
    pub fn open(path: &Path) -> Result<Self, LinkError> {
        let bytes = fs::read(path)?;
        let disk = Self::from_bytes(bytes);
        info!(
            path = %path.display(),
            sectors = disk.sectors(),
            "loaded disk image"
        );
        Ok(disk)
    }

    /// Loads an image file into this disk without changing its size.
    ///
    /// A missing file leaves the disk zero-filled and returns the I/O error.
    /// A short file fills what it can, zero-fills the rest, and returns
    /// [`LinkError::ShortImage`]. Bytes beyond the disk's size are ignored.
    pub fn load(&mut self, path: &Path) -> Result<(), LinkError> {
        self.bytes.fill(0);
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "disk image unavailable; using zeros");
                return Err(e.into());
            }
        };
        let n = data.len().min(self.bytes.len());
        self.bytes[..n].copy_from_slice(&data[..n]);
        if n < self.bytes.len() {
            warn!(
                path = %path.display(),
                read = n,
                expected = self.bytes.len(),
                "short disk image; tail zero-filled"
            );
            return Err(LinkError::ShortImage {
                read: n,
                expected: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// Writes the whole image to `path`.
    pub fn save(&self, path: &Path) -> Result<(), LinkError> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Number of sectors on the disk.
    pub fn sectors(&self) -> usize {
        self.bytes.len() / SECTOR_SIZE
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Checks that `count` sectors starting at `lba` lie on the disk and
    /// returns the starting sector index.
    pub fn check_range(&self, lba: u64, count: usize) -> Result<usize, LinkError> {
        let sectors = self.sectors();
        let in_range = usize::try_from(lba)
            .ok()
            .and_then(|start| start.checked_add(count).map(|end| (start, end)))
            .filter(|&(_, end)| end <= sectors);
        match in_range {
            Some((start, _)) => Ok(start),
            None => Err(LinkError::LbaOutOfRange {
                lba,
                count,
                sectors,
            }),
        }
    }

    /// Reads `count` sectors starting at `lba` as host-order words.
    pub fn read_sectors(&self, lba: u64, count: usize) -> Result<Vec<u32>, LinkError> {
        let start = self.check_range(lba, count)? * SECTOR_SIZE;
        let end = start + count * SECTOR_SIZE;
        Ok(self.bytes[start..end]
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Writes host-order words starting `word_offset` words into sector `lba`.
    pub fn write_words(&mut self, lba: u64, word_offset: usize, words: &[u32]) -> Result<(), LinkError> {
        let first = word_offset / SECTOR_WORDS;
        let last = (word_offset + words.len()).div_ceil(SECTOR_WORDS);
        let base = self.check_range(lba, last.max(first + 1))? * SECTOR_SIZE;
        let start = base + word_offset * 4;
        for (chunk, w) in self.bytes[start..start + words.len() * 4]
            .chunks_exact_mut(4)
            .zip(words)
        {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_disk_is_zeroed() {
        let disk = DiskImage::new(4);
        assert_eq!(disk.sectors(), 4);
        assert!(disk.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_bytes_pads_to_sector() {
        let disk = DiskImage::from_bytes(vec![1; 600]);
        assert_eq!(disk.sectors(), 2);
        assert_eq!(disk.as_bytes()[599], 1);
        assert_eq!(disk.as_bytes()[600], 0);
    }

    #[test]
    fn words_are_little_endian() {
        let mut bytes = vec![0u8; SECTOR_SIZE];
        bytes[..4].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        let disk = DiskImage::from_bytes(bytes);
        let words = disk.read_sectors(0, 1).unwrap();
        assert_eq!(words.len(), SECTOR_WORDS);
        assert_eq!(words[0], 0x4433_2211);
    }

    #[test]
    fn write_then_read_sector() {
        let mut disk = DiskImage::new(8);
        let data: Vec<u32> = (0..SECTOR_WORDS as u32).map(|i| i * 0x0101_0101).collect();
        disk.write_words(3, 0, &data).unwrap();
        assert_eq!(disk.read_sectors(3, 1).unwrap(), data);
        assert!(disk.read_sectors(2, 1).unwrap().iter().all(|&w| w == 0));
    }

    #[test]
    fn write_at_word_offset_spans_sectors() {
        let mut disk = DiskImage::new(4);
        disk.write_words(1, SECTOR_WORDS - 1, &[0xAAAA_AAAA, 0xBBBB_BBBB]).unwrap();
        assert_eq!(disk.read_sectors(1, 1).unwrap()[SECTOR_WORDS - 1], 0xAAAA_AAAA);
        assert_eq!(disk.read_sectors(2, 1).unwrap()[0], 0xBBBB_BBBB);
    }

    #[test]
    fn check_range_accepts_the_last_sector() {
        let disk = DiskImage::new(4);
        assert_eq!(disk.check_range(3, 1).unwrap(), 3);
        assert_eq!(disk.check_range(0, 4).unwrap(), 0);
        assert!(disk.check_range(4, 0).is_ok());
        assert!(matches!(
            disk.check_range(2, 3),
            Err(LinkError::LbaOutOfRange { lba: 2, count: 3, sectors: 4 })
        ));
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut disk = DiskImage::new(4);
        assert!(matches!(
            disk.read_sectors(3, 2),
            Err(LinkError::LbaOutOfRange { lba: 3, count: 2, sectors: 4 })
        ));
        assert!(disk.read_sectors(u64::MAX, 1).is_err());
        assert!(disk.write_words(4, 0, &[1]).is_err());
    }

    #[test]
    fn save_and_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut disk = DiskImage::new(2);
        disk.write_words(1, 5, &[0xCAFE_F00D]).unwrap();
        disk.save(&path).unwrap();
        assert_eq!(DiskImage::open(&path).unwrap(), disk);
    }

    #[test]
    fn load_short_image_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.img");
        fs::write(&path, [0xFFu8; 100]).unwrap();
        let mut disk = DiskImage::new(1);
        let err = disk.load(&path).unwrap_err();
        assert!(matches!(err, LinkError::ShortImage { read: 100, expected: 512 }));
        assert_eq!(disk.as_bytes()[99], 0xFF);
        assert_eq!(disk.as_bytes()[100], 0);
    }

    #[test]
    fn load_missing_image_reports_io_error() {
        let mut disk = DiskImage::from_bytes(vec![7; SECTOR_SIZE]);
        let err = disk.load(Path::new("/nonexistent/disk.img")).unwrap_err();
        assert!(matches!(err, LinkError::Io(_)));
        assert!(disk.as_bytes().iter().all(|&b| b == 0));
    }
}
