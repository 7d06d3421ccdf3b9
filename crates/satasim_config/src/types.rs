//! Configuration types deserialized from `satasim.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use satasim_link::LinkConfig;
use satasim_mem::BusConfig;

/// The top-level simulator configuration. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Link layer timing.
    #[serde(default)]
    pub link: LinkSection,
    /// Bus memory model.
    #[serde(default)]
    pub memory: MemorySection,
    /// Backing disk image.
    #[serde(default)]
    pub disk: DiskSection,
}

/// `[link]` settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSection {
    /// ALIGN primitives sent after OOB completes.
    pub align_count: u32,
    /// Steps of host electrical idle that end COMRESET.
    pub comreset_idle_steps: u32,
}

impl Default for LinkSection {
    fn default() -> Self {
        let link = LinkConfig::default();
        Self {
            align_count: link.align_count,
            comreset_idle_steps: link.comreset_idle_steps,
        }
    }
}

/// `[memory]` settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySection {
    /// Storage size in words.
    pub words: usize,
    /// Acknowledgment delay in steps.
    pub delay: u32,
    /// Stall probability denominator; zero disables stalls.
    pub stall_one_in: u32,
    /// Optional stall generator seed.
    pub seed: Option<u64>,
    /// Words per bus beat.
    pub words_per_beat: u32,
    /// Optional initial memory image.
    pub image: Option<PathBuf>,
}

impl Default for MemorySection {
    fn default() -> Self {
        let bus = BusConfig::default();
        Self {
            words: bus.words,
            delay: bus.delay,
            stall_one_in: bus.stall_one_in,
            seed: bus.seed,
            words_per_beat: bus.words_per_beat,
            image: None,
        }
    }
}

/// `[disk]` settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiskSection {
    /// Disk size in 512-byte sectors.
    pub sectors: usize,
    /// Optional disk image file.
    pub image: Option<PathBuf>,
}

impl Default for DiskSection {
    fn default() -> Self {
        Self {
            sectors: 2048,
            image: None,
        }
    }
}

impl SimConfig {
    /// Link settings for [`satasim_link::SataDevice::new`].
    pub fn to_link_config(&self) -> LinkConfig {
        LinkConfig {
            align_count: self.link.align_count,
            comreset_idle_steps: self.link.comreset_idle_steps,
            ..LinkConfig::default()
        }
    }

    /// Bus settings for [`satasim_mem::BusMemory::new`].
    pub fn to_bus_config(&self) -> BusConfig {
        BusConfig {
            words: self.memory.words,
            delay: self.memory.delay,
            stall_one_in: self.memory.stall_one_in,
            seed: self.memory.seed,
            words_per_beat: self.memory.words_per_beat,
        }
    }

    /// Resolves image paths relative to `base`, leaving absolute paths alone.
    pub fn resolve_paths(&mut self, base: &Path) {
        for image in [&mut self.memory.image, &mut self.disk.image]
            .into_iter()
            .flatten()
        {
            if image.is_relative() {
                *image = base.join(&*image);
            }
        }
    }
}
