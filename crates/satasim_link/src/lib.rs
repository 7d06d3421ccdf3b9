//! Device-side SATA link-layer simulation model.
//!
//! This crate stands in for a physical drive so that a SATA host controller
//! can be exercised without silicon. It reproduces the out-of-band handshake,
//! the link scrambler and CRC, and the primitive-driven frame exchange, and
//! answers DMA and PIO commands from an in-memory disk image.
//!
//! # Architecture
//!
//! [`SataDevice`] owns an [`OobEngine`] that gates when traffic may begin and
//! a [`Link`] state machine that exchanges frames with the host. Good frames
//! are handed to a [`Responder`], whose reply FISes are queued back onto the
//! link. Every model advances exactly one simulated clock edge per call; the
//! caller owns scheduling and timeouts.
//!
//! # Usage
//!
//! ```ignore
//! use satasim_link::{DiskImage, LinkConfig, SataDevice, TxSignals};
//!
//! let mut dev = SataDevice::new(LinkConfig::default(), DiskImage::new(64));
//! loop {
//!     let status = dev.step_tx(&tx_signals_from_controller());
//!     let rx = dev.step_rx();
//!     drive_controller_inputs(status, rx);
//! }
//! ```
//!
//! # Modules
//!
//! - `scrambler` — 16-bit LFSR data scrambler
//! - `crc` — 32-bit frame CRC
//! - `codec` — joint scrambler/CRC state with wire byte ordering
//! - `oob` — COMRESET/COMINIT/COMWAKE sequencing
//! - `state` — link states and the pure transition function
//! - `link` — per-step link datapath
//! - `responder` — command handling and FIS replies
//! - `disk` — flat sector store backing DMA transfers
//! - `device` — PHY-facing device model tying it all together

#![warn(missing_docs)]

pub mod codec;
pub mod crc;
pub mod device;
pub mod disk;
pub mod error;
pub mod link;
pub mod oob;
pub mod responder;
pub mod scrambler;
pub mod state;

pub use codec::FrameCodec;
pub use crc::{advance_crc, Crc32, CRC_INITIAL, CRC_POLYNOMIAL};
pub use device::{RxSignals, SataDevice, TxSignals, TxStatus};
pub use disk::DiskImage;
pub use error::LinkError;
pub use link::{Link, LinkConfig};
pub use oob::{ComPhase, OobEngine, OobSignals};
pub use responder::Responder;
pub use scrambler::{scramble_function, Scrambler, SCRAMBLER_INITIAL, SCRAMBLER_POLYNOMIAL};
pub use state::{next_state, LinkState, TransitionInput};
