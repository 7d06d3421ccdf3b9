//! PHY-facing device model.
//!
//! [`SataDevice`] is what the harness talks to. On each TX-domain edge it
//! takes the controller's transmit-side signals; on each RX-domain edge it
//! returns the receive-side signals the controller should see. Until the OOB
//! handshake completes the device holds electrical idle and the link state
//! machine does not run.

use satasim_common::PhyWord;
use tracing::debug;

use crate::disk::DiskImage;
use crate::link::{Link, LinkConfig};
use crate::oob::OobEngine;
use crate::responder::Responder;
use crate::state::LinkState;

/// Controller transmit-side outputs observed on one TX edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxSignals {
    /// Global reset.
    pub reset: bool,
    /// Controller requests a COMRESET/COMINIT burst.
    pub cominit: bool,
    /// Controller requests a COMWAKE burst.
    pub comwake: bool,
    /// Controller's transmitter is in electrical idle.
    pub elecidle: bool,
    /// Word on the transmit lanes.
    pub word: PhyWord,
}

/// Device replies to the controller in the TX domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxStatus {
    /// One-step pulse acknowledging a controller OOB burst.
    pub comfinish: bool,
    /// The OOB handshake is complete.
    pub ready: bool,
}

/// Receive-side inputs for the controller on one RX edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxSignals {
    /// Device COMINIT.
    pub cominit: bool,
    /// Device COMWAKE.
    pub comwake: bool,
    /// Device transmitter in electrical idle.
    pub elecidle: bool,
    /// `word` carries a valid word.
    pub valid: bool,
    /// Word on the receive lanes.
    pub word: PhyWord,
    /// Link is up.
    pub phy_ready: bool,
}

impl RxSignals {
    /// The receive lanes as a 33-bit value with the primitive flag at bit 32.
    pub fn packed(&self) -> u64 {
        self.word.packed()
    }
}

/// Simulated SATA drive.
#[derive(Debug)]
pub struct SataDevice {
    oob: OobEngine,
    link: Link,
    responder: Responder,
    disk: DiskImage,
    /// Word produced by the last link step, driven on the next RX edge.
    output: Option<PhyWord>,
    /// Words of the most recently received good frame.
    last_received: Vec<u32>,
}

impl SataDevice {
    /// Creates a device backed by `disk`.
    pub fn new(config: LinkConfig, disk: DiskImage) -> Self {
        Self {
            oob: OobEngine::new(config.comreset_idle_steps),
            link: Link::new(config),
            responder: Responder::new(),
            disk,
            output: None,
            last_received: Vec::new(),
        }
    }

    /// Returns every model to its initial state. The disk contents are kept.
    pub fn reset(&mut self) {
        self.oob.reset();
        self.link.reset();
        self.responder.reset();
        self.output = None;
        self.last_received.clear();
    }

    /// Advances one TX-domain edge.
    pub fn step_tx(&mut self, tx: &TxSignals) -> TxStatus {
        if tx.reset {
            self.reset();
            return TxStatus::default();
        }
        let comfinish = self.oob.step_tx(tx.cominit, tx.comwake, tx.elecidle);
        if self.oob.is_done() {
            self.output = Some(self.link.step(tx.word));
            self.dispatch_received();
        }
        TxStatus {
            comfinish,
            ready: self.oob.is_done(),
        }
    }

    /// Advances one RX-domain edge.
    pub fn step_rx(&mut self) -> RxSignals {
        let oob = self.oob.step_rx();
        let ready = self.oob.is_done();
        RxSignals {
            cominit: oob.cominit,
            comwake: oob.comwake,
            elecidle: !ready,
            valid: ready && self.output.is_some(),
            word: self.output.unwrap_or_default(),
            phy_ready: ready,
        }
    }

    fn dispatch_received(&mut self) {
        while let Some(frame) = self.link.take_received() {
            let replies = self.responder.handle(&frame, &mut self.disk);
            for fis in replies {
                debug!(fis_type = fis.type_byte(), "queueing reply");
                self.link.queue_frame(fis.to_words());
            }
            self.last_received = frame;
        }
    }

    /// `true` once the OOB handshake has completed.
    pub fn is_link_ready(&self) -> bool {
        self.oob.is_done()
    }

    /// `true` while replies are queued or a write is waiting for data.
    pub fn is_busy(&self) -> bool {
        self.link.pending_frames() > 0 || self.responder.is_busy()
    }

    /// Current link-layer state.
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// The OOB engine.
    pub fn oob(&self) -> &OobEngine {
        &self.oob
    }

    /// Words of the most recently received good frame, host order.
    pub fn received(&self) -> &[u32] {
        &self.last_received
    }

    /// The backing disk.
    pub fn disk(&self) -> &DiskImage {
        &self.disk
    }

    /// The backing disk, mutably.
    pub fn disk_mut(&mut self) -> &mut DiskImage {
        &mut self.disk
    }

    /// The responder's PIO sector buffer.
    pub fn pio_buffer(&self) -> &[u32] {
        self.responder.pio_buffer()
    }
}
