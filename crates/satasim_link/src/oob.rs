//! Out-of-band handshake sequencing.
//!
//! The host opens with COMRESET while its transmitter sits in electrical
//! idle. The device acknowledges each host burst with a one-step `comfinish`
//! pulse in the TX domain and then, on the RX side, drives COMINIT (after
//! COMRESET) and COMWAKE (after the host's COMWAKE) for exactly one step
//! each. Once both have been driven and cleared the link leaves electrical
//! idle.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Progress of one device-driven OOB signal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ComPhase {
    /// The host burst that triggers this signal has not been seen.
    #[default]
    Waiting,
    /// Host burst detected; the signal goes high on the next RX step.
    Detected,
    /// The signal is high this RX step.
    Asserted,
    /// The signal has been driven and cleared.
    Sent,
}

impl ComPhase {
    /// Phase on the next RX step.
    fn advance(self) -> Self {
        match self {
            ComPhase::Detected => ComPhase::Asserted,
            ComPhase::Asserted => ComPhase::Sent,
            other => other,
        }
    }
}

/// OOB signals driven toward the host on one RX step.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct OobSignals {
    /// COMINIT level.
    pub cominit: bool,
    /// COMWAKE level.
    pub comwake: bool,
}

/// Device-side OOB handshake state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OobEngine {
    /// Consecutive host idle steps required before COMRESET is recognised.
    comreset_idle_steps: u32,
    /// Consecutive TX steps the host has held electrical idle.
    idle_steps: u32,
    cominit: ComPhase,
    comwake: ComPhase,
}

impl OobEngine {
    /// Creates an engine that recognises COMRESET after `comreset_idle_steps`
    /// consecutive idle steps.
    pub fn new(comreset_idle_steps: u32) -> Self {
        Self {
            comreset_idle_steps,
            idle_steps: 0,
            cominit: ComPhase::Waiting,
            comwake: ComPhase::Waiting,
        }
    }

    /// Returns to the pre-handshake state.
    pub fn reset(&mut self) {
        self.idle_steps = 0;
        self.cominit = ComPhase::Waiting;
        self.comwake = ComPhase::Waiting;
    }

    /// Observes the host's TX-domain OOB requests. Returns the `comfinish`
    /// pulse acknowledging a newly detected burst.
    pub fn step_tx(&mut self, host_cominit: bool, host_comwake: bool, host_elecidle: bool) -> bool {
        if host_elecidle {
            self.idle_steps = self.idle_steps.saturating_add(1);
        } else {
            self.idle_steps = 0;
        }

        if self.cominit == ComPhase::Waiting
            && host_cominit
            && self.idle_steps >= self.comreset_idle_steps
        {
            debug!(idle_steps = self.idle_steps, "COMRESET detected");
            self.cominit = ComPhase::Detected;
            return true;
        }
        if self.cominit == ComPhase::Sent && self.comwake == ComPhase::Waiting && host_comwake {
            debug!("host COMWAKE detected");
            self.comwake = ComPhase::Detected;
            return true;
        }
        false
    }

    /// Drives the device's RX-domain OOB signals for this step.
    pub fn step_rx(&mut self) -> OobSignals {
        let comwake_before = self.comwake;
        self.cominit = self.cominit.advance();
        self.comwake = self.comwake.advance();
        if comwake_before == ComPhase::Asserted && self.is_done() {
            info!("OOB handshake complete; leaving electrical idle");
        }
        OobSignals {
            cominit: self.cominit == ComPhase::Asserted,
            comwake: self.comwake == ComPhase::Asserted,
        }
    }

    /// `true` once COMINIT and COMWAKE have both been driven and cleared.
    pub fn is_done(&self) -> bool {
        self.cominit == ComPhase::Sent && self.comwake == ComPhase::Sent
    }

    /// Progress of COMINIT.
    pub fn cominit_phase(&self) -> ComPhase {
        self.cominit
    }

    /// Progress of COMWAKE.
    pub fn comwake_phase(&self) -> ComPhase {
        self.comwake
    }
}

impl Default for OobEngine {
    fn default() -> Self {
        Self::new(1)
    }
}
