//! Link-layer states and the pure transition function.
//!
//! [`next_state`] maps the current state and the step's observed inputs to the
//! next state with no side effects, so each transition can be tested without
//! a datapath. The datapath lives in [`Link`](crate::link::Link).

use std::fmt;

use satasim_common::Primitive;
use serde::{Deserialize, Serialize};

/// Device link-layer protocol state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum LinkState {
    /// Emitting the ALIGN burst that opens the link; `sent` counts steps so far.
    SendAlign {
        /// ALIGN primitives already emitted.
        sent: u32,
    },
    /// Idle, emitting SYNC.
    Idle,
    /// Announcing a frame with XRDY, waiting for the host's RRDY.
    SendChkRdy,
    /// Sending SOF, the frame's data words, then its CRC.
    SendData,
    /// Sending EOF.
    SendEof,
    /// Waiting for the host's frame status.
    Wait,
    /// Host announced a frame; answering RRDY until SOF.
    RcvChkRdy,
    /// Receiving frame data.
    RcvData,
    /// Host sent EOF; checking the CRC.
    RcvEof,
    /// Frame accepted; emitting OK until the host returns to SYNC.
    GoodEnd,
    /// Frame rejected; emitting ERR until the host returns to SYNC.
    BadEnd,
}

impl LinkState {
    /// State after link reset.
    pub const INITIAL: LinkState = LinkState::SendAlign { sent: 0 };

    /// The primitive emitted while in this state, or `None` in
    /// [`LinkState::SendData`], whose output varies per step.
    pub fn emitted(self) -> Option<Primitive> {
        match self {
            LinkState::SendAlign { .. } => Some(Primitive::Align),
            LinkState::Idle => Some(Primitive::Sync),
            LinkState::SendChkRdy => Some(Primitive::XRdy),
            LinkState::SendData => None,
            LinkState::SendEof => Some(Primitive::Eof),
            LinkState::Wait => Some(Primitive::Wtrm),
            LinkState::RcvChkRdy => Some(Primitive::RRdy),
            LinkState::RcvData | LinkState::RcvEof => Some(Primitive::RIp),
            LinkState::GoodEnd => Some(Primitive::Ok),
            LinkState::BadEnd => Some(Primitive::Err),
        }
    }

    /// Conventional name of the state.
    pub fn name(self) -> &'static str {
        match self {
            LinkState::SendAlign { .. } => "SEND_ALIGN",
            LinkState::Idle => "IDLE",
            LinkState::SendChkRdy => "SEND_CHKRDY",
            LinkState::SendData => "SEND_DATA",
            LinkState::SendEof => "SEND_EOF",
            LinkState::Wait => "WAIT",
            LinkState::RcvChkRdy => "RCV_CHKRDY",
            LinkState::RcvData => "RCV_DATA",
            LinkState::RcvEof => "RCVEOF",
            LinkState::GoodEnd => "GOODEND",
            LinkState::BadEnd => "BADEND",
        }
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything [`next_state`] needs to know about one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionInput {
    /// The host's word this step, if it was a recognised primitive.
    pub host: Option<Primitive>,
    /// Length of the opening ALIGN burst.
    pub align_count: u32,
    /// A reply frame is queued for transmission.
    pub frame_pending: bool,
    /// The CRC trailer of the outgoing frame was emitted this step.
    pub frame_sent: bool,
    /// The received frame's CRC matched (only read in `RcvEof`).
    pub crc_ok: bool,
}

/// Computes the state for the next step.
pub fn next_state(state: LinkState, input: &TransitionInput) -> LinkState {
    let host = input.host;
    match state {
        LinkState::SendAlign { sent } => {
            let sent = sent + 1;
            if sent >= input.align_count {
                LinkState::Idle
            } else {
                LinkState::SendAlign { sent }
            }
        }
        LinkState::Idle => {
            if host == Some(Primitive::XRdy) {
                LinkState::RcvChkRdy
            } else if input.frame_pending {
                LinkState::SendChkRdy
            } else {
                LinkState::Idle
            }
        }
        LinkState::SendChkRdy => match host {
            Some(Primitive::RRdy) => LinkState::SendData,
            Some(Primitive::XRdy) => LinkState::RcvChkRdy,
            _ => LinkState::SendChkRdy,
        },
        LinkState::SendData => {
            if input.frame_sent {
                LinkState::SendEof
            } else {
                LinkState::SendData
            }
        }
        LinkState::SendEof => LinkState::Wait,
        LinkState::Wait => match host {
            Some(Primitive::Sync | Primitive::Ok | Primitive::Err) => LinkState::Idle,
            _ => LinkState::Wait,
        },
        LinkState::RcvChkRdy => {
            if host == Some(Primitive::Sof) {
                LinkState::RcvData
            } else {
                LinkState::RcvChkRdy
            }
        }
        LinkState::RcvData => match host {
            Some(Primitive::Eof) => LinkState::RcvEof,
            Some(Primitive::Wtrm) => LinkState::BadEnd,
            _ => LinkState::RcvData,
        },
        LinkState::RcvEof => {
            if input.crc_ok {
                LinkState::GoodEnd
            } else {
                LinkState::BadEnd
            }
        }
        LinkState::GoodEnd | LinkState::BadEnd => {
            if host == Some(Primitive::Sync) {
                LinkState::Idle
            } else {
                state
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(host: Option<Primitive>) -> TransitionInput {
        TransitionInput {
            host,
            align_count: 100,
            ..TransitionInput::default()
        }
    }

    #[test]
    fn align_burst_lasts_align_count_steps() {
        let mut state = LinkState::INITIAL;
        for step in 0..99 {
            state = next_state(state, &input(None));
            assert!(
                matches!(state, LinkState::SendAlign { .. }),
                "left SEND_ALIGN early at step {step}"
            );
        }
        assert_eq!(next_state(state, &input(None)), LinkState::Idle);
    }

    #[test]
    fn idle_stays_idle_without_work() {
        assert_eq!(next_state(LinkState::Idle, &input(None)), LinkState::Idle);
        assert_eq!(
            next_state(LinkState::Idle, &input(Some(Primitive::Sync))),
            LinkState::Idle
        );
    }

    #[test]
    fn idle_prefers_host_xrdy_over_pending_frame() {
        let mut i = input(Some(Primitive::XRdy));
        i.frame_pending = true;
        assert_eq!(next_state(LinkState::Idle, &i), LinkState::RcvChkRdy);
        i.host = Some(Primitive::Sync);
        assert_eq!(next_state(LinkState::Idle, &i), LinkState::SendChkRdy);
    }

    #[test]
    fn send_chkrdy_transitions() {
        assert_eq!(
            next_state(LinkState::SendChkRdy, &input(Some(Primitive::RRdy))),
            LinkState::SendData
        );
        assert_eq!(
            next_state(LinkState::SendChkRdy, &input(Some(Primitive::XRdy))),
            LinkState::RcvChkRdy
        );
        assert_eq!(
            next_state(LinkState::SendChkRdy, &input(Some(Primitive::Sync))),
            LinkState::SendChkRdy
        );
    }

    #[test]
    fn send_data_ends_after_crc() {
        let mut i = input(Some(Primitive::RIp));
        assert_eq!(next_state(LinkState::SendData, &i), LinkState::SendData);
        i.frame_sent = true;
        assert_eq!(next_state(LinkState::SendData, &i), LinkState::SendEof);
        assert_eq!(next_state(LinkState::SendEof, &i), LinkState::Wait);
    }

    #[test]
    fn wait_returns_to_idle_on_status() {
        for p in [Primitive::Sync, Primitive::Ok, Primitive::Err] {
            assert_eq!(next_state(LinkState::Wait, &input(Some(p))), LinkState::Idle);
        }
        assert_eq!(
            next_state(LinkState::Wait, &input(Some(Primitive::RIp))),
            LinkState::Wait
        );
    }

    #[test]
    fn receive_path() {
        assert_eq!(
            next_state(LinkState::RcvChkRdy, &input(Some(Primitive::XRdy))),
            LinkState::RcvChkRdy
        );
        assert_eq!(
            next_state(LinkState::RcvChkRdy, &input(Some(Primitive::Sof))),
            LinkState::RcvData
        );
        assert_eq!(next_state(LinkState::RcvData, &input(None)), LinkState::RcvData);
        assert_eq!(
            next_state(LinkState::RcvData, &input(Some(Primitive::Eof))),
            LinkState::RcvEof
        );
        assert_eq!(
            next_state(LinkState::RcvData, &input(Some(Primitive::Wtrm))),
            LinkState::BadEnd
        );
    }

    #[test]
    fn rcveof_checks_crc() {
        let mut i = input(Some(Primitive::Wtrm));
        assert_eq!(next_state(LinkState::RcvEof, &i), LinkState::BadEnd);
        i.crc_ok = true;
        assert_eq!(next_state(LinkState::RcvEof, &i), LinkState::GoodEnd);
    }

    #[test]
    fn end_states_wait_for_sync() {
        for s in [LinkState::GoodEnd, LinkState::BadEnd] {
            assert_eq!(next_state(s, &input(Some(Primitive::Wtrm))), s);
            assert_eq!(next_state(s, &input(Some(Primitive::Sync))), LinkState::Idle);
        }
    }

    #[test]
    fn emitted_primitives() {
        assert_eq!(LinkState::INITIAL.emitted(), Some(Primitive::Align));
        assert_eq!(LinkState::Idle.emitted(), Some(Primitive::Sync));
        assert_eq!(LinkState::SendData.emitted(), None);
        assert_eq!(LinkState::RcvEof.emitted(), Some(Primitive::RIp));
        assert_eq!(LinkState::BadEnd.emitted(), Some(Primitive::Err));
    }

    #[test]
    fn display_names() {
        assert_eq!(LinkState::RcvEof.to_string(), "RCVEOF");
        assert_eq!(LinkState::INITIAL.to_string(), "SEND_ALIGN");
    }

    #[test]
    fn serde_roundtrip_keeps_align_progress() {
        let state = LinkState::SendAlign { sent: 42 };
        let json = serde_json::to_string(&state).unwrap();
        let back: LinkState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
