//! Per-step link-layer datapath.
//!
//! [`Link`] wraps the pure [`next_state`] function with the side effects each
//! state performs: scrambling outgoing frames, descrambling and checking
//! incoming ones, and keeping the queue of reply frames.

use std::collections::VecDeque;

use satasim_common::{PhyWord, Primitive};
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::state::{next_state, LinkState, TransitionInput};

/// Tunables for the link and OOB models.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// Length of the ALIGN burst after the OOB handshake.
    pub align_count: u32,
    /// Consecutive host idle steps before COMRESET is recognised.
    pub comreset_idle_steps: u32,
    /// Largest received frame, in words excluding the CRC trailer.
    pub max_frame_words: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            align_count: 100,
            comreset_idle_steps: 1,
            max_frame_words: satasim_common::fis::MAX_DATA_FIS_WORDS + 1,
        }
    }
}

/// Link-layer device state machine and datapath.
#[derive(Debug)]
pub struct Link {
    config: LinkConfig,
    state: LinkState,
    codec: FrameCodec,
    /// Frames waiting to be sent, in host order; the head is in flight.
    outbound: VecDeque<Vec<u32>>,
    /// Position within the head frame: 0 is SOF, then data, then CRC.
    tx_index: usize,
    /// Data words of the frame being received.
    rx_words: Vec<u32>,
    /// Most recent received word; becomes data once another word follows,
    /// or is the CRC trailer if EOF follows.
    rx_held: Option<u32>,
    rx_overflow: bool,
    /// Frames that passed the CRC check, oldest first.
    received: VecDeque<Vec<u32>>,
}

impl Link {
    /// Creates a link in [`LinkState::INITIAL`].
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: LinkState::INITIAL,
            codec: FrameCodec::new(),
            outbound: VecDeque::new(),
            tx_index: 0,
            rx_words: Vec::new(),
            rx_held: None,
            rx_overflow: false,
            received: VecDeque::new(),
        }
    }

    /// Returns all state to its post-construction values, dropping queued
    /// and partially received frames.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Current protocol state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The configuration in use.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Queues a host-order frame for transmission.
    pub fn queue_frame(&mut self, words: Vec<u32>) {
        self.outbound.push_back(words);
    }

    /// Number of frames not yet fully sent.
    pub fn pending_frames(&self) -> usize {
        self.outbound.len()
    }

    /// Takes the oldest frame that passed its CRC check.
    pub fn take_received(&mut self) -> Option<Vec<u32>> {
        self.received.pop_front()
    }

    /// Advances one TX-domain step: consumes the host's word and returns the
    /// device's word for the same edge.
    pub fn step(&mut self, host: PhyWord) -> PhyWord {
        let host_prim = host.as_primitive();
        let mut frame_sent = false;
        let mut crc_ok = false;

        let out = match self.state {
            LinkState::Idle => {
                self.codec.reset();
                PhyWord::primitive(Primitive::Sync)
            }
            LinkState::SendData => {
                let (word, last) = self.next_tx_word();
                frame_sent = last;
                word
            }
            LinkState::SendEof => {
                self.outbound.pop_front();
                self.tx_index = 0;
                PhyWord::primitive(Primitive::Eof)
            }
            LinkState::RcvChkRdy => {
                if host_prim == Some(Primitive::Sof) {
                    self.begin_receive();
                }
                PhyWord::primitive(Primitive::RRdy)
            }
            LinkState::RcvData => {
                if !host.primitive {
                    self.receive_word(host.data);
                }
                PhyWord::primitive(Primitive::RIp)
            }
            LinkState::RcvEof => {
                crc_ok = self.finish_receive();
                PhyWord::primitive(Primitive::RIp)
            }
            other => match other.emitted() {
                Some(p) => PhyWord::primitive(p),
                None => PhyWord::primitive(Primitive::Sync),
            },
        };

        let input = TransitionInput {
            host: host_prim,
            align_count: self.config.align_count,
            frame_pending: !self.outbound.is_empty(),
            frame_sent,
            crc_ok,
        };
        let next = next_state(self.state, &input);
        if std::mem::discriminant(&next) != std::mem::discriminant(&self.state) {
            debug!(from = %self.state, to = %next, host = %host, "link transition");
        }
        self.state = next;
        out
    }

    /// Produces the next word of the head frame: SOF, data, then CRC.
    fn next_tx_word(&mut self) -> (PhyWord, bool) {
        let Some(frame) = self.outbound.front() else {
            // Nothing to send; close the frame out immediately.
            return (PhyWord::primitive(Primitive::Sof), true);
        };
        let index = self.tx_index;
        self.tx_index += 1;
        if index == 0 {
            self.codec.reset();
            (PhyWord::primitive(Primitive::Sof), false)
        } else if index <= frame.len() {
            let word = frame[index - 1];
            (PhyWord::data(self.codec.encode_data(word)), false)
        } else {
            (PhyWord::data(self.codec.encode_crc()), true)
        }
    }

    fn begin_receive(&mut self) {
        self.codec.reset();
        self.rx_words.clear();
        self.rx_held = None;
        self.rx_overflow = false;
    }

    fn receive_word(&mut self, wire: u32) {
        let word = self.codec.decode(wire);
        if let Some(prev) = self.rx_held.replace(word) {
            self.codec.accumulate(prev);
            if self.rx_words.len() < self.config.max_frame_words {
                self.rx_words.push(prev);
            } else if !self.rx_overflow {
                warn!(limit = self.config.max_frame_words, "received frame overflow");
                self.rx_overflow = true;
            }
        }
    }

    /// Checks the trailer of the frame just ended. A good frame is moved to
    /// the received queue.
    fn finish_receive(&mut self) -> bool {
        let ok = !self.rx_overflow
            && !self.rx_words.is_empty()
            && self.rx_held == Some(self.codec.crc());
        if ok {
            debug!(words = self.rx_words.len(), fis_type = self.rx_words[0] & 0xFF, "frame received");
            self.received.push_back(std::mem::take(&mut self.rx_words));
        } else {
            warn!(
                expected = self.codec.crc(),
                received = ?self.rx_held,
                words = self.rx_words.len(),
                "frame rejected"
            );
        }
        ok
    }
}
