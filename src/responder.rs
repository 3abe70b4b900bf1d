//! Handshake and acknowledgement logic for the scale protocol.
//!
//! The scale opens with two handshake frames that must each be answered with
//! a fixed byte sequence, then streams weight readings. A settled reading is
//! acknowledged with a stop sequence; live readings are never answered.

use tracing::debug;

use crate::constants::{
    Frame, Stability, HANDSHAKE_1_RESPONSE, HANDSHAKE_2_RESPONSE, STOP_RESPONSE,
};
use crate::events::ScaleEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Init,
    AwaitingHandshake2,
    Streaming,
}

impl HandshakeState {
    /// A handshake is underway and the scale owes us its second frame.
    ///
    /// `Init` is not handshaking: an idle scale sends nothing until stepped on.
    pub fn is_handshaking(&self) -> bool {
        matches!(self, HandshakeState::AwaitingHandshake2)
    }
}

/// What to do in reaction to one frame. The event is delivered before the write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub event: Option<ScaleEvent>,
    pub write: Option<&'static [u8]>,
}

#[derive(Debug, Default)]
pub struct Responder {
    state: HandshakeState,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = HandshakeState::Init;
    }

    /// Answers are keyed on the frame kind alone, so a scale that restarts
    /// its handshake mid-stream is answered again.
    pub fn respond(&mut self, frame: &Frame) -> Response {
        match frame {
            Frame::Handshake1 { .. } => {
                self.state = HandshakeState::AwaitingHandshake2;
                Response { event: None, write: Some(&HANDSHAKE_1_RESPONSE) }
            }
            Frame::Handshake2 { .. } => {
                self.state = HandshakeState::Streaming;
                Response { event: None, write: Some(&HANDSHAKE_2_RESPONSE) }
            }
            Frame::WeightReading { stability, .. } => {
                if self.state != HandshakeState::Streaming {
                    debug!(state = ?self.state, "weight reading before handshake completed");
                    self.state = HandshakeState::Streaming;
                }
                let kg = frame.weight_kg().unwrap_or_default();
                match stability {
                    Stability::Live => Response {
                        event: Some(ScaleEvent::LiveWeight { kg }),
                        write: None,
                    },
                    Stability::Stable => Response {
                        event: Some(ScaleEvent::FinalWeight { kg }),
                        write: Some(&STOP_RESPONSE),
                    },
                    Stability::Other(flag) => {
                        debug!(flag, "ignoring weight reading with unknown stability flag");
                        Response::default()
                    }
                }
            }
            Frame::Unknown { .. } => Response::default(),
        }
    }
}
