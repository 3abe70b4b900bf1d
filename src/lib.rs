//! Client for QN-Scale Bluetooth bathroom scales.
//!
//! Finds the scale by name, answers its handshake, turns its notifications
//! into [`ScaleEvent`]s and keeps a local history of settled weigh-ins.

pub mod config;
pub mod constants;
mod decoding;
pub mod encoding;
pub mod error;
pub mod events;
pub mod history;
mod logging;
pub mod responder;
pub mod retry;
pub mod scale;
pub mod scanner;

pub use config::Config;
pub use constants::{Frame, Stability};
pub use error::{Error, Result};
pub use events::ScaleEvent;
pub use history::{change_since, Change, Datapoint, HistoryStore, Progress};
pub use logging::init_tracing;
pub use responder::{HandshakeState, Responder, Response};
pub use scale::{pump_notifications, FrameSink, ScaleSession, SessionOptions};
pub use scanner::ScaleScanner;
