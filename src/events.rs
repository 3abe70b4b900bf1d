//! Events raised by a scale session.
//!
//! A session hands these to its consumer over a `tokio::sync::mpsc`
//! channel rather than broadcasting them globally.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::constants::DEFAULT_UNIT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleEvent {
    Connected,
    Disconnected,
    /// Reading still settling; the scale keeps sending these.
    LiveWeight { kg: f64 },
    /// Settled reading. Sent once per weighing cycle.
    FinalWeight { kg: f64 },
    /// The stop acknowledgement for the settled reading has been written.
    StopSent,
    /// The scale stopped answering mid-handshake; the responder was reset.
    HandshakeTimeout,
    Error { message: String },
}

pub type EventSender = mpsc::UnboundedSender<ScaleEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ScaleEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Waits for a settled reading and for the scale to be told about it.
///
/// Returns once the stop acknowledgement for the reading has been written or
/// has failed for good, so the session can be torn down without cutting the
/// write short. `None` means the session ended before a settled reading.
pub async fn settled_weight(events: &mut EventReceiver) -> Option<f64> {
    let mut settled = None;
    while let Some(event) = events.recv().await {
        match event {
            ScaleEvent::Connected => info!("Connected"),
            ScaleEvent::LiveWeight { kg } => info!("{:.2} {}", kg, DEFAULT_UNIT),
            ScaleEvent::FinalWeight { kg } => settled = Some(kg),
            ScaleEvent::StopSent => {
                if settled.is_some() {
                    return settled;
                }
            }
            ScaleEvent::HandshakeTimeout => warn!("Scale stopped responding during handshake"),
            ScaleEvent::Error { message } => {
                warn!("{}", message);
                if settled.is_some() {
                    return settled;
                }
            }
            ScaleEvent::Disconnected => return settled,
        }
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&ScaleEvent::FinalWeight { kg: 75.3 }).unwrap();
        assert_eq!(json, r#"{"type":"final_weight","kg":75.3}"#);

        let json = serde_json::to_string(&ScaleEvent::Connected).unwrap();
        assert_eq!(json, r#"{"type":"connected"}"#);
    }

    #[tokio::test]
    async fn settled_weight_waits_for_the_stop_write() {
        let (tx, mut rx) = channel();
        tx.send(ScaleEvent::Connected).unwrap();
        tx.send(ScaleEvent::LiveWeight { kg: 74.8 }).unwrap();
        tx.send(ScaleEvent::FinalWeight { kg: 75.3 }).unwrap();

        let waiter = tokio::spawn(async move { settled_weight(&mut rx).await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send(ScaleEvent::StopSent).unwrap();
        assert_eq!(waiter.await.unwrap(), Some(75.3));
    }

    #[tokio::test]
    async fn settled_weight_returns_after_stop_sent() {
        let (tx, mut rx) = channel();
        tx.send(ScaleEvent::FinalWeight { kg: 75.3 }).unwrap();
        tx.send(ScaleEvent::StopSent).unwrap();
        tx.send(ScaleEvent::LiveWeight { kg: 1.0 }).unwrap();
        assert_eq!(settled_weight(&mut rx).await, Some(75.3));
        assert_eq!(rx.try_recv().unwrap(), ScaleEvent::LiveWeight { kg: 1.0 });
    }

    #[tokio::test]
    async fn settled_weight_survives_a_failed_stop_write() {
        let (tx, mut rx) = channel();
        tx.send(ScaleEvent::FinalWeight { kg: 80.0 }).unwrap();
        tx.send(ScaleEvent::Error { message: "gatt busy".into() }).unwrap();
        assert_eq!(settled_weight(&mut rx).await, Some(80.0));

        tx.send(ScaleEvent::Disconnected).unwrap();
        assert_eq!(settled_weight(&mut rx).await, None);
    }
}
