//! Connection to a scale and the notification pump that drives the protocol.
//!
//! [`ScaleSession`] owns the BLE peripheral for the lifetime of one
//! connection. Each notification from the notify characteristic is decoded,
//! passed through the [`Responder`], and the resulting acknowledgement is
//! written back before the next notification is looked at.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::{
    Frame, NOTIFY_CHARACTERISTIC_UUID, SERVICE_UUID, WRITE_CHARACTERISTIC_UUID,
};
use crate::error::{Error, Result};
use crate::events::{EventSender, ScaleEvent};
use crate::responder::Responder;
use crate::retry::{with_retry, RetryConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Destination for acknowledgement frames.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn write_frame(&self, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub handshake_timeout: Duration,
    pub verify_checksum: bool,
    pub write_retry: RetryConfig,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout(),
            verify_checksum: config.verify_checksum,
            write_retry: config.write_retry(),
        }
    }
}

pub struct ScaleSession {
    peripheral: Peripheral,
}

impl ScaleSession {
    pub fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    /// Connects, discovers the scale service and subscribes to readings.
    ///
    /// Emits [`ScaleEvent::Connected`] once notifications are flowing and
    /// returns the handle of the task pumping them. The task emits
    /// [`ScaleEvent::Disconnected`] when the notification stream ends.
    /// If anything fails after the link is up, the link is dropped again.
    pub async fn connect(
        self: Arc<Self>,
        options: SessionOptions,
        events: EventSender,
    ) -> Result<JoinHandle<()>> {
        timeout(CONNECT_TIMEOUT, self.peripheral.connect())
            .await
            .map_err(|_| Error::Timeout {
                operation: "connect",
                duration: CONNECT_TIMEOUT,
            })??;
        info!("connected");

        let notifications =
            disconnect_on_error(self.open_readings().await, || self.disconnect()).await?;
        send_event(&events, ScaleEvent::Connected);

        let handle = tokio::spawn({
            let me = Arc::clone(&self);
            async move {
                pump_notifications(notifications, me.as_ref(), &events, &options).await;
            }
        });

        Ok(handle)
    }

    async fn open_readings(&self) -> Result<Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>> {
        self.discover().await?;
        let notify_char = self.characteristic(NOTIFY_CHARACTERISTIC_UUID)?;
        // Take the stream before subscribing so the first handshake frame is not lost.
        let notifications = self
            .peripheral
            .notifications()
            .await?
            .filter(|n| futures::future::ready(n.uuid == NOTIFY_CHARACTERISTIC_UUID))
            .map(|n| n.value);
        self.peripheral.subscribe(&notify_char).await?;
        Ok(Box::pin(notifications))
    }

    async fn discover(&self) -> Result<()> {
        self.peripheral.discover_services().await?;
        if !self.peripheral.services().iter().any(|s| s.uuid == SERVICE_UUID) {
            return Err(Error::ServiceNotFound(SERVICE_UUID));
        }
        self.characteristic(NOTIFY_CHARACTERISTIC_UUID)?;
        self.characteristic(WRITE_CHARACTERISTIC_UUID)?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        info!("disconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        match timeout(Duration::from_millis(200), self.peripheral.is_connected()).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(_)) => false,
            Err(_) => false,
        }
    }

    fn characteristic(&self, uuid: uuid::Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid && c.service_uuid == SERVICE_UUID)
            .ok_or(Error::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl FrameSink for ScaleSession {
    async fn write_frame(&self, bytes: &[u8]) -> Result<()> {
        let write_char = self.characteristic(WRITE_CHARACTERISTIC_UUID)?;
        self.peripheral
            .write(&write_char, bytes, WriteType::WithResponse)
            .await
            .map_err(|e| Error::WriteFailed {
                characteristic: WRITE_CHARACTERISTIC_UUID,
                reason: e.to_string(),
            })
    }
}

/// Passes `result` through, running `disconnect` first when it is an error.
async fn disconnect_on_error<T, F, Fut>(result: Result<T>, disconnect: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if let Err(e) = &result {
        warn!("session setup failed: {}", e);
        if let Err(e) = disconnect().await {
            debug!("disconnect after failed setup: {}", e);
        }
    }
    result
}

/// Runs the protocol over a stream of raw notification buffers until the
/// stream ends, then emits [`ScaleEvent::Disconnected`].
///
/// Buffers are handled strictly in order and each acknowledgement is awaited
/// before the next buffer is read. If the scale goes quiet while a handshake
/// is pending for longer than `handshake_timeout`, the responder is reset and
/// [`ScaleEvent::HandshakeTimeout`] is emitted. Once the stop acknowledgement
/// for a settled reading has been written, [`ScaleEvent::StopSent`] follows.
pub async fn pump_notifications<S, W>(
    mut notifications: S,
    sink: &W,
    events: &EventSender,
    options: &SessionOptions,
) where
    S: Stream<Item = Vec<u8>> + Unpin,
    W: FrameSink + ?Sized,
{
    let mut responder = Responder::new();

    loop {
        let next = if responder.state().is_handshaking() {
            match timeout(options.handshake_timeout, notifications.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(state = ?responder.state(), "handshake timed out");
                    responder.reset();
                    send_event(events, ScaleEvent::HandshakeTimeout);
                    continue;
                }
            }
        } else {
            notifications.next().await
        };

        let Some(buf) = next else {
            break;
        };

        let frame = Frame::from(buf.as_slice());
        frame.log();
        if options.verify_checksum && !frame.checksum_valid() {
            warn!(frame = ?buf, "dropping frame with bad checksum");
            continue;
        }

        let response = responder.respond(&frame);
        let settled = matches!(response.event, Some(ScaleEvent::FinalWeight { .. }));
        if let Some(event) = response.event {
            send_event(events, event);
        }
        if let Some(bytes) = response.write {
            debug!(bytes = ?bytes, "acknowledging");
            let write = || sink.write_frame(bytes);
            match with_retry(&options.write_retry, "acknowledge", write).await {
                Ok(()) if settled => send_event(events, ScaleEvent::StopSent),
                Ok(()) => {}
                Err(e) => {
                    warn!("acknowledgement failed: {}", e);
                    send_event(events, ScaleEvent::Error { message: e.to_string() });
                }
            }
        }
    }

    info!("notification stream ended");
    send_event(events, ScaleEvent::Disconnected);
}

fn send_event(events: &EventSender, event: ScaleEvent) {
    if events.send(event).is_err() {
        debug!("event receiver dropped");
    }
}
