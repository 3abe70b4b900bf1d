use std::pin::Pin;
use std::time::Duration;

use async_stream::stream;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::scale::ScaleSession;

pub struct ScaleScanner {
    manager: Manager,
    device_name: String,
}

impl ScaleScanner {
    pub async fn new(device_name: impl Into<String>) -> Result<Self> {
        let manager = Manager::new().await?;
        Ok(Self {
            manager,
            device_name: device_name.into(),
        })
    }

    pub async fn start_scan(
        &self,
    ) -> Result<(Adapter, Pin<Box<dyn Stream<Item = Peripheral> + Send>>)> {
        let adapters = self.manager.adapters().await?;
        let central = adapters.into_iter().next().ok_or(Error::NoAdapter)?;

        central.start_scan(ScanFilter::default()).await?;
        info!(name = %self.device_name, "scanning");

        let stream = self.create_scale_stream(&central).await?;
        Ok((central, stream))
    }

    /// First peripheral advertising the configured name, or
    /// [`Error::DeviceNotFound`] once `scan_timeout` elapses.
    pub async fn find_scale(&self, scan_timeout: Duration) -> Result<ScaleSession> {
        let (central, mut scales) = self.start_scan().await?;
        let found = timeout(scan_timeout, scales.next()).await;
        if let Err(e) = central.stop_scan().await {
            debug!("failed to stop scan: {}", e);
        }

        match found {
            Ok(Some(peripheral)) => Ok(ScaleSession::new(peripheral)),
            _ => Err(Error::DeviceNotFound {
                name: self.device_name.clone(),
                timeout: scan_timeout,
            }),
        }
    }

    async fn create_scale_stream(
        &self,
        central: &Adapter,
    ) -> Result<Pin<Box<dyn Stream<Item = Peripheral> + Send>>> {
        let mut events = central.events().await?;
        let central = central.clone();
        let name = self.device_name.clone();

        let stream = stream! {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = central.peripheral(&id).await else {
                    continue;
                };
                if Self::is_scale(&peripheral, &name).await {
                    info!(id = ?peripheral.id(), "found scale");
                    yield peripheral;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Exact match on the advertised local name.
    async fn is_scale(peripheral: &impl btleplug::api::Peripheral, name: &str) -> bool {
        peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.local_name)
            .is_some_and(|local_name| local_name == name)
    }
}
