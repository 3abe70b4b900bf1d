use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::constants::Frame;

impl Frame {
    pub(crate) fn log(&self) {
        match self {
            Frame::Handshake1 { len, checksum, .. } => {
                debug!(len, checksum, "handshake 1")
            }
            Frame::Handshake2 { len, checksum, .. } => {
                debug!(len, checksum, "handshake 2")
            }
            Frame::WeightReading { scale_type, stability, .. } => debug!(
                scale_type,
                stability = ?stability,
                kg = self.weight_kg().unwrap_or_default(),
                "weight reading"
            ),
            Frame::Unknown { identifier, data, .. } => {
                debug!(identifier, payload = ?data, "unknown frame")
            }
        }
    }
}

/// `quiet` wins over `verbose`; with neither, `RUST_LOG` or `info` applies.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
