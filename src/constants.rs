use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

pub const DEVICE_NAME: &str = "QN-Scale";

pub const SERVICE_UUID: Uuid = uuid_from_u16(0xffe0);
/// Scale -> host notifications.
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(0xffe1);
/// Host -> scale writes.
pub const WRITE_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(0xffe3);

pub(crate) const HANDSHAKE_1_ID: u8 = 0x12;
pub(crate) const HANDSHAKE_2_ID: u8 = 0x14;
pub(crate) const WEIGHT_READING_ID: u8 = 0x10;

/// Shortest buffer that carries every weight reading field.
pub(crate) const WEIGHT_READING_MIN_LEN: usize = 6;

pub const HANDSHAKE_1_RESPONSE: [u8; 9] = [0x13, 0x09, 0x15, 0x01, 0x10, 0x00, 0x00, 0x00, 0x42];
pub const HANDSHAKE_2_RESPONSE: [u8; 8] = [0x20, 0x08, 0x15, 0x09, 0x0b, 0xac, 0x29, 0x26];
/// Sent after a stable reading so the scale stops repeating it.
pub const STOP_RESPONSE: [u8; 5] = [0x1f, 0x05, 0x15, 0x10, 0x49];

pub const DEFAULT_UNIT: &str = "kg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Live,
    Stable,
    Other(u8),
}

impl From<u8> for Stability {
    fn from(flag: u8) -> Self {
        match flag {
            0 => Stability::Live,
            1 => Stability::Stable,
            other => Stability::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Handshake1 { len: u8, checksum: u8, data: Vec<u8> },
    Handshake2 { len: u8, checksum: u8, data: Vec<u8> },
    WeightReading {
        len: u8,
        checksum: u8,
        scale_type: u8,
        raw_weight: u16,
        stability: Stability,
        data: Vec<u8>,
    },
    Unknown { identifier: u8, len: u8, checksum: u8, data: Vec<u8> },
}

impl Frame {
    pub fn identifier(&self) -> u8 {
        match self {
            Frame::Handshake1 { .. } => HANDSHAKE_1_ID,
            Frame::Handshake2 { .. } => HANDSHAKE_2_ID,
            Frame::WeightReading { .. } => WEIGHT_READING_ID,
            Frame::Unknown { identifier, .. } => *identifier,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Handshake1 { data, .. }
            | Frame::Handshake2 { data, .. }
            | Frame::WeightReading { data, .. }
            | Frame::Unknown { data, .. } => data,
        }
    }

    /// Weight in kilograms, for weight readings only.
    pub fn weight_kg(&self) -> Option<f64> {
        match self {
            Frame::WeightReading { raw_weight, .. } => Some(f64::from(*raw_weight) / 100.0),
            _ => None,
        }
    }
}
