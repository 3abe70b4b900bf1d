use crate::constants::{
    Frame, Stability, HANDSHAKE_1_ID, HANDSHAKE_2_ID, WEIGHT_READING_ID, WEIGHT_READING_MIN_LEN,
};
use crate::encoding::checksum;

impl From<&[u8]> for Frame {
    fn from(buf: &[u8]) -> Self {
        let identifier = buf.first().copied().unwrap_or(0);
        let len = buf.get(1).copied().unwrap_or(0);
        let checksum = buf.last().copied().unwrap_or(0);
        let data = buf.to_vec();

        match identifier {
            HANDSHAKE_1_ID => Frame::Handshake1 { len, checksum, data },
            HANDSHAKE_2_ID => Frame::Handshake2 { len, checksum, data },
            WEIGHT_READING_ID if buf.len() >= WEIGHT_READING_MIN_LEN => Frame::WeightReading {
                len,
                checksum,
                scale_type: buf[2],
                raw_weight: decode_weight(&buf[3..5]),
                stability: Stability::from(buf[5]),
                data,
            },
            _ => Frame::Unknown { identifier, len, checksum, data },
        }
    }
}

impl Frame {
    /// True when the trailing byte equals the sum of the preceding bytes.
    pub fn checksum_valid(&self) -> bool {
        match self.data().split_last() {
            Some((last, body)) => checksum(body) == *last,
            None => false,
        }
    }
}

fn decode_weight(weight_payload: &[u8]) -> u16 {
    (weight_payload[0] as u16) << 8 | weight_payload[1] as u16
}
