/// Additive checksum: sum of all bytes modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Builds `[identifier, total_len, payload.., checksum]`.
pub fn encode(identifier: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 3);
    bytes.push(identifier);
    bytes.push((payload.len() + 3) as u8);
    bytes.extend_from_slice(payload);

    let cksum = checksum(&bytes);
    bytes.push(cksum);

    bytes
}
