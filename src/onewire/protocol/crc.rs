//! CRC16 framing for DS1961S exchanges.
//!
//! The device runs the 1-Wire CRC16 (x^16 + x^15 + x^2 + 1, LSB first,
//! zero seed) over everything shifted in either direction since the
//! command byte, and transmits the result inverted, low byte first.

/// Compute CRC16 over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// The two trailer bytes a device sends after `data`
pub fn inverted_crc_bytes(data: &[u8]) -> [u8; 2] {
    (!crc16(data)).to_le_bytes()
}

/// Check the complemented CRC16 trailer at `crc_lo_idx` / `crc_hi_idx`
/// against `buffer[..length]`.
///
/// False means the exchange is corrupted and nothing in it can be trusted.
pub fn validate(buffer: &[u8], length: usize, crc_lo_idx: usize, crc_hi_idx: usize) -> bool {
    if length > buffer.len() || crc_lo_idx >= buffer.len() || crc_hi_idx >= buffer.len() {
        return false;
    }

    let received = u16::from_le_bytes([!buffer[crc_lo_idx], !buffer[crc_hi_idx]]);
    crc16(&buffer[..length]) == received
}

/// CRC carried by the trailer, for diagnostics
pub(crate) fn received_crc(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([!lo, !hi])
}
