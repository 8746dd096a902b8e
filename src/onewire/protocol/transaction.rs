//! Per-transaction exchange buffer
//!
//! Every primitive builds its own buffer on the stack, so nothing a frame
//! carries can leak into the next command.

use super::commands::Command;
use super::crc;
use crate::error::Error;

/// Largest frame: Read Auth Page phase 1 (3 header + 32 data + 0xFF + 2 CRC)
pub const EXCHANGE_CAPACITY: usize = 40;

/// Bytes shifted in either direction during one command
#[derive(Debug, Clone)]
pub struct ExchangeBuffer {
    bytes: [u8; EXCHANGE_CAPACITY],
    len: usize,
}

impl Default for ExchangeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeBuffer {
    pub fn new() -> Self {
        Self {
            bytes: [0u8; EXCHANGE_CAPACITY],
            len: 0,
        }
    }

    /// Start a frame with the command byte followed by TA1/TA2
    pub fn request(command: Command, address: u16) -> Self {
        let mut frame = Self::new();
        frame.push(command.opcode());
        frame.extend(&address.to_le_bytes());
        frame
    }

    /// Append one byte
    ///
    /// # Panics
    /// If the frame would exceed [`EXCHANGE_CAPACITY`].
    pub fn push(&mut self, byte: u8) {
        self.bytes[self.len] = byte;
        self.len += 1;
    }

    /// Append a slice
    ///
    /// # Panics
    /// If the frame would exceed [`EXCHANGE_CAPACITY`].
    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Grow by `count` zeroed bytes and hand them out for the backend to fill
    pub fn reserve(&mut self, count: usize) -> &mut [u8] {
        let start = self.len;
        self.len += count;
        let slot = &mut self.bytes[start..self.len];
        slot.fill(0);
        slot
    }

    /// Start a new sub-frame; the CRC window restarts at zero
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// `len` bytes starting at `start`, relative to the frame start
    pub fn field(&self, start: usize, len: usize) -> &[u8] {
        &self.as_slice()[start..start + len]
    }

    /// Validate the trailing two bytes as the inverted CRC16 of everything
    /// before them.
    pub fn check_crc(&self) -> Result<(), Error> {
        if self.len < 2 {
            return Err(Error::Crc {
                expected: 0,
                actual: 0,
            });
        }

        let body = self.len - 2;
        if crc::validate(self.as_slice(), body, body, body + 1) {
            return Ok(());
        }

        Err(Error::Crc {
            expected: crc::crc16(&self.bytes[..body]),
            actual: crc::received_crc(self.bytes[body], self.bytes[body + 1]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header() {
        let frame = ExchangeBuffer::request(Command::CopyScratchpad, 0x0123);
        assert_eq!(frame.as_slice(), &[0x55, 0x23, 0x01]);
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn test_reserve_extends_frame() {
        let mut frame = ExchangeBuffer::request(Command::ReadScratchpad, 0);
        frame.clear();
        frame.push(Command::ReadScratchpad.opcode());
        frame.reserve(3).copy_from_slice(&[0x80, 0x00, 0x07]);
        assert_eq!(frame.as_slice(), &[0xAA, 0x80, 0x00, 0x07]);
        assert_eq!(frame.field(1, 2), &[0x80, 0x00]);
    }

    #[test]
    fn test_check_crc() {
        let mut frame = ExchangeBuffer::request(Command::WriteScratchpad, 0x20);
        frame.extend(&[0x11; 8]);
        let trailer = crc::inverted_crc_bytes(frame.as_slice());
        frame.extend(&trailer);
        assert!(frame.check_crc().is_ok());

        let mut bad = frame.clone();
        bad.clear();
        bad.extend(&frame.as_slice()[..frame.len() - 1]);
        bad.push(frame.as_slice()[frame.len() - 1] ^ 0x01);
        assert!(matches!(bad.check_crc(), Err(Error::Crc { .. })));
    }

    #[test]
    fn test_capacity_fits_largest_frame() {
        let mut frame = ExchangeBuffer::request(Command::ReadAuthPage, 0x60);
        frame.reserve(32 + 1 + 2);
        assert_eq!(frame.len(), 38);
        assert!(frame.len() <= EXCHANGE_CAPACITY);
    }

    #[test]
    fn test_short_frame_fails_crc() {
        let mut frame = ExchangeBuffer::new();
        frame.push(0x00);
        assert!(frame.check_crc().is_err());
    }
}
