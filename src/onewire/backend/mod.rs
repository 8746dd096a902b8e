//! Backend abstraction module - bus adapter implementations
//!
//! This module defines the byte-level contract the DS1961S driver needs
//! from a 1-Wire master. Reset, presence detection and ROM selection are
//! the adapter's business; the driver only sees function commands.

use crate::error::Error;
use super::protocol::commands::Command;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Common 1-Wire backend trait
///
/// All calls block and only one is ever in flight. Mutual exclusion over
/// a shared bus is up to the implementation.
pub trait OneWireBackend {
    /// Reset, select the device and send a function command byte
    fn command(&mut self, command: Command) -> Result<(), Error>;

    /// Write a single byte
    fn write_byte(&mut self, byte: u8) -> Result<(), Error>;

    /// Read a single byte
    fn read_byte(&mut self) -> Result<u8, Error>;

    /// Write a sequence of bytes
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Fill `buffer` from the bus
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        for slot in buffer.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }
}

impl<T: OneWireBackend + ?Sized> OneWireBackend for &mut T {
    fn command(&mut self, command: Command) -> Result<(), Error> {
        (**self).command(command)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        (**self).write_byte(byte)
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        (**self).write_bytes(bytes)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        (**self).read_bytes(buffer)
    }
}
