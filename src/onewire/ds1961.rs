//! High-level DS1961S driver
//!
//! This module sequences the device's function commands into the
//! transactions a host actually needs: loading a secret, writing a data
//! block, and reading a page with a challenge-bound MAC. It works with any
//! backend implementing [`OneWireBackend`].

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};

use crate::auth::Challenge;
use crate::error::Error;
use crate::mac::Mac;
use crate::secret::{BinarySecret, PrintableSecret};
use super::backend::OneWireBackend;
use super::protocol::commands::{status, timing, Command, EsFlags, MemoryPage};
use super::protocol::transaction::ExchangeBuffer;

/// Step of a composed transaction, used to tell callers where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WriteScratchpad,
    ReadScratchpad,
    CopyScratchpad,
    RefreshScratchpad,
    LoadFirstSecret,
    ReadAuthPage,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WriteScratchpad => "Write Scratchpad",
            Self::ReadScratchpad => "Read Scratchpad",
            Self::CopyScratchpad => "Copy Scratchpad",
            Self::RefreshScratchpad => "Refresh Scratchpad",
            Self::LoadFirstSecret => "Load First Secret",
            Self::ReadAuthPage => "Read Authenticated Page",
        };
        f.write_str(name)
    }
}

/// Wrap a primitive's error with the phase it happened in
fn in_phase(phase: Phase, code: u8) -> impl FnOnce(Error) -> Error {
    move |source| {
        warn!("{phase} failed (#{code}): {source}");
        Error::Phase {
            phase,
            code,
            source: Box::new(source),
        }
    }
}

/// Scratchpad readback: target address, E/S authorization byte and data
///
/// Only meaningful until the next command in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad {
    pub address: u16,
    pub es: u8,
    pub data: [u8; 8],
}

impl Scratchpad {
    pub fn flags(&self) -> EsFlags {
        EsFlags::from_bits_retain(self.es)
    }
}

/// Result of a Read Authenticated Page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPage {
    pub data: [u8; 32],
    pub mac: Mac,
}

/// Scratchpad contents for an authenticated read: zeros, challenge at 4..7
pub fn challenge_scratchpad(challenge: &Challenge) -> [u8; 8] {
    let mut scratchpad = [0u8; 8];
    scratchpad[4..7].copy_from_slice(challenge);
    scratchpad
}

fn check_status(actual: u8) -> Result<(), Error> {
    if actual == status::SUCCESS {
        Ok(())
    } else {
        Err(Error::Status {
            expected: status::SUCCESS,
            actual,
        })
    }
}

/// DS1961S driver - works with any backend
///
/// `D` provides the blocking waits the device needs while it computes a
/// MAC or programs EEPROM; the bus stays powered during both.
pub struct Ds1961<B: OneWireBackend, D: DelayNs> {
    backend: B,
    delay: D,
}

impl<B: OneWireBackend, D: DelayNs> Ds1961<B, D> {
    /// Create a new driver over the specified backend
    pub fn new(backend: B, delay: D) -> Self {
        Self { backend, delay }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Give back backend and delay provider
    pub fn release(self) -> (B, D) {
        (self.backend, self.delay)
    }

    /// Shift out everything after the command byte, then read and check
    /// the CRC16 the device echoes over the whole frame.
    fn send_echoed(&mut self, mut frame: ExchangeBuffer) -> Result<(), Error> {
        trace!(">> {}", hex::encode(frame.as_slice()));
        self.backend.write_bytes(&frame.as_slice()[1..])?;
        self.backend.read_bytes(frame.reserve(2))?;
        frame.check_crc()
    }

    fn load_scratchpad(&mut self, command: Command, addr: u16, data: &[u8; 8]) -> Result<(), Error> {
        let mut frame = ExchangeBuffer::request(command, addr);
        frame.extend(data);

        self.backend.command(command)?;
        self.send_echoed(frame)
    }

    /// Write Scratchpad: stage 8 bytes for `addr`
    pub fn write_scratchpad(&mut self, addr: u16, data: &[u8; 8]) -> Result<(), Error> {
        debug!("WriteScratchpad({addr:#06X})");
        self.load_scratchpad(Command::WriteScratchpad, addr, data)
    }

    /// Refresh Scratchpad: re-arm the scratchpad with the same data after a commit
    pub fn refresh_scratchpad(&mut self, addr: u16, data: &[u8; 8]) -> Result<(), Error> {
        debug!("RefreshScratchpad({addr:#06X})");
        self.load_scratchpad(Command::RefreshScratchpad, addr, data)
    }

    /// Read Scratchpad: target address, E/S byte and staged data
    pub fn read_scratchpad(&mut self) -> Result<Scratchpad, Error> {
        debug!("ReadScratchpad()");
        let mut frame = ExchangeBuffer::new();
        frame.push(Command::ReadScratchpad.opcode());
        self.backend.command(Command::ReadScratchpad)?;

        // TA1, TA2, E/S, data, CRC
        self.backend.read_bytes(frame.reserve(3 + 8 + 2))?;
        trace!("<< {}", hex::encode(frame.as_slice()));
        frame.check_crc()?;

        let header = frame.field(1, 3);
        let mut data = [0u8; 8];
        data.copy_from_slice(frame.field(4, 8));

        Ok(Scratchpad {
            address: u16::from_le_bytes([header[0], header[1]]),
            es: header[2],
            data,
        })
    }

    /// Copy Scratchpad: commit the scratchpad to EEPROM, authorized by `es`
    /// and the host MAC.
    pub fn copy_scratchpad(&mut self, addr: u16, es: u8, mac: &Mac) -> Result<(), Error> {
        debug!("CopyScratchpad({addr:#06X}, {es:#04X})");
        let mut frame = ExchangeBuffer::request(Command::CopyScratchpad, addr);
        frame.push(es);

        self.backend.command(Command::CopyScratchpad)?;
        self.backend.write_bytes(&frame.as_slice()[1..])?;

        self.delay.delay_ns(timing::SHA_COMPUTE_NS);
        self.backend.write_bytes(mac)?;
        self.delay.delay_ns(timing::PROGRAM_NS);

        check_status(self.backend.read_byte()?)
    }

    /// Load First Secret: commit the scratchpad without a MAC
    ///
    /// Once the status wait starts the device may already have programmed
    /// memory; only rerunning the enclosing transaction is safe.
    pub fn load_first_secret(&mut self, addr: u16, es: u8) -> Result<(), Error> {
        debug!("LoadFirstSecret({addr:#06X}, {es:#04X})");
        let mut frame = ExchangeBuffer::request(Command::LoadFirstSecret, addr);
        frame.push(es);

        self.backend.command(Command::LoadFirstSecret)?;
        self.backend.write_bytes(&frame.as_slice()[1..])?;
        self.delay.delay_ns(timing::PROGRAM_NS);

        let status = self.backend.read_byte()?;
        debug!("LoadFirstSecret status: {status:#04X}");
        check_status(status)
    }

    /// Read Authenticated Page
    ///
    /// Two sub-frames, each with its own CRC: page data plus a fixed 0xFF,
    /// then (after the SHA wait) the 20-byte MAC. A final 0xAA closes it.
    pub fn read_auth_page(&mut self, addr: u16) -> Result<AuthPage, Error> {
        debug!("ReadAuthPage({addr:#06X})");
        let mut frame = ExchangeBuffer::request(Command::ReadAuthPage, addr);

        self.backend.command(Command::ReadAuthPage)?;
        self.backend.write_bytes(&frame.as_slice()[1..])?;

        self.backend.read_bytes(frame.reserve(MemoryPage::data_page_size() + 1 + 2))?;
        trace!("<< {}", hex::encode(frame.as_slice()));
        frame.check_crc()?;

        let marker = frame.as_slice()[3 + MemoryPage::data_page_size()];
        if marker != status::PAGE_END_MARKER {
            return Err(Error::FrameMarker {
                expected: status::PAGE_END_MARKER,
                actual: marker,
            });
        }

        let mut data = [0u8; 32];
        data.copy_from_slice(frame.field(3, 32));

        self.delay.delay_ns(timing::SHA_COMPUTE_NS);

        frame.clear();
        self.backend.read_bytes(frame.reserve(20 + 2))?;
        trace!("<< {}", hex::encode(frame.as_slice()));
        frame.check_crc()?;

        let mut mac = [0u8; 20];
        mac.copy_from_slice(frame.field(0, 20));

        check_status(self.backend.read_byte()?)?;
        Ok(AuthPage { data, mac })
    }

    /// Read Memory: plain read starting at `addr`, no CRC protection
    pub fn read_memory(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Error> {
        debug!("ReadMemory({addr:#06X}, {})", buffer.len());
        self.backend.command(Command::ReadMemory)?;
        self.backend.write_bytes(&addr.to_le_bytes())?;
        self.backend.read_bytes(buffer)
    }

    /// Load an 8-byte secret into the secret register.
    ///
    /// Error codes: 3 Write Scratchpad, 2 Read Scratchpad, 1 Load First Secret.
    pub fn write_secret(&mut self, secret: &BinarySecret) -> Result<(), Error> {
        let secret_addr = MemoryPage::Secret.address();

        self.write_scratchpad(secret_addr, secret.as_bytes())
            .map_err(in_phase(Phase::WriteScratchpad, 3))?;

        let readback = self
            .read_scratchpad()
            .map_err(in_phase(Phase::ReadScratchpad, 2))?;

        self.load_first_secret(readback.address, readback.es)
            .map_err(in_phase(Phase::LoadFirstSecret, 1))
    }

    /// Pack a printable secret and load it
    pub fn write_secret16(&mut self, secret: &PrintableSecret) -> Result<(), Error> {
        self.write_secret(&secret.to_binary())
    }

    /// Write 8 bytes of data to `addr`.
    ///
    /// All five steps are needed; dropping the refresh/reload tail leaves
    /// the page unusable for authenticated reads even though the copy
    /// succeeded. Error codes: 5 Write Scratchpad, 4 Read Scratchpad,
    /// 3 Copy Scratchpad, 2 Refresh Scratchpad, 1 Load First Secret.
    pub fn write_data(&mut self, addr: u16, data: &[u8; 8], mac: &Mac) -> Result<(), Error> {
        self.write_scratchpad(addr, data)
            .map_err(in_phase(Phase::WriteScratchpad, 5))?;

        let readback = self
            .read_scratchpad()
            .map_err(in_phase(Phase::ReadScratchpad, 4))?;

        self.copy_scratchpad(readback.address, readback.es, mac)
            .map_err(in_phase(Phase::CopyScratchpad, 3))?;

        self.refresh_scratchpad(addr, data)
            .map_err(in_phase(Phase::RefreshScratchpad, 2))?;

        self.load_first_secret(addr, readback.es)
            .map_err(in_phase(Phase::LoadFirstSecret, 1))
    }

    /// Stage `challenge` and read the page at `addr` with its device MAC.
    ///
    /// Error codes: 2 Write Scratchpad, 1 Read Authenticated Page.
    pub fn read_auth_with_challenge(&mut self, addr: u16, challenge: &Challenge) -> Result<AuthPage, Error> {
        self.write_scratchpad(addr, &challenge_scratchpad(challenge))
            .map_err(in_phase(Phase::WriteScratchpad, 2))?;

        self.read_auth_page(addr)
            .map_err(in_phase(Phase::ReadAuthPage, 1))
    }
}
