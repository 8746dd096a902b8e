//! Simulated DS1961S backend
//!
//! A byte-level model of the device: it parses the command stream the
//! driver shifts out, keeps scratchpad / E/S / secret state like the
//! hardware does, and answers with CRC-trailed frames computed by the same
//! MAC derivation the host uses. Faults can be injected to exercise the
//! driver's failure paths.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::auth::{self, DeviceId};
use crate::error::Error;
use crate::mac::Mac;
use crate::onewire::protocol::commands::{status, Command, EsFlags, MemoryPage};
use crate::onewire::protocol::crc;
use crate::secret::BinarySecret;
use super::OneWireBackend;

const DATA_MEMORY_SIZE: usize = 0x80;
const MEMORY_MAP_END: u16 = 0x98;

/// Status returned when the device refuses a commit
const REJECTED: u8 = 0xFF;

/// Simulated DS1961S on a private bus
pub struct SimulatedDs1961 {
    id: DeviceId,
    secret: BinarySecret,
    memory: [u8; DATA_MEMORY_SIZE],
    scratchpad: [u8; 8],
    target: u16,
    es: EsFlags,
    current: Option<Command>,
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
    forced_status: Option<u8>,
    corrupt_crc: Option<usize>,
    page_marker: u8,
    required_copy_mac: Option<Mac>,
    history: Vec<Command>,
}

impl SimulatedDs1961 {
    /// Fresh device: zero secret, zeroed data memory
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            secret: BinarySecret::default(),
            memory: [0u8; DATA_MEMORY_SIZE],
            scratchpad: [0u8; 8],
            target: 0,
            es: EsFlags::empty(),
            current: None,
            incoming: Vec::new(),
            outgoing: VecDeque::new(),
            forced_status: None,
            corrupt_crc: None,
            page_marker: status::PAGE_END_MARKER,
            required_copy_mac: None,
            history: Vec::new(),
        }
    }

    pub fn with_secret(mut self, secret: BinarySecret) -> Self {
        self.secret = secret;
        self
    }

    /// Preload the data page containing `addr`
    pub fn with_page(mut self, addr: u16, data: [u8; 32]) -> Self {
        if let Some(page) = MemoryPage::data_page_of(addr) {
            let start = page.address() as usize;
            self.memory[start..start + 32].copy_from_slice(&data);
        }
        self
    }

    /// Replace every final status byte with `status` (None restores normal behavior)
    pub fn force_status(&mut self, status: Option<u8>) {
        self.forced_status = status;
    }

    /// Flip one bit in the next CRC trailer the device sends
    pub fn corrupt_next_crc(&mut self) {
        self.corrupt_crc_after(0);
    }

    /// Let `skip` CRC trailers through intact, then flip one bit in the next
    pub fn corrupt_crc_after(&mut self, skip: usize) {
        self.corrupt_crc = Some(skip);
    }

    /// Byte sent after the page data of a Read Authenticated Page
    ///
    /// The trailer is computed over whatever is sent, so a wrong marker
    /// still arrives with a valid CRC.
    pub fn set_page_marker(&mut self, marker: u8) {
        self.page_marker = marker;
    }

    /// Only accept Copy Scratchpad when the host sends exactly `mac`
    pub fn require_copy_mac(&mut self, mac: Mac) {
        self.required_copy_mac = Some(mac);
    }

    pub fn device_id(&self) -> DeviceId {
        self.id
    }

    pub fn secret(&self) -> &BinarySecret {
        &self.secret
    }

    /// Current contents of the data page containing `addr`
    pub fn page(&self, addr: u16) -> Option<[u8; 32]> {
        let page = MemoryPage::data_page_of(addr)?;
        let start = page.address() as usize;
        let mut data = [0u8; 32];
        data.copy_from_slice(&self.memory[start..start + 32]);
        Some(data)
    }

    /// Target address and data currently held in the scratchpad
    pub fn scratchpad(&self) -> (u16, [u8; 8]) {
        (self.target, self.scratchpad)
    }

    pub fn es(&self) -> EsFlags {
        self.es
    }

    /// Every function command received, in order
    pub fn history(&self) -> &[Command] {
        &self.history
    }

    fn queue_crc(&mut self, covered: &[u8]) {
        let mut trailer = crc::inverted_crc_bytes(covered);
        self.corrupt_crc = match self.corrupt_crc {
            Some(0) => {
                trailer[0] ^= 0x01;
                None
            }
            Some(skip) => Some(skip - 1),
            None => None,
        };
        self.outgoing.extend(trailer);
    }

    fn queue_status(&mut self, status: u8) {
        self.outgoing.push_back(self.forced_status.unwrap_or(status));
    }

    fn frame(&self, command: Command) -> Vec<u8> {
        let mut frame = vec![command.opcode()];
        frame.extend_from_slice(&self.incoming);
        frame
    }

    fn load_scratchpad(&mut self, command: Command) {
        self.target = u16::from_le_bytes([self.incoming[0], self.incoming[1]]);
        self.scratchpad.copy_from_slice(&self.incoming[2..10]);
        // Aligned 8-byte write: ending offset 7, no partial byte, AA cleared
        self.es = EsFlags::E0 | EsFlags::E1 | EsFlags::E2;
        let frame = self.frame(command);
        self.queue_crc(&frame);
    }

    fn authorized(&self) -> bool {
        let addr = u16::from_le_bytes([self.incoming[0], self.incoming[1]]);
        addr == self.target && self.incoming[2] == self.es.bits()
    }

    fn commit_scratchpad(&mut self) {
        let start = self.target as usize;
        if start + 8 <= DATA_MEMORY_SIZE {
            self.memory[start..start + 8].copy_from_slice(&self.scratchpad);
        }
    }

    fn copy_scratchpad(&mut self) {
        let mut mac = [0u8; 20];
        mac.copy_from_slice(&self.incoming[3..23]);
        let mac_ok = self.required_copy_mac.is_none_or(|required| required == mac);

        if self.authorized() && mac_ok && (self.target as usize) < DATA_MEMORY_SIZE {
            self.commit_scratchpad();
            self.es |= EsFlags::AA;
            self.queue_status(status::SUCCESS);
        } else {
            self.queue_status(REJECTED);
        }
    }

    fn load_first_secret(&mut self) {
        if !self.authorized() {
            self.queue_status(REJECTED);
            return;
        }

        if self.target == MemoryPage::Secret.address() {
            self.secret = BinarySecret::new(self.scratchpad);
        } else {
            self.commit_scratchpad();
        }
        self.es |= EsFlags::AA;
        self.queue_status(status::SUCCESS);
    }

    fn read_auth_page(&mut self) {
        let addr = u16::from_le_bytes([self.incoming[0], self.incoming[1]]);
        let Some(page) = self.page(addr) else {
            return;
        };

        let mut challenge = [0u8; 3];
        challenge.copy_from_slice(&self.scratchpad[4..7]);
        let mac = auth::compute_expected_mac(addr, &page, &self.secret, &challenge, self.id);

        let mut frame = self.frame(Command::ReadAuthPage);
        frame.extend_from_slice(&page);
        frame.push(self.page_marker);
        self.outgoing.extend(&frame[3..]);
        self.queue_crc(&frame);

        self.outgoing.extend(mac);
        self.queue_crc(&mac);
        self.queue_status(status::SUCCESS);
    }

    fn memory_byte(&self, addr: u16) -> u8 {
        match addr {
            0x00..=0x7F => self.memory[addr as usize],
            0x90..=0x97 => self.id.value().to_le_bytes()[(addr - 0x90) as usize],
            // Secret and reserved bytes read as 0xFF
            _ => 0xFF,
        }
    }

    fn advance(&mut self) {
        let Some(command) = self.current else {
            return;
        };

        match (command, self.incoming.len()) {
            (Command::WriteScratchpad | Command::RefreshScratchpad, 10) => {
                self.load_scratchpad(command)
            }
            (Command::CopyScratchpad, 23) => self.copy_scratchpad(),
            (Command::LoadFirstSecret, 3) => self.load_first_secret(),
            (Command::ReadAuthPage, 2) => self.read_auth_page(),
            (Command::ReadMemory, 2) => {
                let start = u16::from_le_bytes([self.incoming[0], self.incoming[1]]);
                let bytes: Vec<u8> = (start..MEMORY_MAP_END).map(|a| self.memory_byte(a)).collect();
                self.outgoing.extend(bytes);
            }
            _ => {}
        }
    }
}

impl OneWireBackend for SimulatedDs1961 {
    fn command(&mut self, command: Command) -> Result<(), Error> {
        trace!("sim: command {command:?}");
        self.history.push(command);
        self.current = Some(command);
        self.incoming.clear();
        self.outgoing.clear();

        if command == Command::ReadScratchpad {
            let mut frame = vec![command.opcode()];
            frame.extend_from_slice(&self.target.to_le_bytes());
            frame.push(self.es.bits());
            frame.extend_from_slice(&self.scratchpad);
            self.outgoing.extend(&frame[1..]);
            self.queue_crc(&frame);
        }
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        if self.current.is_none() {
            return Err(Error::Bus);
        }
        self.incoming.push(byte);
        self.advance();
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        // Released bus reads as ones
        Ok(self.outgoing.pop_front().unwrap_or(0xFF))
    }
}

/// Delay provider that records requested waits instead of sleeping
#[derive(Debug, Default)]
pub struct SimDelay {
    waits: Vec<u32>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested waits in nanoseconds, in order
    pub fn waits(&self) -> &[u32] {
        &self.waits
    }

    pub fn total_ns(&self) -> u64 {
        self.waits.iter().map(|&ns| ns as u64).sum()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits.push(ns);
    }
}
