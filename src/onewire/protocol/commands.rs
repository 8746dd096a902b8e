//! Command, memory map and timing definitions for the DS1961S SHA iButton

/// Device function commands (sent after the ROM-level selection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Load 8 bytes plus target address into the scratchpad
    WriteScratchpad = 0x0F,
    /// Derive a new secret from the current one (not used by the driver)
    ComputeNextSecret = 0x33,
    /// Commit the scratchpad to EEPROM, authorized by a host MAC
    CopyScratchpad = 0x55,
    /// Commit the scratchpad without a MAC (secret loading)
    LoadFirstSecret = 0x5A,
    /// Reload the scratchpad with data already in memory
    RefreshScratchpad = 0xA3,
    /// Read a page followed by a device computed MAC
    ReadAuthPage = 0xA5,
    /// Read back target address, E/S byte and scratchpad data
    ReadScratchpad = 0xAA,
    /// Plain memory read, no CRC
    ReadMemory = 0xF0,
}

impl Command {
    /// Get the 8-bit opcode
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

/// Memory map (addresses are 8-byte aligned)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MemoryPage {
    Data0 = 0x00,
    Data1 = 0x20,
    Data2 = 0x40,
    Data3 = 0x60,
    /// Secret register, write-only
    Secret = 0x80,
    /// Registration number / identity page
    Identity = 0x90,
}

impl MemoryPage {
    /// Get the 16-bit start address
    pub fn address(self) -> u16 {
        self as u16
    }

    /// Size of a data page in bytes
    pub const fn data_page_size() -> usize {
        32
    }

    /// Data page containing `addr`, if any
    pub fn data_page_of(addr: u16) -> Option<Self> {
        match addr {
            0x00..=0x1F => Some(Self::Data0),
            0x20..=0x3F => Some(Self::Data1),
            0x40..=0x5F => Some(Self::Data2),
            0x60..=0x7F => Some(Self::Data3),
            _ => None,
        }
    }
}

/// Hardware-imposed waits. Not tunable.
pub mod timing {
    /// Bus stays powered while the device computes a MAC (tCSHA)
    pub const SHA_COMPUTE_NS: u32 = 1_500_000;

    /// EEPROM / secret programming time (tPROG)
    pub const PROGRAM_NS: u32 = 10_000_000;
}

/// Status bytes observed on the wire
pub mod status {
    /// Final byte after a successful commit or authenticated read
    pub const SUCCESS: u8 = 0xAA;

    /// Fixed byte following the 32 data bytes of an authenticated read
    pub const PAGE_END_MARKER: u8 = 0xFF;
}

/// E/S (ending offset / data status) byte as returned by Read Scratchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsFlags(u8);

bitflags::bitflags! {
    impl EsFlags: u8 {
        const E0 = 1 << 0;
        const E1 = 1 << 1;
        const E2 = 1 << 2;
        /// Partial byte flag
        const PF = 1 << 5;
        /// Authorization accepted (set after a successful copy)
        const AA = 1 << 7;

        const _ = !0;
    }
}

impl EsFlags {
    /// Ending offset within the 8-byte scratchpad
    pub fn ending_offset(&self) -> u8 {
        self.bits() & 0b111
    }

    /// Whole scratchpad was written with no partial byte
    pub fn is_complete(&self) -> bool {
        self.ending_offset() == 7 && !self.contains(Self::PF)
    }
}
