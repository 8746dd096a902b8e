//! Protocol module - hardware-independent DS1961S command framing
//!
//! Opcodes, memory map, timing and the CRC-checked exchange buffer,
//! without depending on any bus adapter.

pub mod commands;
pub mod crc;
pub mod transaction;
