use thiserror::Error as DeriveError;

use crate::onewire::ds1961::Phase;

#[derive(DeriveError, Debug)]
pub enum Error {
    #[error("1-Wire bus I/O failed")]
    Bus,

    #[error("CRC mismatch: expected {expected:#06X}, got {actual:#06X}")]
    Crc { expected: u16, actual: u16 },

    #[error("Unexpected frame byte: expected {expected:#04X}, got {actual:#04X}")]
    FrameMarker { expected: u8, actual: u8 },

    #[error("Device rejected operation: expected status {expected:#04X}, got {actual:#04X}")]
    Status { expected: u8, actual: u8 },

    #[error("{phase} failed (#{code}): {source}")]
    Phase {
        phase: Phase,
        code: u8,
        #[source]
        source: Box<Error>,
    },

    #[error("Device MAC does not match the locally computed MAC")]
    AuthenticationFailed,

    #[error("Secret must be exactly 16 non-zero bytes")]
    InvalidSecret,

    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value for {field}")]
    InvalidValue { field: &'static str },

    #[error("Unknown configuration key")]
    UnknownKey,

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),
}

impl Error {
    /// Diagnostic number of the failed phase, if this error came out of a
    /// composed transaction.
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::Phase { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for corrupted exchanges (CRC or fixed-byte mismatch).
    pub fn is_frame_error(&self) -> bool {
        match self {
            Self::Crc { .. } | Self::FrameMarker { .. } => true,
            Self::Phase { source, .. } => source.is_frame_error(),
            _ => false,
        }
    }

    /// True when the device answered with a status other than success.
    pub fn is_protocol_error(&self) -> bool {
        match self {
            Self::Status { .. } => true,
            Self::Phase { source, .. } => source.is_protocol_error(),
            _ => false,
        }
    }
}
