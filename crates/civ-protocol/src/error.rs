//! Error types for CI-V parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing CI-V data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input does not match the `FE FE ... FD` envelope
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A token is not a valid hex byte
    #[error("invalid byte token: {0:?}")]
    InvalidByteToken(String),

    /// A nibble outside 0-9 in a BCD-encoded byte
    #[error("invalid BCD digit: 0x{0:02X}")]
    InvalidBcd(u8),

    /// Frequency string cannot be encoded
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Tone/DTCS mode byte outside the nine known combinations
    #[error("unrecognized tone configuration: 0x{0:02X}")]
    UnrecognizedToneConfiguration(u8),

    /// Frequency payload is not the expected five BCD bytes
    #[error("bad frequency payload length: {0}")]
    BadFrequencyLength(usize),
}
