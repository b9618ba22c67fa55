//! Error types for the station core

use thiserror::Error;

/// Errors that can occur in the station core
#[derive(Debug, Error)]
pub enum StationError {
    /// Band index outside the profile's stacking table
    #[error("band index {0} out of range")]
    BandOutOfRange(usize),

    /// Mode not offered by the radio profile
    #[error("mode {0:?} not supported by this radio")]
    UnsupportedMode(String),

    /// Protocol parse failure
    #[error("protocol error: {0}")]
    Protocol(#[from] civ_protocol::ParseError),
}
