//! Per-VFO operating state
//!
//! A [`VfoState`] mirrors everything the radio reports about one VFO:
//! frequency, mode/filter, split and duplex, tone configuration, PTT,
//! squelch, meter readings and the spectrum scope buffer. Two of these
//! live inside a session and are mutated in place as reports arrive.

use civ_protocol::tone::{DtcsPolarity, ToneCursor, ToneSelection};
use serde::{Deserialize, Serialize};

/// Number of cells in a full spectrum scope sweep
pub const SCOPE_CELLS: usize = 500;

/// Operating mode, as carried in the CI-V mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Lower sideband
    Lsb,
    /// Upper sideband
    Usb,
    /// Amplitude modulation
    Am,
    /// CW
    Cw,
    /// RTTY
    Rtty,
    /// Frequency modulation
    Fm,
    /// CW reverse
    CwR,
    /// RTTY reverse
    RttyR,
    /// D-STAR digital voice
    Dv,
    /// D-STAR digital data
    Dd,
}

impl Mode {
    /// Decode the CI-V mode byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Mode::Lsb),
            0x01 => Some(Mode::Usb),
            0x02 => Some(Mode::Am),
            0x03 => Some(Mode::Cw),
            0x04 => Some(Mode::Rtty),
            0x05 => Some(Mode::Fm),
            0x07 => Some(Mode::CwR),
            0x08 => Some(Mode::RttyR),
            0x17 => Some(Mode::Dv),
            0x22 => Some(Mode::Dd),
            _ => None,
        }
    }

    /// The CI-V mode byte
    pub fn byte(&self) -> u8 {
        match self {
            Mode::Lsb => 0x00,
            Mode::Usb => 0x01,
            Mode::Am => 0x02,
            Mode::Cw => 0x03,
            Mode::Rtty => 0x04,
            Mode::Fm => 0x05,
            Mode::CwR => 0x07,
            Mode::RttyR => 0x08,
            Mode::Dv => 0x17,
            Mode::Dd => 0x22,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Lsb => "LSB",
            Mode::Usb => "USB",
            Mode::Am => "AM",
            Mode::Cw => "CW",
            Mode::Rtty => "RTTY",
            Mode::Fm => "FM",
            Mode::CwR => "CW-R",
            Mode::RttyR => "RTTY-R",
            Mode::Dv => "DV",
            Mode::Dd => "DD",
        }
    }
}

/// IF filter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Filter 1 (widest)
    Fil1,
    /// Filter 2
    Fil2,
    /// Filter 3 (narrowest)
    Fil3,
}

impl Filter {
    /// Decode the CI-V filter byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Filter::Fil1),
            0x02 => Some(Filter::Fil2),
            0x03 => Some(Filter::Fil3),
            _ => None,
        }
    }

    /// The CI-V filter byte
    pub fn byte(&self) -> u8 {
        match self {
            Filter::Fil1 => 0x01,
            Filter::Fil2 => 0x02,
            Filter::Fil3 => 0x03,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Fil1 => "FIL1",
            Filter::Fil2 => "FIL2",
            Filter::Fil3 => "FIL3",
        }
    }
}

/// Repeater duplex direction
///
/// One enum rather than independent flags, so "both directions at
/// once" cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Duplex {
    /// Simplex operation
    #[default]
    Simplex,
    /// Negative offset (DUP-)
    Minus,
    /// Positive offset (DUP+)
    Plus,
}

impl Duplex {
    /// The `0F` sub-value that selects this duplex setting
    pub fn select_byte(&self) -> u8 {
        match self {
            Duplex::Simplex => 0x10,
            Duplex::Minus => 0x11,
            Duplex::Plus => 0x12,
        }
    }
}

/// Meter readings, kept as raw device codes (0..=255)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meters {
    /// S-meter
    pub s: u16,
    /// Power output meter
    pub po: u16,
    /// SWR meter
    pub swr: u16,
    /// ALC meter
    pub alc: u16,
    /// Compression meter
    pub comp: u16,
}

/// Everything the radio reports about one VFO
#[derive(Debug, Clone)]
pub struct VfoState {
    /// Frequency in delimited display form (`"14.250.000"`)
    pub frequency: String,
    /// Operating mode
    pub mode: Mode,
    /// IF filter
    pub filter: Filter,
    /// Data mode active
    pub data_mode: bool,
    /// Split operation active
    pub split: bool,
    /// Repeater duplex direction
    pub duplex: Duplex,
    /// Tone/DTCS enablement
    pub tone: ToneSelection,
    /// Repeater tone selection
    pub tone_cursor: ToneCursor,
    /// Tone squelch selection
    pub tsql_cursor: ToneCursor,
    /// DTCS code selection
    pub dtcs_cursor: ToneCursor,
    /// DTCS polarity pair
    pub dtcs_polarity: DtcsPolarity,
    /// Transmitting
    pub transmitting: bool,
    /// Squelch open
    pub squelch_open: bool,
    /// Meter readings
    pub meters: Meters,
    /// Spectrum scope cells, reassembled from segmented reports
    pub scope: Vec<u8>,
    /// Scope function enabled
    pub scope_on: bool,
    /// Scope waveform output enabled
    pub scope_sending: bool,
}

impl Default for VfoState {
    fn default() -> Self {
        Self {
            frequency: "0.000.000".to_string(),
            mode: Mode::Usb,
            filter: Filter::Fil1,
            data_mode: false,
            split: false,
            duplex: Duplex::Simplex,
            tone: ToneSelection::default(),
            tone_cursor: ToneCursor::ctcss(),
            tsql_cursor: ToneCursor::ctcss(),
            dtcs_cursor: ToneCursor::dtcs(),
            dtcs_polarity: DtcsPolarity::default(),
            transmitting: false,
            squelch_open: false,
            meters: Meters::default(),
            scope: vec![0; SCOPE_CELLS],
            scope_on: false,
            scope_sending: false,
        }
    }
}
