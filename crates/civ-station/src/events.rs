//! Unified event stream for the station core
//!
//! Session state changes and router lifecycle changes are emitted
//! through a single event channel, so one observer sees everything in
//! arrival order.

use civ_protocol::tone::{DtcsPolarity, ToneSelection};

use crate::vfo::{Duplex, Filter, Mode};

/// Which meter a reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterKind {
    /// S-meter (signal strength)
    SMeter,
    /// Power output
    PoMeter,
    /// SWR
    SwrMeter,
    /// ALC
    Alc,
    /// Speech compression
    Comp,
}

/// Which tone table a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneKind {
    /// Repeater tone (transmit CTCSS)
    Tone,
    /// Tone squelch (receive CTCSS)
    Tsql,
    /// DTCS code
    Dtcs,
}

/// Operate mode of the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperateMode {
    /// VFO operation
    Vfo,
    /// Memory channel operation
    Memory,
}

/// State change reported by a radio session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A VFO's frequency changed
    Frequency {
        /// VFO slot (0 or 1)
        slot: usize,
        /// New frequency in display form
        frequency: String,
    },

    /// A VFO's operating mode changed
    Mode {
        /// VFO slot
        slot: usize,
        /// New mode
        mode: Mode,
    },

    /// A VFO's IF filter changed
    Filter {
        /// VFO slot
        slot: usize,
        /// New filter
        filter: Filter,
    },

    /// A VFO's data mode flag changed
    DataMode {
        /// VFO slot
        slot: usize,
        /// Data mode active
        on: bool,
    },

    /// Split operation toggled on the active VFO
    Split {
        /// Split active
        on: bool,
    },

    /// Repeater duplex direction changed on the active VFO
    Duplex {
        /// New duplex direction
        duplex: Duplex,
    },

    /// Squelch state changed on the active VFO
    Squelch {
        /// Squelch open
        open: bool,
    },

    /// A meter reading arrived for the active VFO
    Meter {
        /// Which meter
        kind: MeterKind,
        /// Raw device code (0..=255)
        value: u16,
    },

    /// AF gain level (radio-wide)
    AfLevel {
        /// Raw device code (0..=255)
        value: u16,
    },

    /// Supply voltage reading (radio-wide)
    Voltage {
        /// Raw device code (0..=255)
        value: u16,
    },

    /// Drain current reading (radio-wide)
    Amperage {
        /// Current in amperes
        amps: f32,
    },

    /// Tone/DTCS enablement changed on the active VFO
    ToneEnablement {
        /// New enablement quadruple
        selection: ToneSelection,
    },

    /// A tone or code value changed on the active VFO
    ToneValue {
        /// Which table
        kind: ToneKind,
        /// Index into the table
        index: usize,
        /// Display value (`"88.5"`, `"023"`, `"--"`)
        value: String,
    },

    /// DTCS polarity changed on the active VFO
    DtcsPolarity {
        /// New polarity pair
        polarity: DtcsPolarity,
    },

    /// The radio reported a tone mode byte outside the known set
    UnrecognizedTone {
        /// The offending mode byte
        byte: u8,
    },

    /// Transmit state changed
    Transmit {
        /// Transmitting
        on: bool,
    },

    /// Power state settled to on or off
    Power {
        /// Powered on
        on: bool,
    },

    /// Scope function toggled
    ScopeOn {
        /// Scope enabled
        on: bool,
    },

    /// Scope waveform output toggled
    ScopeSending {
        /// Waveform output enabled
        on: bool,
    },

    /// A full scope sweep was reassembled
    ScopeData {
        /// All scope cells, left to right
        cells: Vec<u8>,
    },

    /// A band stacking register was reported
    BandStackUpdated {
        /// Band index in the profile's table
        band: usize,
        /// Register index (0..3)
        register: usize,
        /// Frequency in display form
        frequency: String,
    },

    /// Operate mode changed
    OperateModeChanged {
        /// New operate mode
        mode: OperateMode,
    },

    /// Memory channel changed
    MemoryChannel {
        /// Selected channel
        channel: u16,
    },
}

/// Router- and transport-level event
#[derive(Debug, Clone, PartialEq)]
pub enum StationEvent {
    /// The transport link opened
    LinkUp,

    /// The transport link closed
    LinkDown,

    /// A reconnect attempt is scheduled
    Reconnecting {
        /// Delay before the attempt (milliseconds)
        delay_ms: u64,
    },

    /// Too many malformed frames; the connection is being forced closed
    MalformedOverflow {
        /// Frames seen before tripping
        count: u32,
    },

    /// An event from a registered radio session
    Session {
        /// CI-V address of the radio
        address: u8,
        /// The session event
        event: SessionEvent,
    },
}

impl SessionEvent {
    /// True for events that carry live meter/level telemetry
    pub fn is_telemetry(&self) -> bool {
        matches!(
            self,
            SessionEvent::Meter { .. }
                | SessionEvent::AfLevel { .. }
                | SessionEvent::Voltage { .. }
                | SessionEvent::Amperage { .. }
                | SessionEvent::ScopeData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_classification() {
        assert!(SessionEvent::Meter {
            kind: MeterKind::SMeter,
            value: 120
        }
        .is_telemetry());
        assert!(!SessionEvent::Transmit { on: true }.is_telemetry());
    }
}
