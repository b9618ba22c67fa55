//! CTCSS tone and DTCS code handling
//!
//! Tone and squelch-code values are carried on the wire as three BCD
//! bytes holding a six-digit, zero-padded decimal value (`88.5` Hz →
//! `00 08 85`). DTCS replaces the two leading digits with a polarity
//! prefix (`00`/`01`/`10`/`11` for normal/reverse per side) ahead of
//! the four significant digits.
//!
//! A single mode byte (command `16 5D`) selects one of nine legal
//! tone/DTCS enablement combinations; anything else is a protocol
//! fault and is reported, never guessed at.

use crate::error::ParseError;

/// CTCSS tone table (entry 0 is the "no tone" placeholder)
pub const CTCSS_TONES: [&str; 51] = [
    "--", "67.0", "69.3", "71.9", "74.4", "77.0", "79.7", "82.5", "85.4", "88.5", "91.5", "94.8",
    "97.4", "100.0", "103.5", "107.2", "110.9", "114.8", "118.8", "123.0", "127.3", "131.8",
    "136.5", "141.3", "146.2", "151.4", "156.7", "159.8", "162.2", "165.5", "167.9", "171.3",
    "173.8", "177.3", "179.9", "183.5", "186.2", "189.9", "192.8", "196.6", "199.5", "203.5",
    "206.5", "210.7", "218.1", "225.7", "229.1", "233.6", "241.8", "250.3", "254.1",
];

/// DTCS code table (entry 0 is the "no code" placeholder)
pub const DTCS_CODES: [&str; 105] = [
    "--", "023", "025", "026", "031", "032", "036", "043", "047", "051", "053", "054", "065",
    "071", "072", "073", "074", "114", "115", "116", "122", "125", "131", "132", "134", "143",
    "145", "152", "155", "156", "162", "165", "172", "174", "205", "212", "223", "225", "226",
    "243", "244", "245", "246", "251", "252", "255", "261", "263", "265", "266", "271", "274",
    "306", "311", "315", "325", "331", "332", "343", "346", "351", "356", "364", "365", "371",
    "411", "412", "413", "423", "431", "432", "445", "446", "452", "454", "455", "462", "464",
    "465", "466", "503", "506", "516", "523", "526", "532", "546", "565", "606", "612", "624",
    "627", "631", "632", "654", "662", "664", "703", "712", "723", "731", "732", "734", "743",
    "754",
];

/// DTCS polarity for one side of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Normal polarity
    #[default]
    Normal,
    /// Reverse polarity
    Reverse,
}

/// Transmit/receive DTCS polarity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DtcsPolarity {
    /// Transmit-side polarity
    pub tx: Polarity,
    /// Receive-side polarity
    pub rx: Polarity,
}

impl DtcsPolarity {
    /// Two-digit wire prefix placed ahead of the code digits
    pub fn prefix(&self) -> &'static str {
        match (self.tx, self.rx) {
            (Polarity::Normal, Polarity::Normal) => "00",
            (Polarity::Normal, Polarity::Reverse) => "01",
            (Polarity::Reverse, Polarity::Normal) => "10",
            (Polarity::Reverse, Polarity::Reverse) => "11",
        }
    }

    /// Decode the polarity byte of a DTCS report (`1B 02` data byte 0)
    pub fn from_byte(byte: u8) -> Option<Self> {
        let (tx, rx) = match byte {
            0x00 => (Polarity::Normal, Polarity::Normal),
            0x01 => (Polarity::Normal, Polarity::Reverse),
            0x10 => (Polarity::Reverse, Polarity::Normal),
            0x11 => (Polarity::Reverse, Polarity::Reverse),
            _ => return None,
        };
        Some(Self { tx, rx })
    }
}

/// Tone/DTCS enablement quadruple
///
/// The device recognizes exactly nine combinations; the rest of the
/// 16-value space is protocol-invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToneSelection {
    /// Repeater tone on transmit
    pub tx_tone: bool,
    /// Tone squelch on receive
    pub rx_tone: bool,
    /// DTCS on transmit
    pub tx_dtcs: bool,
    /// DTCS on receive
    pub rx_dtcs: bool,
}

impl ToneSelection {
    /// Decode a `16 5D` mode byte
    pub fn from_mode_byte(byte: u8) -> Result<Self, ParseError> {
        let (tx_tone, rx_tone, tx_dtcs, rx_dtcs) = match byte {
            0x00 => (false, false, false, false),
            0x01 => (true, false, false, false),
            0x02 => (false, true, false, false),
            0x03 => (false, false, true, true),
            0x06 => (false, false, true, false),
            0x07 => (true, false, false, true),
            0x08 => (false, true, true, false),
            0x09 => (true, true, false, false),
            other => return Err(ParseError::UnrecognizedToneConfiguration(other)),
        };
        Ok(Self {
            tx_tone,
            rx_tone,
            tx_dtcs,
            rx_dtcs,
        })
    }

    /// Encode back to the mode byte, if this quadruple is one the
    /// device recognizes
    pub fn mode_byte(&self) -> Option<u8> {
        match (self.tx_tone, self.rx_tone, self.tx_dtcs, self.rx_dtcs) {
            (false, false, false, false) => Some(0x00),
            (true, false, false, false) => Some(0x01),
            (false, true, false, false) => Some(0x02),
            (false, false, true, true) => Some(0x03),
            (false, false, true, false) => Some(0x06),
            (true, false, false, true) => Some(0x07),
            (false, true, true, false) => Some(0x08),
            (true, true, false, false) => Some(0x09),
            _ => None,
        }
    }
}

/// Six-digit zero-padded numeric form of a tone or code value
///
/// Strips delimiters and the placeholder dash, so `"88.5"` → `"000885"`
/// and `"--"` → `"000000"`.
pub fn value_hex(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    let padded = format!("{:0>6}", digits);
    padded[padded.len() - 6..].to_string()
}

/// Wire bytes of a CTCSS tone value
pub fn tone_wire_bytes(value: &str) -> [u8; 3] {
    digits_to_bytes(&value_hex(value))
}

/// Wire bytes of a DTCS code with its polarity prefix
pub fn dtcs_wire_bytes(value: &str, polarity: DtcsPolarity) -> [u8; 3] {
    let hex = value_hex(value);
    digits_to_bytes(&format!("{}{}", polarity.prefix(), &hex[2..6]))
}

fn digits_to_bytes(digits: &str) -> [u8; 3] {
    let mut bytes = [0u8; 3];
    for (i, byte) in bytes.iter_mut().enumerate() {
        // Pairs are decimal digits, so radix-16 parse reproduces the
        // BCD byte directly.
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).unwrap_or(0);
    }
    bytes
}

/// Cyclic cursor over one of the fixed value tables
#[derive(Debug, Clone)]
pub struct ToneCursor {
    table: &'static [&'static str],
    index: usize,
}

impl ToneCursor {
    /// Cursor over the CTCSS tone table
    pub fn ctcss() -> Self {
        Self {
            table: &CTCSS_TONES,
            index: 0,
        }
    }

    /// Cursor over the DTCS code table
    pub fn dtcs() -> Self {
        Self {
            table: &DTCS_CODES,
            index: 0,
        }
    }

    /// Current table index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Currently selected value
    pub fn value(&self) -> &'static str {
        self.table[self.index]
    }

    /// Value one step forward, wrapping at the table end
    pub fn next_value(&self) -> &'static str {
        self.table[(self.index + 1) % self.table.len()]
    }

    /// Value one step back, wrapping at the table start
    pub fn previous_value(&self) -> &'static str {
        self.table[(self.index + self.table.len() - 1) % self.table.len()]
    }

    /// Move one step in either direction
    pub fn step(&mut self, forward: bool) {
        self.index = if forward {
            (self.index + 1) % self.table.len()
        } else {
            (self.index + self.table.len() - 1) % self.table.len()
        };
    }

    /// Select the entry matching `raw`, by literal value or by
    /// normalized six-digit form
    ///
    /// Returns false (cursor unchanged) when nothing matches.
    pub fn set_value(&mut self, raw: &str) -> bool {
        let raw_hex = value_hex(raw);
        for (i, entry) in self.table.iter().enumerate() {
            if raw == *entry || raw_hex == value_hex(entry) {
                self.index = i;
                return true;
            }
        }
        tracing::warn!("no table entry for tone/code value {:?}", raw);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        assert_eq!(CTCSS_TONES.len(), 51);
        assert_eq!(DTCS_CODES.len(), 105);
    }

    #[test]
    fn test_mode_byte_roundtrip() {
        for byte in [0x00, 0x01, 0x02, 0x03, 0x06, 0x07, 0x08, 0x09] {
            let sel = ToneSelection::from_mode_byte(byte).unwrap();
            assert_eq!(sel.mode_byte(), Some(byte));
        }
    }

    #[test]
    fn test_mode_byte_09() {
        let sel = ToneSelection::from_mode_byte(0x09).unwrap();
        assert!(sel.tx_tone);
        assert!(sel.rx_tone);
        assert!(!sel.tx_dtcs);
        assert!(!sel.rx_dtcs);
    }

    #[test]
    fn test_unrecognized_mode_byte() {
        assert!(matches!(
            ToneSelection::from_mode_byte(0x0A),
            Err(ParseError::UnrecognizedToneConfiguration(0x0A))
        ));
        assert!(ToneSelection::from_mode_byte(0x04).is_err());
        assert!(ToneSelection::from_mode_byte(0x05).is_err());
    }

    #[test]
    fn test_rx_dtcs_only_has_no_mode_byte() {
        let sel = ToneSelection {
            rx_dtcs: true,
            ..Default::default()
        };
        assert_eq!(sel.mode_byte(), None);
    }

    #[test]
    fn test_value_hex() {
        assert_eq!(value_hex("88.5"), "000885");
        assert_eq!(value_hex("254.1"), "002541");
        assert_eq!(value_hex("023"), "000023");
        assert_eq!(value_hex("--"), "000000");
    }

    #[test]
    fn test_tone_wire_bytes() {
        assert_eq!(tone_wire_bytes("88.5"), [0x00, 0x08, 0x85]);
        assert_eq!(tone_wire_bytes("254.1"), [0x00, 0x25, 0x41]);
    }

    #[test]
    fn test_dtcs_wire_bytes_carry_polarity() {
        let both_reverse = DtcsPolarity {
            tx: Polarity::Reverse,
            rx: Polarity::Reverse,
        };
        assert_eq!(dtcs_wire_bytes("023", both_reverse), [0x11, 0x00, 0x23]);
        assert_eq!(
            dtcs_wire_bytes("754", DtcsPolarity::default()),
            [0x00, 0x07, 0x54]
        );
    }

    #[test]
    fn test_polarity_from_byte() {
        assert_eq!(DtcsPolarity::from_byte(0x00), Some(DtcsPolarity::default()));
        let pol = DtcsPolarity::from_byte(0x10).unwrap();
        assert_eq!(pol.tx, Polarity::Reverse);
        assert_eq!(pol.rx, Polarity::Normal);
        assert_eq!(DtcsPolarity::from_byte(0x02), None);
    }

    #[test]
    fn test_cursor_navigation_wraps() {
        let mut cursor = ToneCursor::ctcss();
        assert_eq!(cursor.value(), "--");
        assert_eq!(cursor.previous_value(), "254.1");
        cursor.step(false);
        assert_eq!(cursor.value(), "254.1");
        cursor.step(true);
        assert_eq!(cursor.value(), "--");
    }

    #[test]
    fn test_cursor_set_value() {
        let mut cursor = ToneCursor::ctcss();
        assert!(cursor.set_value("100.0"));
        assert_eq!(cursor.index(), 13);

        // Normalized six-digit match, as received off the wire.
        assert!(cursor.set_value("000885"));
        assert_eq!(cursor.value(), "88.5");

        assert!(!cursor.set_value("999.9"));
        assert_eq!(cursor.value(), "88.5");
    }

    #[test]
    fn test_dtcs_cursor_matches_wire_digits() {
        let mut cursor = ToneCursor::dtcs();
        // Significant digits of a report, polarity prefix already
        // masked off by the caller.
        assert!(cursor.set_value("0023"));
        assert_eq!(cursor.value(), "023");
    }
}
