//! CI-V text frame codec
//!
//! The wire carries one frame per transport message as ASCII hex bytes
//! joined by single spaces:
//!
//! ```text
//! FE FE [to] [from] [cmd] [subcmd] [data...] FD
//! FE FE [to] [from] [FB|FA] FD
//! ```
//!
//! - `FE FE`: preamble (two tokens)
//! - `to`: destination address (radio address or the controller's)
//! - `from`: source address
//! - `cmd`: command number; `subcmd` follows only for commands that
//!   carry one (see [`expects_subcommand`])
//! - `FB`/`FA`: positive/negative acknowledgement, no command number
//! - `FD`: terminator
//!
//! Addresses and data are case-insensitive on input and normalized to
//! uppercase on encode.

use crate::error::ParseError;

/// Preamble byte
pub const PREAMBLE: u8 = 0xFE;
/// Terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// Broadcast destination address
pub const BROADCAST_ADDR: u8 = 0x00;
/// Positive acknowledgement code
pub const ACK_OK: u8 = 0xFB;
/// Negative acknowledgement code
pub const ACK_NG: u8 = 0xFA;

/// Command payload that powers the transceiver on (needs a wake preamble)
pub const POWER_ON_COMMAND: &str = "18 01";
/// Command payload that powers the transceiver off
pub const POWER_OFF_COMMAND: &str = "18 00";

/// A decoded CI-V frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination address
    pub to: u8,
    /// Source address
    pub from: u8,
    /// Frame body
    pub body: FrameBody,
}

/// Body of a decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// Six-token acknowledgement (`FB` ok / `FA` no-good)
    Ack {
        /// Raw acknowledgement code
        code: u8,
    },
    /// Command or command response
    Command {
        /// Command number
        number: u8,
        /// Sub-command number, present only for commands in the
        /// sub-command set
        sub: Option<u8>,
        /// Data bytes up to (excluding) the terminator
        data: Vec<u8>,
    },
}

impl FrameBody {
    /// True for a positive (`FB`) acknowledgement
    pub fn is_positive_ack(&self) -> bool {
        matches!(self, FrameBody::Ack { code } if *code == ACK_OK)
    }

    /// True for a negative (`FA`) acknowledgement
    pub fn is_negative_ack(&self) -> bool {
        matches!(self, FrameBody::Ack { code } if *code == ACK_NG)
    }
}

/// Commands whose responses carry a sub-command byte after the command
/// number
pub fn expects_subcommand(command: u8) -> bool {
    matches!(
        command,
        0x07 | 0x0E
            | 0x13
            | 0x14
            | 0x15
            | 0x16
            | 0x18
            | 0x19
            | 0x1A
            | 0x1B
            | 0x1C
            | 0x1E
            | 0x21
            | 0x27
            | 0x28
    )
}

/// Extra `FE` preamble bytes required to wake a powered-off radio,
/// keyed by serial baud rate
pub fn wake_repeats(baud: u32) -> usize {
    match baud {
        115_200 => 150,
        57_600 => 75,
        38_400 => 50,
        19_200 => 25,
        9_600 => 13,
        4_800 => 7,
        _ => 0,
    }
}

/// Encode a command payload into a full text frame
///
/// `command` is the space-joined hex payload (e.g. `"1A 01 05 01"`).
pub fn encode_command(to: u8, from: u8, command: &str) -> String {
    format!("FE FE {:02X} {:02X} {} FD", to, from, command)
}

/// Encode a command with a baud-dependent wake preamble prepended
///
/// Used for [`POWER_ON_COMMAND`]: a powered-off radio needs a run of
/// `FE` bytes on the line before it latches the frame.
pub fn encode_wake_command(to: u8, from: u8, command: &str, baud: u32) -> String {
    let mut preamble = String::from("FE FE");
    for _ in 0..wake_repeats(baud) {
        preamble.push_str(" FE");
    }
    format!("{} {:02X} {:02X} {} FD", preamble, to, from, command)
}

/// Format raw bytes as a space-joined uppercase hex payload
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_byte(token: &str) -> Result<u8, ParseError> {
    u8::from_str_radix(token, 16).map_err(|_| ParseError::InvalidByteToken(token.to_string()))
}

/// Decode a text frame
///
/// Input is uppercased and trimmed before tokenizing. Fails with
/// [`ParseError::MalformedFrame`] unless the message has at least six
/// tokens and opens with `FE FE`.
pub fn decode(text: &str) -> Result<Frame, ParseError> {
    let message = text.trim().to_uppercase();
    let tokens: Vec<&str> = message.split_whitespace().collect();

    if tokens.len() < 6 || tokens[0] != "FE" || tokens[1] != "FE" {
        return Err(ParseError::MalformedFrame(message));
    }

    let to = parse_byte(tokens[2])?;
    let from = parse_byte(tokens[3])?;

    let body = if tokens.len() == 6 {
        FrameBody::Ack {
            code: parse_byte(tokens[4])?,
        }
    } else {
        let number = parse_byte(tokens[4])?;

        let mut data_start = 5;
        let sub = if expects_subcommand(number) {
            data_start = 6;
            Some(parse_byte(tokens[5])?)
        } else {
            None
        };

        // Everything up to the trailing terminator token is data.
        let data = tokens[data_start..tokens.len() - 1]
            .iter()
            .map(|t| parse_byte(t))
            .collect::<Result<Vec<u8>, _>>()?;

        FrameBody::Command { number, sub, data }
    };

    Ok(Frame { to, from, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ack() {
        let frame = decode("FE FE E0 94 FB FD").unwrap();
        assert_eq!(frame.to, 0xE0);
        assert_eq!(frame.from, 0x94);
        assert!(frame.body.is_positive_ack());

        let frame = decode("FE FE E0 94 FA FD").unwrap();
        assert!(frame.body.is_negative_ack());
    }

    #[test]
    fn test_decode_without_subcommand() {
        // Command 03 is not in the sub-command set: data starts right
        // after the command number.
        let frame = decode("FE FE 94 E0 03 00 00 00 00 FD").unwrap();
        match frame.body {
            FrameBody::Command { number, sub, data } => {
                assert_eq!(number, 0x03);
                assert_eq!(sub, None);
                assert_eq!(data, vec![0x00, 0x00, 0x00, 0x00]);
            }
            _ => panic!("expected command body"),
        }
    }

    #[test]
    fn test_decode_with_subcommand() {
        // Command 14 carries a sub-command byte.
        let frame = decode("FE FE 94 E0 14 01 FF FD").unwrap();
        match frame.body {
            FrameBody::Command { number, sub, data } => {
                assert_eq!(number, 0x14);
                assert_eq!(sub, Some(0x01));
                assert_eq!(data, vec![0xFF]);
            }
            _ => panic!("expected command body"),
        }
    }

    #[test]
    fn test_decode_normalizes_case_and_whitespace() {
        let frame = decode("  fe fe e0 94 fb fd ").unwrap();
        assert_eq!(frame.from, 0x94);
        assert!(frame.body.is_positive_ack());
    }

    #[test]
    fn test_decode_rejects_short_and_unframed() {
        assert!(matches!(
            decode("FE FE E0 94 FD"),
            Err(ParseError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode("00 FE E0 94 FB FD"),
            Err(ParseError::MalformedFrame(_))
        ));
        assert!(matches!(decode(""), Err(ParseError::MalformedFrame(_))));
        assert!(matches!(
            decode("hello world"),
            Err(ParseError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_subcommand_membership() {
        for cmd in [
            0x07, 0x0E, 0x13, 0x14, 0x15, 0x16, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1E, 0x21, 0x27,
            0x28,
        ] {
            assert!(expects_subcommand(cmd), "0x{:02X} should expect sub", cmd);
        }
        for cmd in [0x00, 0x03, 0x04, 0x0F, 0x25, 0x26] {
            assert!(!expects_subcommand(cmd), "0x{:02X} has no sub", cmd);
        }
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(
            encode_command(0x94, 0xE0, "1A 01 05 01"),
            "FE FE 94 E0 1A 01 05 01 FD"
        );
    }

    #[test]
    fn test_encode_wake_command_preamble_length() {
        let frame = encode_wake_command(0x94, 0xE0, POWER_ON_COMMAND, 115_200);
        let fe_run = frame
            .split_whitespace()
            .take_while(|t| *t == "FE")
            .count();
        assert_eq!(fe_run, 152); // two framing FEs plus 150 wake bytes

        // Unknown baud rates get no extra preamble.
        let frame = encode_wake_command(0x94, 0xE0, POWER_ON_COMMAND, 1_200);
        assert_eq!(frame, "FE FE 94 E0 18 01 FD");
    }

    #[test]
    fn test_wake_repeats_table() {
        assert_eq!(wake_repeats(115_200), 150);
        assert_eq!(wake_repeats(57_600), 75);
        assert_eq!(wake_repeats(38_400), 50);
        assert_eq!(wake_repeats(19_200), 25);
        assert_eq!(wake_repeats(9_600), 13);
        assert_eq!(wake_repeats(4_800), 7);
        assert_eq!(wake_repeats(300), 0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(&[0x00, 0x25, 0x14]), "00 25 14");
        assert_eq!(format_bytes(&[]), "");
    }
}
