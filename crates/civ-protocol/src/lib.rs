//! Icom CI-V Protocol Library
//!
//! Parsing and encoding for the Icom CI-V serial protocol as carried
//! over a text transport: each transport message holds one frame of
//! space-joined ASCII hex bytes.
//!
//! ```text
//! FE FE [to] [from] [cmd] [subcmd] [data...] FD
//! ```
//!
//! The crate is split by concern:
//!
//! - [`frame`]: the text frame codec, acknowledgement handling and the
//!   wake preamble used to power a radio on over serial
//! - [`freq`]: the reversed-BCD frequency codec and BCD helpers for
//!   meter readings
//! - [`tone`]: CTCSS tone and DTCS code tables, the tone enablement
//!   mode byte and value wire forms
//!
//! All codecs here are pure: no I/O, no timers, no device state. The
//! stateful session layer lives in the `civ-station` crate.
//!
//! # Example
//!
//! ```rust
//! use civ_protocol::frame::{decode, FrameBody};
//! use civ_protocol::freq::decode_frequency_slice;
//!
//! let frame = decode("FE FE E0 94 03 00 00 25 14 00 FD").unwrap();
//! assert_eq!(frame.from, 0x94);
//! if let FrameBody::Command { number, data, .. } = &frame.body {
//!     assert_eq!(*number, 0x03);
//!     assert_eq!(decode_frequency_slice(data).unwrap(), "14.250.000");
//! }
//! ```

pub mod error;
pub mod frame;
pub mod freq;
pub mod tone;

pub use error::ParseError;
pub use frame::{decode, encode_command, encode_wake_command, Frame, FrameBody};
pub use freq::{decode_frequency, encode_frequency};
pub use tone::{DtcsPolarity, Polarity, ToneCursor, ToneSelection};
