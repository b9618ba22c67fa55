//! Reversed-BCD frequency codec
//!
//! CI-V transmits frequencies as five BCD bytes, least-significant
//! digit pair first. `14.250.000` Hz goes on the wire as
//! `00 00 25 14 00`. The display form used throughout the station is a
//! decimal string grouped 4/3/3 with `.` delimiters and leading zeros
//! stripped from the first group (`"14.250.000"`, `"0.000.000"`).

use crate::error::ParseError;

/// Decimal value of a single BCD byte (`0x25` → 25)
pub fn bcd_value(byte: u8) -> Result<u8, ParseError> {
    let high = byte >> 4;
    let low = byte & 0x0F;
    if high > 9 || low > 9 {
        return Err(ParseError::InvalidBcd(byte));
    }
    Ok(high * 10 + low)
}

/// Two-byte BCD meter reading (`[0x01, 0x28]` → 128)
pub fn meter_value(data: &[u8]) -> Result<u16, ParseError> {
    let hundreds = data.first().copied().map(bcd_value).transpose()?.unwrap_or(0);
    let rest = data.get(1).copied().map(bcd_value).transpose()?.unwrap_or(0);
    Ok(u16::from(hundreds) * 100 + u16::from(rest))
}

/// Decode five reversed-BCD bytes into the delimited display string
pub fn decode_frequency(bytes: [u8; 5]) -> Result<String, ParseError> {
    let mut digits = String::with_capacity(10);
    for byte in bytes.iter().rev() {
        if (byte >> 4) > 9 || (byte & 0x0F) > 9 {
            return Err(ParseError::InvalidBcd(*byte));
        }
        digits.push_str(&format!("{:02X}", byte));
    }

    let front = digits[0..4].trim_start_matches('0');
    let front = if front.is_empty() { "0" } else { front };
    Ok(format!("{}.{}.{}", front, &digits[4..7], &digits[7..10]))
}

/// Encode a display-form frequency into five reversed-BCD bytes
///
/// Delimiters (or any non-digit characters) are stripped before
/// encoding; the digit string must fit in ten digits.
pub fn encode_frequency(display: &str) -> Result<[u8; 5], ParseError> {
    let digits: String = display.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 10 {
        return Err(ParseError::InvalidFrequency(display.to_string()));
    }

    let padded = format!("{:0>10}", digits);
    let digit_at = |i: usize| padded.as_bytes()[i] - b'0';

    let mut bytes = [0u8; 5];
    for (slot, byte) in bytes.iter_mut().enumerate() {
        // Least-significant pair first: slot 0 holds digits 8..10.
        let pos = 8 - slot * 2;
        *byte = (digit_at(pos) << 4) | digit_at(pos + 1);
    }
    Ok(bytes)
}

/// Decode a frequency from a raw frame data slice
///
/// Convenience for dispatch code that has a `&[u8]` of exactly five
/// bytes (e.g. the payload of an `00`/`03` response).
pub fn decode_frequency_slice(data: &[u8]) -> Result<String, ParseError> {
    let bytes: [u8; 5] = data
        .try_into()
        .map_err(|_| ParseError::BadFrequencyLength(data.len()))?;
    decode_frequency(bytes)
}
