//! Payload checksum (tag 63).
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, initial register 0xFFFF, no
//! reflection, no final XOR. The digest covers the whole payload up to and
//! including the checksum's own tag and length (`6304`).

use crate::error::{KhqrError, Result};
use crate::khqr::tags::{CRC, CRC_LENGTH};

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Raw CRC-16/CCITT-FALSE over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = INITIAL;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Render a checksum the way the payload carries it: 4 uppercase hex digits.
pub fn to_hex(crc: u16) -> String {
    format!("{crc:04X}")
}

/// Append `6304` and the checksum to a payload body.
pub fn seal(body: &str) -> String {
    let mut payload = String::with_capacity(body.len() + 8);
    payload.push_str(body);
    payload.push_str(CRC);
    payload.push_str(CRC_LENGTH);
    let crc = crc16(payload.as_bytes());
    payload.push_str(&to_hex(crc));
    payload
}

/// Recompute the checksum of a complete payload and compare it with the
/// trailing four characters.
pub fn verify(payload: &str) -> Result<()> {
    let malformed = || KhqrError::Checksum {
        expected: "6304XXXX suffix".into(),
        actual: payload.chars().rev().take(8).collect::<Vec<_>>().into_iter().rev().collect(),
    };

    if payload.len() < 8 || !payload.is_char_boundary(payload.len() - 4) {
        return Err(malformed());
    }
    let (covered, carried) = payload.split_at(payload.len() - 4);
    if !covered.ends_with(&format!("{CRC}{CRC_LENGTH}")) {
        return Err(malformed());
    }

    let expected = to_hex(crc16(covered.as_bytes()));
    if expected != carried {
        return Err(KhqrError::Checksum {
            expected,
            actual: carried.to_string(),
        });
    }
    Ok(())
}
