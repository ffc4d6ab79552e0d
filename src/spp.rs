//! Serial Packet Protocol: the byte framing used on the ground-facing host
//! link, distinct from the radio-facing NGHam framing in [`crate::ngham`].
//!
//! Grounded on §6: start byte `0x24`, a 5-byte header
//! `{start, crc16, type, pl_len}`, then payload; the CRC covers
//! `type..payload` with init `0xFFFF` and a final XOR of `0xFFFF` — the
//! complement convention distinguishing this link from the NGHam
//! codeword's own CRC.

use crc::{Algorithm, Crc};
use thiserror::Error;

pub const SPP_START_BYTE: u8 = 0x24;
pub const SPP_HEADER_LEN: usize = 5;

const SPP_CRC_ALGO: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: false,
    refout: false,
    xorout: 0xFFFF,
    check: 0xD64E,
    residue: 0x1D0F,
};

static SPP_CRC: Crc<u16> = Crc::<u16>::new(&SPP_CRC_ALGO);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SppType {
    Rx = 0,
    Tx = 1,
    Local = 2,
    Command = 3,
}

impl SppType {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Rx,
            1 => Self::Tx,
            2 => Self::Local,
            3 => Self::Command,
            _ => return None,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SppError {
    #[error("frame too short: need at least {SPP_HEADER_LEN} header bytes, got {0}")]
    TooShort(usize),
    #[error("bad start byte {0:#04x}, expected {SPP_START_BYTE:#04x}")]
    BadStartByte(u8),
    #[error("unknown frame type {0:#04x}")]
    UnknownType(u8),
    #[error("declared payload length {declared} does not match {actual} bytes available")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch { expected: u16, computed: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SppFrame {
    pub frame_type: SppType,
    pub payload: Vec<u8>,
}

/// Encodes a frame: `[start, crc_hi, crc_lo, type, pl_len, payload...]`.
#[must_use]
pub fn encode(frame_type: SppType, payload: &[u8]) -> Vec<u8> {
    let mut crc_input = Vec::with_capacity(2 + payload.len());
    crc_input.push(frame_type as u8);
    crc_input.push(payload.len() as u8);
    crc_input.extend_from_slice(payload);
    let crc = SPP_CRC.checksum(&crc_input);

    let mut out = Vec::with_capacity(SPP_HEADER_LEN + payload.len());
    out.push(SPP_START_BYTE);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&crc_input);
    out
}

/// Decodes one frame from the start of `buf`. Returns the parsed frame and
/// the number of bytes it consumed.
pub fn decode(buf: &[u8]) -> Result<(SppFrame, usize), SppError> {
    if buf.len() < SPP_HEADER_LEN {
        return Err(SppError::TooShort(buf.len()));
    }
    if buf[0] != SPP_START_BYTE {
        return Err(SppError::BadStartByte(buf[0]));
    }
    let declared_crc = u16::from_be_bytes([buf[1], buf[2]]);
    let frame_type = SppType::from_u8(buf[3]).ok_or(SppError::UnknownType(buf[3]))?;
    let pl_len = buf[4] as usize;

    let frame_len = SPP_HEADER_LEN + pl_len;
    if buf.len() < frame_len {
        return Err(SppError::LengthMismatch { declared: pl_len, actual: buf.len() - SPP_HEADER_LEN });
    }

    let crc_input = &buf[3..frame_len];
    let computed_crc = SPP_CRC.checksum(crc_input);
    if computed_crc != declared_crc {
        return Err(SppError::CrcMismatch { expected: declared_crc, computed: computed_crc });
    }

    let payload = buf[SPP_HEADER_LEN..frame_len].to_vec();
    Ok((SppFrame { frame_type, payload }, frame_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let payload = vec![1, 2, 3, 4, 5];
        let frame = encode(SppType::Command, &payload);
        assert_eq!(frame[0], SPP_START_BYTE);

        let (decoded, consumed) = decode(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded.frame_type, SppType::Command);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn bad_start_byte_is_rejected() {
        let mut frame = encode(SppType::Rx, &[9]);
        frame[0] = 0x00;
        assert_eq!(decode(&frame), Err(SppError::BadStartByte(0x00)));
    }

    #[test]
    fn tampered_payload_fails_crc() {
        let mut frame = encode(SppType::Tx, &[1, 2, 3]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode(&frame), Err(SppError::CrcMismatch { .. })));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let frame = encode(SppType::Local, &[1, 2, 3]);
        assert_eq!(decode(&frame[..3]), Err(SppError::TooShort(3)));
    }
}
