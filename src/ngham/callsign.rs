//! SIXBIT callsign packing: 7 characters plus a 6-bit SSID packed into 6
//! bytes, bit-exact with the origin's `ngh_ext_encode_callsign` /
//! `ngh_ext_decode_callsign`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallsignError {
    #[error("callsign must be 1-7 characters before an optional -SSID suffix")]
    InvalidLength,
    #[error("SSID must be 1-2 decimal digits in range 0-63")]
    InvalidSsid,
}

/// Encodes a callsign such as `"PY0EFS"` or `"PY0EFS-12"` into 6 bytes.
pub fn encode_callsign(callsign: &str) -> Result<[u8; 6], CallsignError> {
    let (call, ssid) = split_ssid(callsign)?;

    let mut sixbit = [0u8; 7];
    for (i, ch) in call.chars().enumerate() {
        sixbit[i] = to_sixbit(ch);
    }

    let mut enc = [0u8; 6];
    let temp0: u32 = (u32::from(sixbit[0]) << 18 & 0xFC_0000)
        | (u32::from(sixbit[1]) << 12 & 0x3_F000)
        | (u32::from(sixbit[2]) << 6 & 0xFC0)
        | (u32::from(sixbit[3]) & 0x3F);
    enc[0] = ((temp0 >> 16) & 0xFF) as u8;
    enc[1] = ((temp0 >> 8) & 0xFF) as u8;
    enc[2] = (temp0 & 0xFF) as u8;

    let temp1: u32 = (u32::from(sixbit[4]) << 18 & 0xFC_0000)
        | (u32::from(sixbit[5]) << 12 & 0x3_F000)
        | (u32::from(sixbit[6]) << 6 & 0xFC0)
        | (u32::from(ssid) & 0x3F);
    enc[3] = ((temp1 >> 16) & 0xFF) as u8;
    enc[4] = ((temp1 >> 8) & 0xFF) as u8;
    enc[5] = (temp1 & 0xFF) as u8;

    Ok(enc)
}

/// Decodes 6 packed bytes back into an uppercased `CALL` or `CALL-NN` string.
#[must_use]
pub fn decode_callsign(enc: &[u8; 6]) -> arrayvec::ArrayString<11> {
    let temp0: u32 =
        (u32::from(enc[0]) << 16 & 0xFF_0000) | (u32::from(enc[1]) << 8 & 0xFF00) | (u32::from(enc[2]) & 0xFF);
    let mut chars = [0u8; 7];
    chars[0] = ((temp0 >> 18) & 0x3F) as u8;
    chars[1] = ((temp0 >> 12) & 0x3F) as u8;
    chars[2] = ((temp0 >> 6) & 0x3F) as u8;
    chars[3] = (temp0 & 0x3F) as u8;

    let temp1: u32 =
        (u32::from(enc[3]) << 16 & 0xFF_0000) | (u32::from(enc[4]) << 8 & 0xFF00) | (u32::from(enc[5]) & 0xFF);
    chars[4] = ((temp1 >> 18) & 0x3F) as u8;
    chars[5] = ((temp1 >> 12) & 0x3F) as u8;
    chars[6] = ((temp1 >> 6) & 0x3F) as u8;
    let ssid = (temp1 & 0x3F) as u8;

    let mut out = arrayvec::ArrayString::<11>::new();
    for &sixbit in &chars {
        if sixbit == 0 {
            break;
        }
        out.push(from_sixbit(sixbit));
    }
    if ssid != 0 {
        out.push('-');
        let _ = std::fmt::Write::write_fmt(&mut out, format_args!("{ssid}"));
    }
    out
}

fn split_ssid(callsign: &str) -> Result<(&str, u8), CallsignError> {
    match callsign.split_once('-') {
        None => {
            if callsign.is_empty() || callsign.len() > 7 {
                return Err(CallsignError::InvalidLength);
            }
            Ok((callsign, 0))
        }
        Some((call, ssid_str)) => {
            if call.is_empty() || call.len() > 7 {
                return Err(CallsignError::InvalidLength);
            }
            if ssid_str.is_empty() || ssid_str.len() > 2 || !ssid_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CallsignError::InvalidSsid);
            }
            let ssid: u8 = ssid_str.parse().map_err(|_| CallsignError::InvalidSsid)?;
            if ssid > 63 {
                return Err(CallsignError::InvalidSsid);
            }
            Ok((call, ssid))
        }
    }
}

/// Uppercases and subtracts the SIXBIT offset (space maps to 0).
fn to_sixbit(ch: char) -> u8 {
    let upper = ch.to_ascii_uppercase() as u8;
    upper.wrapping_sub(32) & 0x3F
}

fn from_sixbit(code: u8) -> char {
    (code.wrapping_add(32)) as char
}
