//! CRC-16-CCITT: polynomial 0x1021, initial value 0xFFFF, no final XOR,
//! MSB-first. This is the checksum embedded in every NGHam codeword and
//! in the SPP host-link header.

use crc::{Algorithm, Crc};

use crate::config::{CRC_CCITT_INIT, CRC_CCITT_POLY};

const CCITT_FALSE: Algorithm<u16> = Algorithm {
    width: 16,
    poly: CRC_CCITT_POLY,
    init: CRC_CCITT_INIT,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x29B1,
    residue: 0x0000,
};

static CRC16_CCITT: Crc<u16> = Crc::<u16>::new(&CCITT_FALSE);

/// Computes CRC-16-CCITT over `buf`.
#[must_use]
pub fn crc_ccitt(buf: &[u8]) -> u16 {
    CRC16_CCITT.checksum(buf)
}
