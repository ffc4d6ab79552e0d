//! Reed-Solomon(n, k) forward error correction over GF(256).
//!
//! Field generator polynomial 0x187, first consecutive root 112, primitive
//! element 11 — the same parameters the origin's `init_rs_char(8, 0x187,
//! 112, 11, nroots, 0)` call uses. One codec is built per `nroots` value
//! (16 or 32) and reused across every payload-size bucket that shares it,
//! per the governing design note, with the parity length the only thing
//! that varies per call rather than per allocated control block.

use crate::config::{RS_FIRST_CONSECUTIVE_ROOT, RS_GENERATOR_POLY, RS_PRIMITIVE_ELEMENT};

const FIELD_SIZE: usize = 256;
const FIELD_MAX: usize = 255;

struct GaloisField {
    exp: [u8; 2 * FIELD_MAX],
    log: [u8; FIELD_SIZE],
}

impl GaloisField {
    fn new(gen_poly: u16) -> Self {
        let mut exp = [0u8; 2 * FIELD_MAX];
        let mut log = [0u8; FIELD_SIZE];
        let mut reg: u16 = 1;
        for i in 0..FIELD_MAX {
            exp[i] = reg as u8;
            log[reg as usize] = i as u8;
            reg <<= 1;
            if reg & 0x100 != 0 {
                reg ^= gen_poly;
            }
        }
        for i in FIELD_MAX..2 * FIELD_MAX {
            exp[i] = exp[i - FIELD_MAX];
        }
        Self { exp, log }
    }

    fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let sum = usize::from(self.log[a as usize]) + usize::from(self.log[b as usize]);
        self.exp[sum]
    }

    fn div(&self, a: u8, b: u8) -> u8 {
        debug_assert!(b != 0, "division by zero field element");
        if a == 0 {
            return 0;
        }
        let diff = FIELD_MAX + usize::from(self.log[a as usize]) - usize::from(self.log[b as usize]);
        self.exp[diff]
    }

    fn pow(&self, base_exp: usize) -> u8 {
        self.exp[base_exp % FIELD_MAX]
    }

    #[allow(dead_code)]
    fn inv(&self, a: u8) -> u8 {
        debug_assert!(a != 0, "inverse of zero field element");
        self.exp[FIELD_MAX - usize::from(self.log[a as usize])]
    }
}

/// A Reed-Solomon codec fixed to one parity length (`nroots`).
pub struct RsCodec {
    gf: GaloisField,
    nroots: usize,
    generator: Vec<u8>,
    /// Exponents of the `nroots` consecutive roots used by this codec.
    root_exponents: Vec<usize>,
}

impl RsCodec {
    /// Builds a codec correcting up to `nroots / 2` byte errors.
    #[must_use]
    pub fn new(nroots: usize) -> Self {
        let gf = GaloisField::new(RS_GENERATOR_POLY);
        let prim = usize::from(RS_PRIMITIVE_ELEMENT);
        let fcs = usize::from(RS_FIRST_CONSECUTIVE_ROOT);

        let root_exponents: Vec<usize> = (0..nroots).map(|i| fcs + i * prim).collect();

        // generator(x) = product_i (x - alpha^root_i), built incrementally.
        let mut generator = vec![1u8];
        for &root_exp in &root_exponents {
            let root = gf.pow(root_exp);
            let mut next = vec![0u8; generator.len() + 1];
            for (i, &coeff) in generator.iter().enumerate() {
                next[i] ^= gf.mul(coeff, root);
                next[i + 1] ^= coeff;
            }
            generator = next;
        }

        Self { gf, nroots, generator, root_exponents }
    }

    /// Computes `nroots` parity bytes for `data` via systematic polynomial
    /// division (an LFSR over the generator polynomial).
    #[must_use]
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut remainder = vec![0u8; self.nroots];
        for &byte in data {
            let feedback = byte ^ remainder[0];
            remainder.rotate_left(1);
            *remainder.last_mut().expect("nroots > 0") = 0;
            if feedback != 0 {
                for i in 0..self.nroots {
                    remainder[i] ^= self.gf.mul(feedback, self.generator[self.nroots - i]);
                }
            }
        }
        remainder
    }

    /// Decodes `codeword` (message followed by `nroots` parity bytes) in
    /// place, correcting errors. Returns the number of corrected symbols,
    /// or `None` if the block is uncorrectable.
    pub fn decode(&self, codeword: &mut [u8]) -> Option<usize> {
        debug_assert!(codeword.len() > self.nroots, "codeword shorter than parity");

        let syndromes = self.syndromes(codeword);
        if syndromes.iter().all(|&s| s == 0) {
            return Some(0);
        }

        let locator = self.berlekamp_massey(&syndromes)?;
        let error_positions = self.chien_search(&locator, codeword.len())?;
        if error_positions.is_empty() {
            return None;
        }

        self.forney_correct(codeword, &syndromes, &locator, &error_positions)?;
        Some(error_positions.len())
    }

    fn syndromes(&self, codeword: &[u8]) -> Vec<u8> {
        self.root_exponents
            .iter()
            .map(|&root_exp| {
                let root = self.gf.pow(root_exp);
                let mut acc = 0u8;
                for &byte in codeword {
                    acc = self.gf.mul(acc, root) ^ byte;
                }
                acc
            })
            .collect()
    }

    /// Berlekamp-Massey: finds the shortest LFSR (error locator polynomial)
    /// that generates the syndrome sequence.
    fn berlekamp_massey(&self, syndromes: &[u8]) -> Option<Vec<u8>> {
        let n = syndromes.len();
        let mut c = vec![0u8; n + 1];
        let mut b = vec![0u8; n + 1];
        c[0] = 1;
        b[0] = 1;
        let mut l = 0usize;
        let mut m = 1usize;
        let mut bb = 1u8;

        for i in 0..n {
            let mut delta = syndromes[i];
            for j in 1..=l {
                delta ^= self.gf.mul(c[j], syndromes[i - j]);
            }
            if delta == 0 {
                m += 1;
            } else if 2 * l <= i {
                let t = c.clone();
                let coeff = self.gf.div(delta, bb);
                for j in 0..b.len().saturating_sub(m) {
                    c[j + m] ^= self.gf.mul(coeff, b[j]);
                }
                l = i + 1 - l;
                b = t;
                bb = delta;
                m = 1;
            } else {
                let coeff = self.gf.div(delta, bb);
                for j in 0..b.len().saturating_sub(m) {
                    c[j + m] ^= self.gf.mul(coeff, b[j]);
                }
                m += 1;
            }
        }

        if l * 2 > self.nroots {
            return None;
        }
        c.truncate(l + 1);
        Some(c)
    }

    /// Maps a codeword array position to the exponent `e` such that the
    /// byte at that position is the coefficient of `x^e` in the received
    /// polynomial (array position 0 is the most significant symbol).
    fn position_exponent(codeword_len: usize, pos: usize) -> usize {
        codeword_len - 1 - pos
    }

    /// Exponent of `alpha^-e`, i.e. the root the locator polynomial must
    /// vanish at for an error at exponent `e`.
    fn neg_exponent(e: usize) -> usize {
        (FIELD_MAX - (e % FIELD_MAX)) % FIELD_MAX
    }

    /// Finds roots of the error locator polynomial by exhaustive search,
    /// returning byte offsets from the start of the codeword.
    fn chien_search(&self, locator: &[u8], codeword_len: usize) -> Option<Vec<usize>> {
        let degree = locator.len() - 1;
        if degree == 0 {
            return Some(Vec::new());
        }
        let mut positions = Vec::with_capacity(degree);
        for i in 0..codeword_len {
            let neg_e = Self::neg_exponent(Self::position_exponent(codeword_len, i));
            let mut acc = 0u8;
            for (j, &coeff) in locator.iter().enumerate() {
                if coeff != 0 {
                    acc ^= self.gf.mul(coeff, self.gf.pow(neg_e * j));
                }
            }
            if acc == 0 {
                positions.push(i);
            }
        }
        if positions.len() != degree {
            return None;
        }
        Some(positions)
    }

    fn forney_correct(
        &self,
        codeword: &mut [u8],
        syndromes: &[u8],
        locator: &[u8],
        error_positions: &[usize],
    ) -> Option<()> {
        let n = codeword.len();
        // Error evaluator polynomial: omega(x) = [S(x) * locator(x)] mod x^nroots.
        let mut omega = vec![0u8; self.nroots];
        for i in 0..self.nroots {
            let mut acc = 0u8;
            for j in 0..=i.min(locator.len() - 1) {
                acc ^= self.gf.mul(syndromes[i - j], locator[j]);
            }
            omega[i] = acc;
        }

        let fcs = usize::from(RS_FIRST_CONSECUTIVE_ROOT);

        for &pos in error_positions {
            let e = Self::position_exponent(n, pos);
            let neg_e = Self::neg_exponent(e);

            let mut omega_val = 0u8;
            for (i, &coeff) in omega.iter().enumerate() {
                omega_val ^= self.gf.mul(coeff, self.gf.pow(neg_e * i));
            }

            // Formal derivative of the locator polynomial (odd-degree terms
            // only survive in characteristic 2).
            let mut lambda_deriv_val = 0u8;
            let mut i = 1;
            while i < locator.len() {
                lambda_deriv_val ^= self.gf.mul(locator[i], self.gf.pow(neg_e * (i - 1)));
                i += 2;
            }
            if lambda_deriv_val == 0 {
                return None;
            }

            // X_k^(1-fcs): Forney's correction for a first consecutive root != 1.
            let exponent = (e as i64).wrapping_mul(1 - fcs as i64).rem_euclid(FIELD_MAX as i64) as usize;
            let x_pow_1_minus_fcs = self.gf.pow(exponent);

            let magnitude = self.gf.mul(x_pow_1_minus_fcs, self.gf.div(omega_val, lambda_deriv_val));
            codeword[pos] ^= magnitude;
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_no_errors() {
        let codec = RsCodec::new(16);
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let parity = codec.encode(&data);
        let mut codeword: Vec<u8> = data.iter().chain(parity.iter()).copied().collect();
        let corrected = codec.decode(&mut codeword).expect("should decode");
        assert_eq!(corrected, 0);
        assert_eq!(&codeword[..data.len()], &data);
    }

    #[test]
    fn corrects_byte_errors_within_capability() {
        let codec = RsCodec::new(16);
        let data: Vec<u8> = (0..50).collect();
        let parity = codec.encode(&data);
        let mut codeword: Vec<u8> = data.iter().chain(parity.iter()).copied().collect();
        let original = codeword.clone();

        codeword[3] ^= 0xFF;
        codeword[10] ^= 0x55;
        codeword[40] ^= 0x01;

        let corrected = codec.decode(&mut codeword).expect("should correct up to 8 errors");
        assert_eq!(corrected, 3);
        assert_eq!(codeword, original);
    }

    #[test]
    fn nroots_32_codec_corrects_more_errors() {
        let codec = RsCodec::new(32);
        let data: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
        let parity = codec.encode(&data);
        let mut codeword: Vec<u8> = data.iter().chain(parity.iter()).copied().collect();
        let original = codeword.clone();

        for pos in [0, 5, 20, 50, 90, 120] {
            codeword[pos] ^= 0xAA;
        }

        let corrected = codec.decode(&mut codeword).expect("should correct up to 16 errors");
        assert_eq!(corrected, 6);
        assert_eq!(codeword, original);
    }
}
