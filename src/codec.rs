//! Fixed-length, human-presentable codes derived from sequence seeds.
//!
//! A seed is first scrambled with an affine bijection modulo [`CodeEncoder::CAPACITY`]
//! so neighbouring seeds do not look neighbouring, then written in base 31 over an
//! alphabet without the easily confused `0 O 1 I L`.

use crate::contracts::CodecError;

const ALPHABET: &[u8; 31] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";
const BASE: u64 = ALPHABET.len() as u64;
const NO_VALUE: u8 = 255;

const CODE_LENGTH: usize = 6;
const CAPACITY: u64 = BASE.pow(CODE_LENGTH as u32);

// MULTIPLIER must stay coprime to BASE.
const MULTIPLIER: u64 = 550_435_931;
const OFFSET: u64 = 192_837_465;
const INVERSE: u64 = mod_inverse(MULTIPLIER, CAPACITY);

/// Lookup table for decoding, accepting lowercase letters too.
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        let c = ALPHABET[i];
        lut[c as usize] = i as u8;
        if c.is_ascii_alphabetic() {
            lut[c.to_ascii_lowercase() as usize] = i as u8;
        }
        i += 1;
    }
    lut
};

const fn mod_inverse(value: u64, modulus: u64) -> u64 {
    let (mut old_r, mut r) = (value as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        let next_r = old_r - q * r;
        old_r = r;
        r = next_r;
        let next_s = old_s - q * s;
        old_s = s;
        s = next_s;
    }
    assert!(old_r == 1, "multiplier must be coprime to the capacity");
    old_s.rem_euclid(modulus as i128) as u64
}

/// Deterministic, reversible mapping between seeds and 6-character codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeEncoder;

impl CodeEncoder {
    /// Characters per code.
    pub const LENGTH: usize = CODE_LENGTH;
    /// Number of distinct codes; seeds must be below this.
    pub const CAPACITY: u64 = CAPACITY;

    pub fn new() -> Self {
        Self
    }

    pub fn capacity(&self) -> u64 {
        Self::CAPACITY
    }

    /// Encodes `seed`, failing with `SequenceSpaceExhausted` past the capacity.
    pub fn encode(&self, seed: u64) -> Result<String, CodecError> {
        if seed >= CAPACITY {
            return Err(CodecError::SequenceSpaceExhausted {
                seed,
                capacity: CAPACITY,
            });
        }

        let mut value = ((seed as u128 * MULTIPLIER as u128 + OFFSET as u128)
            % CAPACITY as u128) as u64;
        let mut buf = [ALPHABET[0]; CODE_LENGTH];
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(value % BASE) as usize];
            value /= BASE;
        }

        Ok(buf.iter().map(|&b| b as char).collect())
    }

    /// Recovers the seed a code was encoded from.
    pub fn decode(&self, code: &str) -> Result<u64, CodecError> {
        let actual = code.chars().count();
        if actual != CODE_LENGTH {
            return Err(CodecError::InvalidLength {
                expected: CODE_LENGTH,
                actual,
            });
        }

        let mut value = 0u64;
        for c in code.chars() {
            let digit = if c.is_ascii() {
                LOOKUP[c as usize]
            } else {
                NO_VALUE
            };
            if digit == NO_VALUE {
                return Err(CodecError::InvalidCharacter(c));
            }
            value = value * BASE + digit as u64;
        }

        let shifted = (value + CAPACITY - OFFSET) % CAPACITY;
        Ok(((shifted as u128 * INVERSE as u128) % CAPACITY as u128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn capacity_is_31_to_the_6th() {
        assert_eq!(CodeEncoder::CAPACITY, 887_503_681);
        assert_eq!(CodeEncoder.capacity(), CodeEncoder::CAPACITY);
    }

    #[test]
    fn inverse_undoes_multiplier() {
        assert_eq!(INVERSE, 270_235_237);
        assert_eq!((MULTIPLIER as u128 * INVERSE as u128) % CAPACITY as u128, 1);
    }

    #[test]
    fn known_encodings_are_stable() {
        let encoder = CodeEncoder::new();
        assert_eq!(encoder.encode(0).unwrap(), "8RU2CE");
        assert_eq!(encoder.encode(1).unwrap(), "UYUMG7");
        assert_eq!(encoder.encode(2).unwrap(), "G7V7KY");
        assert_eq!(encoder.encode(CAPACITY - 1).unwrap(), "MHTF8N");
    }

    #[test]
    fn decode_inverts_encode() {
        let encoder = CodeEncoder::new();
        for seed in [0, 1, 2, 30, 31, 961, 123_456_789, CAPACITY - 1] {
            let code = encoder.encode(seed).unwrap();
            assert_eq!(code.len(), CodeEncoder::LENGTH);
            assert_eq!(encoder.decode(&code).unwrap(), seed, "{code}");
        }
    }

    #[test]
    fn first_seeds_never_collide() {
        let encoder = CodeEncoder::new();
        let codes: HashSet<String> = (0..20_000).map(|s| encoder.encode(s).unwrap()).collect();
        assert_eq!(codes.len(), 20_000);
    }

    #[test]
    fn codes_avoid_ambiguous_characters() {
        let encoder = CodeEncoder::new();
        for seed in 0..5_000 {
            let code = encoder.encode(seed).unwrap();
            assert!(!code.contains(['0', 'O', '1', 'I', 'L']), "{code}");
        }
    }

    #[test]
    fn encode_past_capacity_is_exhausted() {
        let result = CodeEncoder.encode(CAPACITY);
        assert_eq!(
            result,
            Err(CodecError::SequenceSpaceExhausted {
                seed: CAPACITY,
                capacity: CAPACITY
            })
        );
        assert!(CodeEncoder.encode(u64::MAX).is_err());
    }

    #[test]
    fn decode_accepts_lowercase() {
        assert_eq!(CodeEncoder.decode("uyumg7").unwrap(), 1);
    }

    #[test]
    fn decode_rejects_invalid_length() {
        assert_eq!(
            CodeEncoder.decode("ABC"),
            Err(CodecError::InvalidLength {
                expected: 6,
                actual: 3
            })
        );
        assert!(CodeEncoder.decode("8RU2CE2").is_err());
    }

    #[test]
    fn decode_rejects_ambiguous_and_non_ascii() {
        assert_eq!(
            CodeEncoder.decode("8RU2C0"),
            Err(CodecError::InvalidCharacter('0'))
        );
        assert_eq!(
            CodeEncoder.decode("8RU2CO"),
            Err(CodecError::InvalidCharacter('O'))
        );
        assert_eq!(
            CodeEncoder.decode("8RU2Cé"),
            Err(CodecError::InvalidCharacter('é'))
        );
    }
}
