use tracing::trace;

use crate::crc::crc8;
use crate::error::{CodewordError, Result};

/// A symbol framed with its CRC remainder: `(symbol << 8) | crc8(symbol)`.
pub type Codeword = u32;

/// Width of the CRC remainder in bits.
pub const CRC_BITS: u32 = 8;

/// Widest data field a codeword carries.
pub const MAX_DATA_BITS: u32 = 16;

/// Largest codebook that can be generated.
pub const MAX_SYMBOLS: usize = 1 << MAX_DATA_BITS;

/// Guaranteed minimum pairwise Hamming distance for generated codebooks.
pub const MIN_HAMMING_DISTANCE: u32 = 4;

/// Data-bit width used to frame `symbol_count` symbols.
///
/// The smallest multiple of 4 bits (at least 4) holding
/// `ceil(log2(symbol_count))` bits.
pub fn data_width(symbol_count: usize) -> Result<u32> {
    check_symbol_count(symbol_count)?;
    let bits = usize::BITS - (symbol_count - 1).leading_zeros();
    Ok(bits.div_ceil(4).max(1) * 4)
}

/// Codeword for a single symbol.
pub fn codeword(symbol: u16) -> Codeword {
    (u32::from(symbol) << CRC_BITS) | u32::from(crc8(symbol))
}

/// Generate the codebook for `symbol_count` symbols.
///
/// Index 0 is the reserved null symbol and always maps to `crc8(0)`.
pub fn generate_codes(symbol_count: usize) -> Result<Vec<Codeword>> {
    let width = data_width(symbol_count)?;
    let codes: Vec<Codeword> = (0..symbol_count)
        .map(|symbol| codeword(symbol as u16))
        .collect();
    trace!(symbol_count, width, "generated codebook");
    Ok(codes)
}

/// Recover the symbol from a codeword, or `None` if its CRC does not match.
pub fn symbol_of(word: Codeword) -> Option<u16> {
    if word >> (MAX_DATA_BITS + CRC_BITS) != 0 {
        return None;
    }
    let symbol = (word >> CRC_BITS) as u16;
    (codeword(symbol) == word).then_some(symbol)
}

/// Number of differing bits between two words.
pub fn hamming(a: Codeword, b: Codeword) -> u32 {
    (a ^ b).count_ones()
}

/// Smallest pairwise Hamming distance in a codebook (`None` for fewer than 2 codes).
pub fn min_distance(codes: &[Codeword]) -> Option<u32> {
    let mut best: Option<u32> = None;
    for (i, &a) in codes.iter().enumerate() {
        for &b in &codes[i + 1..] {
            let distance = hamming(a, b);
            best = Some(best.map_or(distance, |current| current.min(distance)));
        }
    }
    best
}

/// Index of the unique codeword within `tolerance` bits of `word`.
///
/// Returns `None` when nothing is close enough or when the match would be
/// ambiguous.
pub fn nearest(word: Codeword, codes: &[Codeword], tolerance: u32) -> Option<usize> {
    let mut found = None;
    for (index, &code) in codes.iter().enumerate() {
        if hamming(word, code) <= tolerance {
            if found.is_some() {
                return None;
            }
            found = Some(index);
        }
    }
    found
}

fn check_symbol_count(symbol_count: usize) -> Result<()> {
    if symbol_count < 2 {
        return Err(CodewordError::InvalidSymbolCount(symbol_count));
    }
    if symbol_count > MAX_SYMBOLS {
        return Err(CodewordError::EncodingCapacityExceeded {
            symbols: symbol_count,
            max: MAX_SYMBOLS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_rounds_up_to_nibbles() {
        assert_eq!(data_width(2).unwrap(), 4);
        assert_eq!(data_width(16).unwrap(), 4);
        assert_eq!(data_width(17).unwrap(), 8);
        assert_eq!(data_width(256).unwrap(), 8);
        assert_eq!(data_width(257).unwrap(), 12);
        assert_eq!(data_width(MAX_SYMBOLS).unwrap(), 16);
    }

    #[test]
    fn first_code_is_null_crc() {
        let codes = generate_codes(3).unwrap();
        assert_eq!(codes[0], u32::from(crc8(0)));
        assert_eq!(codes, vec![0x000, 0x1D9, 0x26B]);
    }

    #[test]
    fn rejects_degenerate_codebooks() {
        assert!(matches!(
            generate_codes(1),
            Err(CodewordError::InvalidSymbolCount(1))
        ));
        assert!(matches!(
            generate_codes(0),
            Err(CodewordError::InvalidSymbolCount(0))
        ));
    }

    #[test]
    fn rejects_codebooks_beyond_capacity() {
        let err = generate_codes(MAX_SYMBOLS + 1).unwrap_err();
        assert!(matches!(
            err,
            CodewordError::EncodingCapacityExceeded { symbols, max }
                if symbols == MAX_SYMBOLS + 1 && max == MAX_SYMBOLS
        ));
    }

    #[test]
    fn symbol_of_checks_crc() {
        assert_eq!(symbol_of(codeword(173)), Some(173));
        assert_eq!(symbol_of(codeword(173) ^ 0b10), None);
        assert_eq!(symbol_of(0xFF00_0000), None);
    }

    #[test]
    fn nearest_corrects_single_bit_errors() {
        let codes = generate_codes(17).unwrap();
        let noisy = codes[9] ^ (1 << 5);
        assert_eq!(nearest(noisy, &codes, 1), Some(9));
        assert_eq!(nearest(noisy, &codes, 0), None);
    }

    #[test]
    fn nearest_refuses_ambiguous_matches() {
        let codes = [0b0000, 0b1111];
        assert_eq!(nearest(0b0011, &codes, 2), None);
    }

    #[test]
    fn min_distance_of_small_codebook() {
        let codes = generate_codes(16).unwrap();
        assert!(min_distance(&codes).unwrap() >= MIN_HAMMING_DISTANCE);
        assert_eq!(min_distance(&codes[..1]), None);
    }
}
