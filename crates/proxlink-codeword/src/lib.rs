//! CRC-framed codewords for proxlink probe slots.
//!
//! Every symbol a slot can carry is mapped to a codeword:
//! - the symbol's data bits in the high part
//! - an 8-bit CRC remainder (generator polynomial 0x1D9) in the low byte
//!
//! Any two codewords differ in at least four bit positions, so single and
//! double bit misreads are always detected. The CRC is a noise guard, not a
//! security mechanism.

pub mod codeword;
pub mod crc;
pub mod error;

pub use codeword::{
    codeword, data_width, generate_codes, hamming, min_distance, nearest, symbol_of, Codeword,
    CRC_BITS, MAX_DATA_BITS, MAX_SYMBOLS, MIN_HAMMING_DISTANCE,
};
pub use crc::{crc8, POLYNOMIAL};
pub use error::{CodewordError, Result};
