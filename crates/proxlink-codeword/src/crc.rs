//! CRC-8 over symbol data bits.

/// Generator polynomial `x^8 + x^7 + x^6 + x^4 + x^3 + 1`, including the x^8 term.
pub const POLYNOMIAL: u32 = 0x1D9;

/// CRC-8 remainder of `symbol · x^8` modulo [`POLYNOMIAL`].
///
/// Bits are processed most significant first with a zero initial register
/// and no reflection, so leading zero bits do not change the result and the
/// remainder is the same whatever data width the symbol is framed in.
pub fn crc8(symbol: u16) -> u8 {
    let mut reg = u32::from(symbol) << 8;
    for bit in (8..24).rev() {
        if reg & (1 << bit) != 0 {
            reg ^= POLYNOMIAL << (bit - 8);
        }
    }
    (reg & 0xFF) as u8
}
