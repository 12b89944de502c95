use crate::error::{Result, SubstrateError};

/// Widest codeword a contact can carry: 16 data bits plus an 8-bit CRC.
pub const MAX_WORD_BITS: u32 = 24;

/// A shared proximity substrate.
///
/// Every slot position holds at most one emitter and one probe. Ownership of
/// each side is fixed when a link is compiled, so the field never needs to
/// know which participant placed a contact.
///
/// Implementations must be sampled and driven from a single tick loop: all
/// `contact` reads within one tick observe the state left by the previous
/// `advance`.
pub trait ContactField {
    /// Drive the emitter at `position` to `word`. `None` retracts it.
    fn drive(&mut self, position: u32, word: Option<u32>) -> Result<()>;

    /// Tune the probe at `position` to `word`. `None` retracts it.
    fn probe(&mut self, position: u32, word: Option<u32>) -> Result<()>;

    /// Whether the probe at `position` is touching its emitter.
    fn contact(&self, position: u32) -> bool;

    /// Advance substrate time by one tick.
    fn advance(&mut self);

    /// Current substrate tick.
    fn now(&self) -> u64;
}

pub(crate) fn check_word(word: Option<u32>) -> Result<()> {
    match word {
        Some(word) if word >> MAX_WORD_BITS != 0 => Err(SubstrateError::InvalidWord {
            word,
            bits: MAX_WORD_BITS,
        }),
        _ => Ok(()),
    }
}

impl<F: ContactField + ?Sized> ContactField for &mut F {
    fn drive(&mut self, position: u32, word: Option<u32>) -> Result<()> {
        (**self).drive(position, word)
    }

    fn probe(&mut self, position: u32, word: Option<u32>) -> Result<()> {
        (**self).probe(position, word)
    }

    fn contact(&self, position: u32) -> bool {
        (**self).contact(position)
    }

    fn advance(&mut self) {
        (**self).advance()
    }

    fn now(&self) -> u64 {
        (**self).now()
    }
}
