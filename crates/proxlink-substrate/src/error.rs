/// Errors that can occur while driving a contact field.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    /// The position lies outside the extent the field was built with.
    #[error("position {position} outside field extent (max {max})")]
    OutOfRange { position: u32, max: u32 },

    /// The word does not fit the physical lane width.
    #[error("word {word:#x} wider than {bits} bits")]
    InvalidWord { word: u32, bits: u32 },
}

pub type Result<T> = std::result::Result<T, SubstrateError>;
