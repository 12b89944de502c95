/// Errors that can occur while generating codewords.
#[derive(Debug, thiserror::Error)]
pub enum CodewordError {
    /// More symbols were requested than the widest codeword can carry.
    #[error("encoding capacity exceeded ({symbols} symbols, max {max})")]
    EncodingCapacityExceeded { symbols: usize, max: usize },

    /// A codebook needs at least two symbols (absent plus one value).
    #[error("invalid symbol count {0} (need at least 2)")]
    InvalidSymbolCount(usize),
}

pub type Result<T> = std::result::Result<T, CodewordError>;
