/// Configuration errors detected before any artifact is generated.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// A link or signal name is empty, too long or uses reserved characters.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Two signals share a name.
    #[error("duplicate signal name '{0}'")]
    DuplicateSignal(String),

    /// A bounded integer has `min > max`.
    #[error("signal '{signal}' has empty bounds [{min}, {max}]")]
    InvalidBounds { signal: String, min: i32, max: i32 },

    /// A value does not fit the kind of the signal it is attached to.
    #[error("kind mismatch on signal '{signal}': {detail}")]
    KindMismatch { signal: String, detail: String },

    /// A timing or layout parameter is out of range.
    #[error("invalid link config: {0}")]
    InvalidConfig(String),

    /// The link document could not be read.
    #[error("failed to load link document: {0}")]
    LoadFailed(String),

    /// The link document does not match the document schema.
    #[error("link document rejected: {0}")]
    SchemaViolation(String),

    /// The link document is not valid JSON or does not deserialize.
    #[error("link document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpecError>;
