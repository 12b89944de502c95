/// Errors that can occur while planning a link.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The link spec or config is invalid.
    #[error("configuration error: {0}")]
    Spec(#[from] proxlink_spec::SpecError),

    /// A codebook could not be generated.
    #[error("codeword error: {0}")]
    Codeword(#[from] proxlink_codeword::CodewordError),

    /// The two sides of a link could disagree on slot geometry.
    #[error("desynchronization risk: {0}")]
    DesynchronizationRisk(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
