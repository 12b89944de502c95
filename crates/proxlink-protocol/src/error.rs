/// Errors that can occur while compiling or running a link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Link spec or config is invalid.
    #[error("configuration error: {0}")]
    Spec(#[from] proxlink_spec::SpecError),

    /// Slot allocation failed.
    #[error("planning error: {0}")]
    Plan(#[from] proxlink_plan::PlanError),

    /// The contact field rejected an emitter or probe.
    #[error("substrate error: {0}")]
    Substrate(#[from] proxlink_substrate::SubstrateError),

    /// The two sides of a link could disagree on geometry or ownership.
    #[error("desynchronization risk: {0}")]
    DesynchronizationRisk(String),

    /// No signal with this name exists in the artifact.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// The local role does not drive this signal.
    #[error("signal '{0}' is not written by this role")]
    NotWritable(String),

    /// A host value does not fit the signal's range.
    #[error("value {value} out of range for signal '{signal}'")]
    ValueOutOfRange { signal: String, value: i32 },

    /// An encoded artifact is malformed or incomplete.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Artifact payload (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
