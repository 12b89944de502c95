use std::fmt;
use std::io;

use proxlink_codeword::CodewordError;
use proxlink_plan::PlanError;
use proxlink_protocol::LinkError;
use proxlink_spec::SpecError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn spec_error(context: &str, err: SpecError) -> CliError {
    match err {
        SpecError::LoadFailed(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn codeword_error(context: &str, err: CodewordError) -> CliError {
    match err {
        CodewordError::InvalidSymbolCount(_) => CliError::new(USAGE, format!("{context}: {err}")),
        CodewordError::EncodingCapacityExceeded { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn plan_error(context: &str, err: PlanError) -> CliError {
    match err {
        PlanError::Spec(err) => spec_error(context, err),
        PlanError::Codeword(err) => codeword_error(context, err),
        PlanError::DesynchronizationRisk(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Spec(err) => spec_error(context, err),
        LinkError::Plan(err) => plan_error(context, err),
        LinkError::DesynchronizationRisk(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        LinkError::UnknownSignal(_)
        | LinkError::NotWritable(_)
        | LinkError::ValueOutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::InvalidArtifact(_) | LinkError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
