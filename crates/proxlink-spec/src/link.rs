use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::signal::{Fallback, Signal, ValueKind};

const MAX_NAME_LEN: usize = 64;
const DEFAULT_LINK_NAME: &str = "link";

/// Signals exchanged between the two roles of one link.
///
/// Declaration order is significant: slot positions are assigned in this
/// order, so both participants must be compiled from the same sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default = "default_link_name")]
    pub name: String,
    /// Spatial offset added to every slot position of this link.
    #[serde(default)]
    pub base_offset: u32,
    pub signals: Vec<Signal>,
}

fn default_link_name() -> String {
    DEFAULT_LINK_NAME.to_string()
}

impl Default for LinkSpec {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_NAME)
    }
}

impl LinkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_offset: 0,
            signals: Vec::new(),
        }
    }

    pub fn with_base_offset(mut self, base_offset: u32) -> Self {
        self.base_offset = base_offset;
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    /// Look up a signal by name.
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|signal| signal.name == name)
    }

    /// Check names, bounds and value kinds.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        let mut seen = HashSet::with_capacity(self.signals.len());
        for signal in &self.signals {
            validate_name(&signal.name)?;
            if !seen.insert(signal.name.as_str()) {
                return Err(SpecError::DuplicateSignal(signal.name.clone()));
            }
            validate_kind(signal)?;
        }

        for signal in &self.signals {
            validate_values(self, signal)?;
        }

        debug!(link = %self.name, signals = self.signals.len(), "link spec validated");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.len() > MAX_NAME_LEN {
        "longer than 64 bytes"
    } else if name.starts_with('@') {
        "'@' prefix is reserved"
    } else if name.contains('/') || name.chars().any(char::is_control) {
        "contains '/' or control characters"
    } else {
        return Ok(());
    };

    Err(SpecError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn validate_kind(signal: &Signal) -> Result<()> {
    if let ValueKind::BoundedInt { min, max } = signal.kind {
        if min > max {
            return Err(SpecError::InvalidBounds {
                signal: signal.name.clone(),
                min,
                max,
            });
        }
    }
    Ok(())
}

fn validate_values(link: &LinkSpec, signal: &Signal) -> Result<()> {
    let mismatch = |detail: String| SpecError::KindMismatch {
        signal: signal.name.clone(),
        detail,
    };
    let (min, max) = signal.kind.range();

    if let Some(value) = signal.default {
        if !signal.kind.contains(value) {
            return Err(mismatch(format!(
                "default {value} outside [{min}, {max}]"
            )));
        }
    }

    match &signal.fallback {
        Fallback::Hold => {}
        Fallback::Reset(value) => {
            if !signal.kind.contains(*value) {
                return Err(mismatch(format!(
                    "reset value {value} outside [{min}, {max}]"
                )));
            }
        }
        Fallback::Forward(source) => {
            if source.is_empty() {
                return Err(mismatch("forward source must not be empty".to_string()));
            }
            if *source == signal.name {
                return Err(mismatch("signal cannot forward itself".to_string()));
            }
            if let Some(other) = link.signal(source) {
                let (other_min, other_max) = other.kind.range();
                if other_min < min || other_max > max {
                    return Err(mismatch(format!(
                        "forward source '{source}' range [{other_min}, {other_max}] exceeds [{min}, {max}]"
                    )));
                }
            }
        }
    }

    Ok(())
}
