use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LinkConfig;
use crate::error::{Result, SpecError};
use crate::link::LinkSpec;

/// JSON Schema (draft 2020-12) every link document must satisfy.
pub const LINK_DOCUMENT_SCHEMA: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://schemas.3leaps.dev/proxlink/link-document/v1.schema.json",
  "type": "object",
  "required": ["link"],
  "additionalProperties": false,
  "properties": {
    "link": {
      "type": "object",
      "required": ["signals"],
      "additionalProperties": false,
      "properties": {
        "name": { "type": "string", "minLength": 1, "maxLength": 64 },
        "base_offset": { "type": "integer", "minimum": 0, "maximum": 4294967295 },
        "signals": {
          "type": "array",
          "items": { "$ref": "#/$defs/signal" }
        }
      }
    },
    "config": { "type": "object" }
  },
  "$defs": {
    "signal": {
      "type": "object",
      "required": ["name", "kind"],
      "additionalProperties": false,
      "properties": {
        "name": { "type": "string", "minLength": 1, "maxLength": 64 },
        "kind": {
          "oneOf": [
            {
              "type": "object",
              "required": ["type"],
              "additionalProperties": false,
              "properties": { "type": { "const": "bool" } }
            },
            {
              "type": "object",
              "required": ["type", "min", "max"],
              "additionalProperties": false,
              "properties": {
                "type": { "const": "bounded_int" },
                "min": { "type": "integer" },
                "max": { "type": "integer" }
              }
            }
          ]
        },
        "direction": { "enum": ["one_way", "two_way"] },
        "sender": { "enum": ["transmitter", "receiver"] },
        "fallback": {
          "oneOf": [
            { "const": "hold" },
            {
              "type": "object",
              "required": ["reset"],
              "additionalProperties": false,
              "properties": { "reset": { "type": "integer" } }
            },
            {
              "type": "object",
              "required": ["forward"],
              "additionalProperties": false,
              "properties": { "forward": { "type": "string", "minLength": 1 } }
            }
          ]
        },
        "default": { "type": "integer" }
      }
    }
  }
}"##;

/// Default size limit for link documents (256 KiB).
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 256 * 1024;

/// A link spec together with the timing config both sides compile with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDocument {
    pub link: LinkSpec,
    #[serde(default)]
    pub config: LinkConfig,
}

/// Parses and validates link documents.
pub struct DocumentLoader {
    validator: Validator,
    max_size: usize,
}

impl DocumentLoader {
    /// Create a loader with the default size limit.
    pub fn new() -> Result<Self> {
        Self::with_max_size(DEFAULT_MAX_DOCUMENT_SIZE)
    }

    /// Create a loader that refuses documents larger than `max_size` bytes.
    pub fn with_max_size(max_size: usize) -> Result<Self> {
        let schema: Value = serde_json::from_str(LINK_DOCUMENT_SCHEMA)?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| SpecError::SchemaViolation(format!("embedded schema: {err}")))?;
        Ok(Self {
            validator,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Parse a document from a JSON string.
    pub fn parse(&self, json: &str) -> Result<LinkDocument> {
        if json.len() > self.max_size {
            return Err(SpecError::LoadFailed(format!(
                "document too large ({} bytes)",
                json.len()
            )));
        }
        let value: Value = serde_json::from_str(json)?;
        self.parse_value(value)
    }

    /// Check a JSON value against the schema, deserialize and validate it.
    pub fn parse_value(&self, value: Value) -> Result<LinkDocument> {
        let violation = {
            let mut errors = self.validator.iter_errors(&value);
            errors.next().map(|first| {
                let mut message = first.to_string();
                for err in errors.take(3) {
                    message.push_str("; ");
                    message.push_str(&err.to_string());
                }
                message
            })
        };
        if let Some(message) = violation {
            return Err(SpecError::SchemaViolation(message));
        }

        let document: LinkDocument = serde_json::from_value(value)?;
        document.config.validate()?;
        document.link.validate()?;
        debug!(
            link = %document.link.name,
            signals = document.link.signals.len(),
            "link document loaded"
        );
        Ok(document)
    }

    /// Read a document from disk. Symlinks are refused.
    pub fn load(&self, path: &Path) -> Result<LinkDocument> {
        let path_metadata = std::fs::symlink_metadata(path)
            .map_err(|err| SpecError::LoadFailed(format!("{}: {err}", path.display())))?;
        if path_metadata.file_type().is_symlink() {
            return Err(SpecError::LoadFailed(format!(
                "refusing to load document symlink: {}",
                path.display()
            )));
        }
        if !path_metadata.is_file() {
            return Err(SpecError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if path_metadata.len() > self.max_size as u64 {
            return Err(SpecError::LoadFailed(format!(
                "document too large ({} bytes): {}",
                path_metadata.len(),
                path.display()
            )));
        }

        let file = std::fs::File::open(path)
            .map_err(|err| SpecError::LoadFailed(format!("{}: {err}", path.display())))?;
        let read_limit = u64::try_from(self.max_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SpecError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;

        self.parse(&content)
    }
}
