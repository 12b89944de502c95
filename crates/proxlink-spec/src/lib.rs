//! Declarative link configuration for proxlink.
//!
//! A [`LinkSpec`] names the signals two participants exchange. It is the
//! only input to planning and compilation, so everything derived from it
//! must be reproducible on both sides of a link.
//!
//! Link documents can be loaded from JSON; they are checked against an
//! embedded JSON Schema before deserialization.

pub mod config;
pub mod document;
pub mod error;
pub mod link;
pub mod signal;

pub use config::LinkConfig;
pub use document::{
    DocumentLoader, LinkDocument, DEFAULT_MAX_DOCUMENT_SIZE, LINK_DOCUMENT_SCHEMA,
};
pub use error::{Result, SpecError};
pub use link::LinkSpec;
pub use signal::{Direction, Fallback, Role, Signal, ValueKind};
