//! Contact-field abstraction for proxlink.
//!
//! The substrate is the only thing two participants share. It offers
//! discrete, delayed, proximity-style sensing and nothing else:
//! - an emitter contact can be driven to a codeword at a slot position
//! - a probe contact can be tuned to a codeword at the same position
//! - the probe reports contact when both have settled and the words agree
//!
//! This is the lowest layer of proxlink. Hosts implement [`ContactField`];
//! tests and the CLI use [`SimulatedField`].

pub mod error;
pub mod sim;
pub mod traits;

pub use error::{Result, SubstrateError};
pub use sim::{FieldConfig, SimulatedField};
pub use traits::{ContactField, MAX_WORD_BITS};
