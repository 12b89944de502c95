//! Point-to-point signaling over proximity-style contacts.
//!
//! proxlink lets two co-located participants exchange booleans and bounded
//! integers when the only shared channel is "is this probe touching that
//! emitter". Values are turned into CRC-framed codewords, swept by
//! time-multiplexed probe phases and carried by small per-signal state
//! machines with presence detection and acknowledgments.
//!
//! # Crate Structure
//!
//! - [`substrate`] — The `ContactField` capability and an in-memory simulation
//! - [`codeword`] — CRC-8 codeword generation and Hamming helpers
//! - [`spec`] — Link specs, timing config and JSON link documents
//! - [`plan`] — Slot allocation, probe phases and geometry fingerprints
//! - [`protocol`] — Protocol layers, compiled artifacts and the tick runtime

/// Re-export substrate types.
pub mod substrate {
    pub use proxlink_substrate::*;
}

/// Re-export codeword types.
pub mod codeword {
    pub use proxlink_codeword::*;
}

/// Re-export link spec types.
pub mod spec {
    pub use proxlink_spec::*;
}

/// Re-export planning types.
pub mod plan {
    pub use proxlink_plan::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use proxlink_protocol::*;
}
