//! Encoding plans for proxlink links.
//!
//! [`allocate`] turns a [`LinkSpec`](proxlink_spec::LinkSpec) into a
//! role-specific [`SlotPlan`]: slot positions, ownership and codebooks.
//! [`plan_phases`] derives the time-multiplexed probe schedule the sensing
//! side walks through. Both are pure functions of their inputs, so the
//! transmitter and receiver of a link always agree on geometry.

pub mod allocator;
pub mod error;
pub mod fingerprint;
pub mod scheduler;
pub mod slot;

pub use allocator::allocate;
pub use error::{PlanError, Result};
pub use fingerprint::Fingerprint;
pub use scheduler::{plan_phases, PhaseCursor, PhasePlan, ProbePhase, ProbeSetting};
pub use slot::{
    Codebook, ContactSlot, Encoding, LayerKind, Ownership, SignalDriver, SignalPlan, SlotPlan,
    SlotSet, ABSENT_SYMBOL, NIBBLE_BITS, NIBBLE_CODEBOOK_LEN, PRESENCE_PARAMETER,
};
