//! Protocol layers, compiled artifacts and runtime for proxlink.
//!
//! Each signal of a link is carried by a small state machine compiled from
//! its [`SignalPlan`](proxlink_plan::SignalPlan):
//! - the emit side latches the host input and drives it once the peer is present
//! - the sense side decodes probe contacts and latches stable values
//! - two-way signals echo the latched value back as an acknowledgment
//!
//! A separate liveness layer tracks the peer beacon. Everything one role
//! needs is compiled into an [`Artifact`]; a [`Participant`] runs it one
//! tick at a time against any [`ContactField`](proxlink_substrate::ContactField).
//!
//! # Example
//!
//! ```
//! use proxlink_protocol::Loopback;
//! use proxlink_spec::{LinkSpec, Signal};
//!
//! let spec = LinkSpec::new("hands").with_signal(Signal::bool("grip"));
//! let mut link = Loopback::from_spec(&spec).unwrap();
//! link.transmitter_mut().set_input("grip", 1).unwrap();
//! link.run(40).unwrap();
//! assert_eq!(link.receiver().output("grip").unwrap(), 1);
//! ```

pub mod artifact;
pub mod compiler;
pub mod decoder;
pub mod description;
pub mod error;
pub mod layer;
pub mod loopback;
pub mod machine;
pub mod participant;
pub mod presence;

pub use artifact::{
    Artifact, ArtifactEntry, ArtifactId, ParameterDirection, ParameterEntry, FORMAT_VERSION,
    HEADER_SIZE, MAGIC,
};
pub use compiler::{
    compile, compile_receiver, compile_receiver_with_config, compile_transmitter,
    compile_transmitter_with_config, rebuild, verify_pair, RebuildReport,
};
pub use decoder::{Decoder, NibbleDecoder, Observation, Sensed};
pub use description::{
    Action, Condition, Emit, NodeId, StateKind, StateMachineDescription, StateNode, Transition,
};
pub use error::{LinkError, Result};
pub use layer::{build_layer, build_presence_layer};
pub use loopback::{Loopback, LoopbackTick};
pub use machine::{LayerInputs, LayerRunner, LivenessState, ProtocolState, Step};
pub use participant::{Participant, TickEvent, TickReport};
pub use presence::Presence;
