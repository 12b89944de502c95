//! Declarative state machine descriptions.
//!
//! A layer is compiled into a flat list of nodes and ordered transitions.
//! The [`LayerRunner`](crate::machine::LayerRunner) interprets it; nothing
//! in a description depends on runtime state.

use proxlink_plan::LayerKind;
use serde::{Deserialize, Serialize};

/// Node identifier, unique within one description.
pub type NodeId = u16;

/// What a node means to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// Nothing known yet; waiting for the peer.
    Startup,
    /// Peer present, no value to drive or none sensed yet.
    Idle,
    /// Driving the local value.
    Driving,
    /// Driving the local value and the peer acknowledged it.
    Confirmed,
    /// A new remote value is being confirmed.
    Transition,
    /// A remote value has been latched.
    Latched,
    Init,
    OwnerLocal,
    PeerLocal,
    PeerLocalTimeout,
}

/// What a node drives on the slots the layer owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emit {
    /// The reserved absent symbol.
    Absent,
    /// The value latched from the host input.
    Local,
    /// The value latched from the peer (acknowledgment echo).
    Latched,
    /// The presence beacon.
    Beacon,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateNode {
    pub id: NodeId,
    pub name: String,
    pub kind: StateKind,
    pub emit: Emit,
}

/// Predicate over the values sampled at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    PeerPresent,
    PeerAbsent,
    LocalKnown,
    LocalUnknown,
    /// Host input differs from the value being driven.
    LocalChanged,
    /// A valid value was sensed this tick.
    SensedValue,
    /// The sensed value differs from the latched one.
    SensedDiffers,
    /// The sensed value differs from the current candidate.
    SensedNew,
    /// The candidate was sensed on at least this many sampled ticks.
    SensedStable(u32),
    /// The candidate is no longer present where it was probed.
    SensedLost,
    HasLatched,
    /// The peer echoed the driven value on at least this many sampled ticks.
    AckMatches(u32),
    /// The current node was entered at least this many ticks ago.
    DwellElapsed(u64),
    HostLocal,
    HostRemote,
    /// Peer beacon contact this tick.
    BeaconSensed,
    /// No peer beacon contact for at least this many ticks.
    BeaconStale(u64),
    Always,
}

/// Side effect applied when a transition fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    /// Latch the host input as the driven value.
    LatchLocal,
    /// Stop driving after the host input was withdrawn.
    ReleaseLocal,
    /// Adopt the sensed value as the candidate.
    TakeCandidate,
    /// Promote the candidate to the latched output.
    CommitCandidate,
    ClearCandidate,
    /// Forget every latched and driven value.
    Reset,
}

/// Edge taken when every condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub from: NodeId,
    pub to: NodeId,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub action: Action,
}

/// A compiled protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateMachineDescription {
    /// Signal the layer belongs to, or the presence parameter.
    pub signal: String,
    pub layer: LayerKind,
    /// Whether the local role drives the primary value.
    pub emits_primary: bool,
    pub initial: NodeId,
    pub nodes: Vec<StateNode>,
    pub transitions: Vec<Transition>,
}

impl StateMachineDescription {
    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Transitions leaving `id`, in priority order.
    pub fn transitions_from(&self, id: NodeId) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.from == id)
    }

    /// Whether the initial node and every transition endpoint exist.
    pub fn is_closed(&self) -> bool {
        let known = |id: NodeId| self.node(id).is_some();
        known(self.initial)
            && self
                .transitions
                .iter()
                .all(|t| known(t.from) && known(t.to))
    }
}
