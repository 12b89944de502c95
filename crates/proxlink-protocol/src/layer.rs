use proxlink_plan::{LayerKind, SignalPlan, PRESENCE_PARAMETER};
use proxlink_spec::{Direction, LinkConfig};
use tracing::debug;

use crate::description::{
    Action, Condition, Emit, NodeId, StateKind, StateMachineDescription, StateNode, Transition,
};

const STARTUP: NodeId = 0;
const IDLE: NodeId = 1;
const DRIVING: NodeId = 2;
const CONFIRMED: NodeId = 3;
const TRANSITION: NodeId = 2;
const LATCHED: NodeId = 3;

const INIT: NodeId = 0;
const OWNER_LOCAL: NodeId = 1;
const PEER_LOCAL: NodeId = 2;
const PEER_LOCAL_TIMEOUT: NodeId = 3;

fn node(id: NodeId, kind: StateKind, emit: Emit) -> StateNode {
    let name = match kind {
        StateKind::Startup => "startup",
        StateKind::Idle => "idle",
        StateKind::Driving => "driving",
        StateKind::Confirmed => "confirmed",
        StateKind::Transition => "transition",
        StateKind::Latched => "latched",
        StateKind::Init => "init",
        StateKind::OwnerLocal => "owner_local",
        StateKind::PeerLocal => "peer_local",
        StateKind::PeerLocalTimeout => "peer_local_timeout",
    };
    StateNode {
        id,
        name: name.to_string(),
        kind,
        emit,
    }
}

fn edge(from: NodeId, to: NodeId, conditions: &[Condition], action: Action) -> Transition {
    Transition {
        from,
        to,
        conditions: conditions.to_vec(),
        action,
    }
}

/// Compile the protocol layer carrying one signal.
///
/// The shape depends on whether the local role drives the primary value and
/// on the signal direction. Every non-startup node falls back to startup
/// when the peer disappears.
pub fn build_layer(signal: &SignalPlan, config: &LinkConfig) -> StateMachineDescription {
    let emits_primary = signal.emits_primary();
    let two_way = signal.direction == Direction::TwoWay;

    let (nodes, mut transitions) = if emits_primary {
        emit_side(two_way, config)
    } else {
        sense_side(two_way, config)
    };

    let mut lost_peer: Vec<Transition> = nodes
        .iter()
        .filter(|node| node.id != STARTUP)
        .map(|node| edge(node.id, STARTUP, &[Condition::PeerAbsent], Action::Reset))
        .collect();
    lost_peer.append(&mut transitions);

    debug!(
        signal = %signal.name,
        layer = signal.layer.as_str(),
        emits_primary,
        nodes = nodes.len(),
        transitions = lost_peer.len(),
        "layer built"
    );

    StateMachineDescription {
        signal: signal.name.clone(),
        layer: signal.layer,
        emits_primary,
        initial: STARTUP,
        nodes,
        transitions: lost_peer,
    }
}

fn emit_side(two_way: bool, config: &LinkConfig) -> (Vec<StateNode>, Vec<Transition>) {
    let mut nodes = vec![
        node(STARTUP, StateKind::Startup, Emit::Absent),
        node(IDLE, StateKind::Idle, Emit::Absent),
        node(DRIVING, StateKind::Driving, Emit::Local),
    ];
    let mut transitions = vec![
        edge(
            STARTUP,
            DRIVING,
            &[Condition::PeerPresent, Condition::LocalKnown],
            Action::LatchLocal,
        ),
        edge(
            STARTUP,
            IDLE,
            &[Condition::PeerPresent, Condition::LocalUnknown],
            Action::None,
        ),
        edge(IDLE, DRIVING, &[Condition::LocalKnown], Action::LatchLocal),
        edge(DRIVING, IDLE, &[Condition::LocalUnknown], Action::ReleaseLocal),
    ];

    if two_way {
        nodes.push(node(CONFIRMED, StateKind::Confirmed, Emit::Local));
        transitions.extend([
            edge(
                DRIVING,
                CONFIRMED,
                &[Condition::AckMatches(config.stable_ticks)],
                Action::None,
            ),
            edge(
                DRIVING,
                STARTUP,
                &[Condition::DwellElapsed(config.liveness_ticks())],
                Action::None,
            ),
            edge(CONFIRMED, STARTUP, &[Condition::LocalChanged], Action::None),
            edge(CONFIRMED, IDLE, &[Condition::LocalUnknown], Action::ReleaseLocal),
        ]);
    } else {
        transitions.push(edge(DRIVING, STARTUP, &[Condition::LocalChanged], Action::None));
    }

    (nodes, transitions)
}

fn sense_side(two_way: bool, config: &LinkConfig) -> (Vec<StateNode>, Vec<Transition>) {
    let latched_emit = if two_way { Emit::Latched } else { Emit::Absent };
    let nodes = vec![
        node(STARTUP, StateKind::Startup, Emit::Absent),
        node(IDLE, StateKind::Idle, Emit::Absent),
        node(TRANSITION, StateKind::Transition, Emit::Absent),
        node(LATCHED, StateKind::Latched, latched_emit),
    ];
    let transitions = vec![
        edge(STARTUP, IDLE, &[Condition::PeerPresent], Action::None),
        edge(IDLE, TRANSITION, &[Condition::SensedValue], Action::TakeCandidate),
        edge(
            TRANSITION,
            LATCHED,
            &[Condition::SensedStable(config.stable_ticks)],
            Action::CommitCandidate,
        ),
        edge(
            TRANSITION,
            TRANSITION,
            &[Condition::SensedNew],
            Action::TakeCandidate,
        ),
        edge(
            TRANSITION,
            LATCHED,
            &[Condition::SensedLost, Condition::HasLatched],
            Action::ClearCandidate,
        ),
        edge(
            TRANSITION,
            IDLE,
            &[Condition::SensedLost],
            Action::ClearCandidate,
        ),
        edge(LATCHED, TRANSITION, &[Condition::SensedDiffers], Action::TakeCandidate),
    ];
    (nodes, transitions)
}

/// Compile the liveness/ownership layer shared by every signal of a link.
pub fn build_presence_layer(config: &LinkConfig) -> StateMachineDescription {
    let nodes = vec![
        node(INIT, StateKind::Init, Emit::Beacon),
        node(OWNER_LOCAL, StateKind::OwnerLocal, Emit::Beacon),
        node(PEER_LOCAL, StateKind::PeerLocal, Emit::Beacon),
        node(PEER_LOCAL_TIMEOUT, StateKind::PeerLocalTimeout, Emit::Beacon),
    ];
    let transitions = vec![
        edge(
            INIT,
            OWNER_LOCAL,
            &[Condition::HostLocal, Condition::BeaconSensed],
            Action::None,
        ),
        edge(
            INIT,
            PEER_LOCAL,
            &[Condition::HostRemote, Condition::BeaconSensed],
            Action::None,
        ),
        edge(
            PEER_LOCAL,
            PEER_LOCAL_TIMEOUT,
            &[Condition::BeaconStale(config.liveness_ticks())],
            Action::None,
        ),
        edge(PEER_LOCAL_TIMEOUT, INIT, &[Condition::Always], Action::None),
    ];

    StateMachineDescription {
        signal: PRESENCE_PARAMETER.to_string(),
        layer: LayerKind::LocalPresence,
        emits_primary: true,
        initial: INIT,
        nodes,
        transitions,
    }
}
