use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decoder::Sensed;
use crate::description::{Action, Condition, Emit, NodeId, StateKind, StateMachineDescription};

/// Externally visible protocol state of one signal layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ProtocolState {
    /// Nothing known; also the state before the first tick.
    Startup,
    IdleAwaitingPeer,
    /// A value is owned locally: driven from the host or latched from the peer.
    LocalDriving(i32),
    /// A remote value is being confirmed.
    RemoteDriving(i32),
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolState::Startup => f.write_str("startup"),
            ProtocolState::IdleAwaitingPeer => f.write_str("idle"),
            ProtocolState::LocalDriving(value) => write!(f, "local({value})"),
            ProtocolState::RemoteDriving(value) => write!(f, "remote({value})"),
        }
    }
}

/// State of the liveness/ownership handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    Init,
    OwnerLocal,
    PeerLocal,
    PeerLocalTimeout,
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LivenessState::Init => "init",
            LivenessState::OwnerLocal => "owner_local",
            LivenessState::PeerLocal => "peer_local",
            LivenessState::PeerLocalTimeout => "peer_local_timeout",
        };
        f.write_str(name)
    }
}

/// Values sampled at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerInputs {
    pub peer_present: bool,
    /// Host input for signals the local role drives.
    pub local: Option<i32>,
    /// Decoded primary value, for signals the local role senses.
    pub sensed: Sensed,
    /// Decoded acknowledgment echo, for two-way signals the local role drives.
    pub ack: Sensed,
    pub host_local: bool,
    pub beacon_sensed: bool,
    /// Ticks since the last beacon contact.
    pub beacon_age: Option<u64>,
}

/// A transition taken during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub from: StateKind,
    pub to: StateKind,
    pub action: Action,
}

/// Interprets a [`StateMachineDescription`].
#[derive(Debug, Clone)]
pub struct LayerRunner {
    description: Arc<StateMachineDescription>,
    current: NodeId,
    ticks: u64,
    entered_at: u64,
    driving: Option<i32>,
    latched: Option<i32>,
    candidate: Option<i32>,
    streak: u32,
    ack_streak: u32,
}

impl LayerRunner {
    pub fn new(description: Arc<StateMachineDescription>) -> Self {
        let current = description.initial;
        Self {
            description,
            current,
            ticks: 0,
            entered_at: 0,
            driving: None,
            latched: None,
            candidate: None,
            streak: 0,
            ack_streak: 0,
        }
    }

    pub fn description(&self) -> &Arc<StateMachineDescription> {
        &self.description
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn kind(&self) -> StateKind {
        self.description
            .node(self.current)
            .map_or(StateKind::Startup, |node| node.kind)
    }

    pub fn emit(&self) -> Emit {
        self.description
            .node(self.current)
            .map_or(Emit::Absent, |node| node.emit)
    }

    /// Value latched from the host and currently driven.
    pub fn driving(&self) -> Option<i32> {
        self.driving
    }

    /// Value latched from the peer.
    pub fn latched(&self) -> Option<i32> {
        self.latched
    }

    pub fn candidate(&self) -> Option<i32> {
        self.candidate
    }

    /// Ticks spent in the current node.
    pub fn dwell(&self) -> u64 {
        self.ticks - self.entered_at
    }

    pub fn protocol_state(&self) -> ProtocolState {
        let owned = |value: Option<i32>| value.map_or(ProtocolState::IdleAwaitingPeer, ProtocolState::LocalDriving);
        match self.kind() {
            StateKind::Startup | StateKind::Init => ProtocolState::Startup,
            StateKind::Idle
            | StateKind::OwnerLocal
            | StateKind::PeerLocal
            | StateKind::PeerLocalTimeout => ProtocolState::IdleAwaitingPeer,
            StateKind::Driving | StateKind::Confirmed => owned(self.driving),
            StateKind::Latched => owned(self.latched),
            StateKind::Transition => self
                .candidate
                .map_or(ProtocolState::IdleAwaitingPeer, ProtocolState::RemoteDriving),
        }
    }

    pub fn liveness_state(&self) -> LivenessState {
        match self.kind() {
            StateKind::OwnerLocal => LivenessState::OwnerLocal,
            StateKind::PeerLocal => LivenessState::PeerLocal,
            StateKind::PeerLocalTimeout => LivenessState::PeerLocalTimeout,
            _ => LivenessState::Init,
        }
    }

    /// Advance one tick, taking the first transition whose conditions hold.
    pub fn step(&mut self, inputs: &LayerInputs) -> Option<Step> {
        self.ticks += 1;

        if let Sensed::Hit(value) = inputs.sensed {
            if self.candidate == Some(value) {
                self.streak = self.streak.saturating_add(1);
            }
        }
        match inputs.ack {
            Sensed::Hit(value) if Some(value) == self.driving => {
                self.ack_streak = self.ack_streak.saturating_add(1);
            }
            Sensed::Hit(_) | Sensed::Absent => self.ack_streak = 0,
            Sensed::Nothing | Sensed::Miss(_) => {}
        }

        let (to, action) = self
            .description
            .transitions_from(self.current)
            .find(|transition| {
                transition
                    .conditions
                    .iter()
                    .all(|condition| self.holds(*condition, inputs))
            })
            .map(|transition| (transition.to, transition.action))?;

        let from = self.kind();
        self.apply(action, inputs);
        self.current = to;
        self.entered_at = self.ticks;
        let to = self.kind();

        trace!(
            signal = %self.description.signal,
            ?from,
            ?to,
            ?action,
            "layer transition"
        );
        Some(Step { from, to, action })
    }

    fn holds(&self, condition: Condition, inputs: &LayerInputs) -> bool {
        match condition {
            Condition::PeerPresent => inputs.peer_present,
            Condition::PeerAbsent => !inputs.peer_present,
            Condition::LocalKnown => inputs.local.is_some(),
            Condition::LocalUnknown => inputs.local.is_none(),
            Condition::LocalChanged => inputs.local.is_some() && inputs.local != self.driving,
            Condition::SensedValue => matches!(inputs.sensed, Sensed::Hit(_)),
            Condition::SensedDiffers => {
                matches!(inputs.sensed, Sensed::Hit(value) if self.latched != Some(value))
            }
            Condition::SensedNew => {
                matches!(inputs.sensed, Sensed::Hit(value) if self.candidate != Some(value))
            }
            Condition::SensedStable(ticks) => self.candidate.is_some() && self.streak >= ticks,
            Condition::SensedLost => match inputs.sensed {
                Sensed::Absent => true,
                Sensed::Miss(value) => self.candidate == Some(value),
                Sensed::Nothing | Sensed::Hit(_) => false,
            },
            Condition::HasLatched => self.latched.is_some(),
            Condition::AckMatches(ticks) => self.driving.is_some() && self.ack_streak >= ticks,
            Condition::DwellElapsed(ticks) => self.dwell() >= ticks,
            Condition::HostLocal => inputs.host_local,
            Condition::HostRemote => !inputs.host_local,
            Condition::BeaconSensed => inputs.beacon_sensed,
            Condition::BeaconStale(ticks) => inputs.beacon_age.is_none_or(|age| age >= ticks),
            Condition::Always => true,
        }
    }

    fn apply(&mut self, action: Action, inputs: &LayerInputs) {
        match action {
            Action::None => {}
            Action::LatchLocal => {
                self.driving = inputs.local;
                self.ack_streak = 0;
            }
            Action::ReleaseLocal => {
                self.driving = None;
                self.ack_streak = 0;
            }
            Action::TakeCandidate => {
                if let Sensed::Hit(value) = inputs.sensed {
                    self.candidate = Some(value);
                    self.streak = 1;
                }
            }
            Action::CommitCandidate => {
                self.latched = self.candidate.take();
                self.streak = 0;
            }
            Action::ClearCandidate => {
                self.candidate = None;
                self.streak = 0;
            }
            Action::Reset => {
                self.driving = None;
                self.latched = None;
                self.candidate = None;
                self.streak = 0;
                self.ack_streak = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{build_layer, build_presence_layer};
    use proxlink_plan::allocate;
    use proxlink_spec::{LinkConfig, LinkSpec, Role, Signal};

    fn runner(signal: Signal, role: Role) -> LayerRunner {
        let config = LinkConfig::default();
        let spec = LinkSpec::new("x").with_signal(signal);
        let plan = allocate(&spec, &config, role).unwrap();
        LayerRunner::new(Arc::new(build_layer(&plan.signals[0], &config)))
    }

    fn present() -> LayerInputs {
        LayerInputs {
            peer_present: true,
            ..LayerInputs::default()
        }
    }

    fn sensed(value: Sensed) -> LayerInputs {
        LayerInputs {
            sensed: value,
            ..present()
        }
    }

    #[test]
    fn emitter_drives_once_peer_and_input_are_known() {
        let mut layer = runner(Signal::bool("grip"), Role::Transmitter);
        assert_eq!(layer.protocol_state(), ProtocolState::Startup);

        assert!(layer.step(&LayerInputs::default()).is_none());
        layer.step(&present());
        assert_eq!(layer.protocol_state(), ProtocolState::IdleAwaitingPeer);

        let input = LayerInputs {
            local: Some(1),
            ..present()
        };
        layer.step(&input);
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(1));
        assert_eq!(layer.emit(), Emit::Local);
    }

    #[test]
    fn one_way_emitter_restarts_on_change() {
        let mut layer = runner(Signal::bounded("level", 0, 9), Role::Transmitter);
        let at = |value| LayerInputs {
            local: Some(value),
            ..present()
        };
        layer.step(&at(3));
        assert_eq!(layer.driving(), Some(3));

        layer.step(&at(5));
        assert_eq!(layer.kind(), StateKind::Startup);
        layer.step(&at(5));
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(5));
    }

    #[test]
    fn emitter_releases_withdrawn_input() {
        let mut layer = runner(Signal::bounded("level", 0, 9), Role::Transmitter);
        let input = LayerInputs {
            local: Some(4),
            ..present()
        };
        layer.step(&input);
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(4));

        let step = layer.step(&present()).unwrap();
        assert_eq!(step.action, Action::ReleaseLocal);
        assert_eq!(layer.kind(), StateKind::Idle);
        assert_eq!(layer.driving(), None);
        assert_eq!(layer.emit(), Emit::Absent);

        layer.step(&input);
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(4));
    }

    #[test]
    fn receiver_latches_after_stable_hits() {
        let mut layer = runner(Signal::bool("grip"), Role::Receiver);
        layer.step(&present());
        assert_eq!(layer.kind(), StateKind::Idle);

        layer.step(&sensed(Sensed::Hit(1)));
        assert_eq!(layer.protocol_state(), ProtocolState::RemoteDriving(1));
        layer.step(&sensed(Sensed::Nothing));
        assert_eq!(layer.kind(), StateKind::Transition);

        let step = layer.step(&sensed(Sensed::Hit(1))).unwrap();
        assert_eq!(step.action, Action::CommitCandidate);
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(1));
        assert_eq!(layer.latched(), Some(1));
    }

    #[test]
    fn lost_candidate_returns_to_latched_value() {
        let mut layer = runner(Signal::bounded("level", 0, 9), Role::Receiver);
        layer.step(&present());
        layer.step(&sensed(Sensed::Hit(4)));
        layer.step(&sensed(Sensed::Hit(4)));
        assert_eq!(layer.latched(), Some(4));

        layer.step(&sensed(Sensed::Hit(7)));
        assert_eq!(layer.protocol_state(), ProtocolState::RemoteDriving(7));
        layer.step(&sensed(Sensed::Miss(7)));
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(4));

        layer.step(&sensed(Sensed::Hit(4)));
        assert_eq!(layer.kind(), StateKind::Latched);
    }

    #[test]
    fn lost_candidate_without_latch_goes_idle() {
        let mut layer = runner(Signal::bool("grip"), Role::Receiver);
        layer.step(&present());
        layer.step(&sensed(Sensed::Hit(1)));
        layer.step(&sensed(Sensed::Absent));
        assert_eq!(layer.protocol_state(), ProtocolState::IdleAwaitingPeer);
        assert_eq!(layer.candidate(), None);
    }

    #[test]
    fn peer_loss_resets_everything() {
        let mut layer = runner(Signal::bool("grip"), Role::Receiver);
        layer.step(&present());
        layer.step(&sensed(Sensed::Hit(1)));
        layer.step(&sensed(Sensed::Hit(1)));
        assert_eq!(layer.latched(), Some(1));

        let step = layer.step(&LayerInputs::default()).unwrap();
        assert_eq!(step.to, StateKind::Startup);
        assert_eq!(layer.latched(), None);
    }

    #[test]
    fn two_way_emitter_withholds_changes_until_acknowledged() {
        let mut layer = runner(Signal::bounded("slider", 0, 255).two_way(), Role::Transmitter);
        let with = |local, ack| LayerInputs {
            local: Some(local),
            ack,
            ..present()
        };

        layer.step(&with(173, Sensed::Nothing));
        assert_eq!(layer.driving(), Some(173));

        layer.step(&with(42, Sensed::Nothing));
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(173));

        layer.step(&with(42, Sensed::Hit(173)));
        assert_eq!(layer.kind(), StateKind::Driving);
        layer.step(&with(42, Sensed::Hit(173)));
        assert_eq!(layer.kind(), StateKind::Confirmed);

        layer.step(&with(42, Sensed::Nothing));
        assert_eq!(layer.kind(), StateKind::Startup);
        layer.step(&with(42, Sensed::Nothing));
        assert_eq!(layer.protocol_state(), ProtocolState::LocalDriving(42));
    }

    #[test]
    fn unacknowledged_value_is_rebroadcast_after_dwell() {
        let config = LinkConfig::default();
        let mut layer = runner(Signal::bool("ok").two_way(), Role::Transmitter);
        let input = LayerInputs {
            local: Some(1),
            ..present()
        };
        layer.step(&input);
        for _ in 1..config.liveness_ticks() {
            layer.step(&input);
            assert_eq!(layer.kind(), StateKind::Driving);
        }
        layer.step(&input);
        assert_eq!(layer.kind(), StateKind::Startup);
    }

    #[test]
    fn liveness_times_out_for_remote_instances() {
        let config = LinkConfig::default();
        let mut layer = LayerRunner::new(Arc::new(build_presence_layer(&config)));
        assert_eq!(layer.liveness_state(), LivenessState::Init);

        layer.step(&LayerInputs {
            beacon_sensed: true,
            beacon_age: Some(0),
            ..LayerInputs::default()
        });
        assert_eq!(layer.liveness_state(), LivenessState::PeerLocal);

        let stale = LayerInputs {
            beacon_age: Some(config.liveness_ticks()),
            ..LayerInputs::default()
        };
        layer.step(&stale);
        assert_eq!(layer.liveness_state(), LivenessState::PeerLocalTimeout);
        layer.step(&stale);
        assert_eq!(layer.liveness_state(), LivenessState::Init);
    }

    #[test]
    fn local_owner_is_terminal() {
        let mut layer = LayerRunner::new(Arc::new(build_presence_layer(&LinkConfig::default())));
        layer.step(&LayerInputs {
            host_local: true,
            beacon_sensed: true,
            beacon_age: Some(0),
            ..LayerInputs::default()
        });
        assert_eq!(layer.liveness_state(), LivenessState::OwnerLocal);
        assert!(layer.step(&LayerInputs::default()).is_none());
    }
}
