use std::collections::BTreeMap;
use std::sync::Arc;

use proxlink_codeword::Codeword;
use proxlink_plan::{ContactSlot, PhasePlan, SignalPlan, SlotPlan, SlotSet, ABSENT_SYMBOL};
use proxlink_spec::{Fallback, Role};
use proxlink_substrate::ContactField;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::artifact::Artifact;
use crate::decoder::{Decoder, Observation, Sensed};
use crate::description::{Action, Emit, StateKind, StateMachineDescription};
use crate::error::{LinkError, Result};
use crate::machine::{LayerInputs, LayerRunner, LivenessState, ProtocolState};
use crate::presence::Presence;

/// Something worth reporting that happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TickEvent {
    /// A signal layer changed its protocol state.
    Transition {
        signal: String,
        from: ProtocolState,
        to: ProtocolState,
    },
    /// A remote value was latched into the signal's output.
    Committed { signal: String, value: i32 },
    /// The peer echoed the driven value of a two-way signal.
    Acknowledged { signal: String, value: i32 },
    /// No beacon contact for the whole liveness timeout.
    LinkDown,
    /// Beacon contact after the link was down.
    LinkUp,
    /// The liveness layer gave up on a remote instance.
    LivenessTimeout,
}

/// Summary of one [`Participant::step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub peer_present: bool,
    pub link_down: bool,
    pub liveness: LivenessState,
    pub events: Vec<TickEvent>,
}

#[derive(Debug, Clone)]
struct SignalRuntime {
    plan: SignalPlan,
    runner: LayerRunner,
    decoder: Decoder,
    input: Option<i32>,
    output: i32,
}

impl SignalRuntime {
    fn new(plan: SignalPlan, description: Arc<StateMachineDescription>, tolerance: u32) -> Self {
        let decoder = Decoder::for_plan(&plan, tolerance);
        let output = plan.default;
        Self {
            plan,
            runner: LayerRunner::new(description),
            decoder,
            input: None,
            output,
        }
    }

    /// Slots whose contacts feed this signal's decoder.
    fn sensed_set(&self) -> Option<&SlotSet> {
        if self.plan.emits_primary() {
            self.plan.ack.as_ref()
        } else {
            Some(&self.plan.primary)
        }
    }

    /// Slots this signal drives.
    fn emitted_set(&self) -> Option<&SlotSet> {
        if self.plan.emits_primary() {
            Some(&self.plan.primary)
        } else {
            self.plan.ack.as_ref()
        }
    }

    /// Per-slot symbols to drive for the current node.
    fn emitted_symbols(&self, slots: usize) -> Vec<u16> {
        let value = match self.runner.emit() {
            Emit::Local => self.runner.driving(),
            Emit::Latched => self.runner.latched(),
            Emit::Absent | Emit::Beacon => None,
        };
        value
            .and_then(|value| self.plan.symbols_for(value))
            .unwrap_or_else(|| vec![ABSENT_SYMBOL; slots])
    }
}

/// One side of a link, driven one tick at a time by its host.
///
/// A tick has three parts that run in order: [`sample`](Self::sample)
/// reads the contacts settled since the previous tick,
/// [`step`](Self::step) advances every layer on those samples, and
/// [`drive`](Self::drive) places emitters and the next probe phase.
/// [`tick`](Self::tick) runs all three for a participant that owns its
/// field.
#[derive(Debug, Clone)]
pub struct Participant {
    artifact: Arc<Artifact>,
    plan: SlotPlan,
    phases: PhasePlan,
    presence: Presence,
    liveness: LayerRunner,
    signals: Vec<SignalRuntime>,
    forwards: BTreeMap<String, i32>,
    observations: BTreeMap<u32, Observation>,
    beacon_sensed: bool,
    host_local: bool,
    was_down: bool,
    tick: u64,
}

fn missing(what: &str) -> LinkError {
    LinkError::InvalidArtifact(format!("missing {what}"))
}

fn runtimes(artifact: &Artifact, plan: &SlotPlan) -> Result<Vec<SignalRuntime>> {
    let tolerance = artifact.config.nibble_escape_tolerance;
    plan.signals
        .iter()
        .map(|signal| {
            let description = artifact
                .layer(&signal.name)
                .cloned()
                .ok_or_else(|| missing(&format!("layer for '{}'", signal.name)))?;
            Ok(SignalRuntime::new(
                signal.clone(),
                Arc::new(description),
                tolerance,
            ))
        })
        .collect()
}

impl Participant {
    pub fn new(artifact: Arc<Artifact>) -> Result<Self> {
        artifact.validate()?;
        let plan = artifact.plan().cloned().ok_or_else(|| missing("plan"))?;
        let phases = artifact.phases().cloned().ok_or_else(|| missing("phases"))?;
        let presence_layer = artifact
            .presence_layer()
            .cloned()
            .ok_or_else(|| missing("presence layer"))?;
        let signals = runtimes(&artifact, &plan)?;

        debug!(
            link = %artifact.link,
            role = %artifact.role,
            signals = signals.len(),
            phases = phases.len(),
            "participant created"
        );

        Ok(Self {
            presence: Presence::new(&artifact.config),
            liveness: LayerRunner::new(Arc::new(presence_layer)),
            artifact,
            plan,
            phases,
            signals,
            forwards: BTreeMap::new(),
            observations: BTreeMap::new(),
            beacon_sensed: false,
            host_local: false,
            was_down: true,
            tick: 0,
        })
    }

    /// Switch to a recompiled artifact of the same role.
    ///
    /// Signals whose plan and layer are unchanged keep their runtime state,
    /// including latched values and host inputs. Everything else restarts.
    pub fn reload(&mut self, artifact: Arc<Artifact>) -> Result<()> {
        artifact.validate()?;
        if artifact.role != self.artifact.role {
            return Err(LinkError::InvalidArtifact(format!(
                "cannot reload a {} artifact into a {} participant",
                artifact.role, self.artifact.role
            )));
        }
        let plan = artifact.plan().cloned().ok_or_else(|| missing("plan"))?;
        let phases = artifact.phases().cloned().ok_or_else(|| missing("phases"))?;
        let presence_layer = artifact
            .presence_layer()
            .ok_or_else(|| missing("presence layer"))?;

        let mut previous: BTreeMap<String, SignalRuntime> = self
            .signals
            .drain(..)
            .map(|runtime| (runtime.plan.name.clone(), runtime))
            .collect();
        let mut kept = 0usize;
        let mut signals = Vec::with_capacity(plan.signals.len());
        for fresh in runtimes(&artifact, &plan)? {
            match previous.remove(&fresh.plan.name) {
                Some(old)
                    if old.plan == fresh.plan
                        && old.runner.description() == fresh.runner.description() =>
                {
                    kept += 1;
                    signals.push(old);
                }
                _ => signals.push(fresh),
            }
        }

        if **self.liveness.description() != *presence_layer {
            self.liveness = LayerRunner::new(Arc::new(presence_layer.clone()));
        }
        if artifact.config != self.artifact.config {
            self.presence = Presence::new(&artifact.config);
            self.was_down = true;
        }

        debug!(
            link = %artifact.link,
            role = %artifact.role,
            kept,
            restarted = signals.len() - kept,
            "participant reloaded"
        );

        self.signals = signals;
        self.plan = plan;
        self.phases = phases;
        self.observations.clear();
        self.artifact = artifact;
        Ok(())
    }

    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    pub fn role(&self) -> Role {
        self.artifact.role
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    fn runtime(&self, name: &str) -> Result<&SignalRuntime> {
        self.signals
            .iter()
            .find(|runtime| runtime.plan.name == name)
            .ok_or_else(|| LinkError::UnknownSignal(name.to_string()))
    }

    fn runtime_mut(&mut self, name: &str) -> Result<&mut SignalRuntime> {
        self.signals
            .iter_mut()
            .find(|runtime| runtime.plan.name == name)
            .ok_or_else(|| LinkError::UnknownSignal(name.to_string()))
    }

    /// Write the host input (`<name>/in`) of a signal this role sends.
    pub fn set_input(&mut self, name: &str, value: i32) -> Result<()> {
        let runtime = self.runtime_mut(name)?;
        if !runtime.plan.emits_primary() {
            return Err(LinkError::NotWritable(name.to_string()));
        }
        if !runtime.plan.contains(value) {
            return Err(LinkError::ValueOutOfRange {
                signal: name.to_string(),
                value,
            });
        }
        runtime.input = Some(value);
        Ok(())
    }

    /// Forget the host input of a signal; the layer idles until a new one.
    pub fn clear_input(&mut self, name: &str) -> Result<()> {
        let runtime = self.runtime_mut(name)?;
        if !runtime.plan.emits_primary() {
            return Err(LinkError::NotWritable(name.to_string()));
        }
        runtime.input = None;
        Ok(())
    }

    /// Publish a host parameter that `Forward` fallbacks can mirror.
    pub fn set_forward(&mut self, name: &str, value: i32) {
        self.forwards.insert(name.to_string(), value);
    }

    /// Tell the liveness layer whether this instance is the local one.
    pub fn set_host_local(&mut self, local: bool) {
        self.host_local = local;
    }

    /// Current value of a signal's output parameter (`<name>`).
    pub fn output(&self, name: &str) -> Result<i32> {
        self.runtime(name).map(|runtime| runtime.output)
    }

    pub fn state(&self, name: &str) -> Result<ProtocolState> {
        self.runtime(name)
            .map(|runtime| runtime.runner.protocol_state())
    }

    /// Whether the peer confirmed the value this role drives.
    pub fn acknowledged(&self, name: &str) -> Result<bool> {
        self.runtime(name)
            .map(|runtime| runtime.runner.kind() == StateKind::Confirmed)
    }

    pub fn liveness(&self) -> LivenessState {
        self.liveness.liveness_state()
    }

    pub fn peer_present(&self) -> bool {
        self.presence.peer_present(self.tick)
    }

    pub fn link_down(&self) -> bool {
        self.presence.link_down(self.tick)
    }

    /// Read the contacts for the current tick.
    pub fn sample<F: ContactField + ?Sized>(&mut self, field: &F) {
        self.beacon_sensed = field.contact(self.plan.peer_beacon.position);
        self.presence.observe(self.tick, self.beacon_sensed);

        self.observations.clear();
        let Some(cursor) = self.phases.phase_at(self.tick) else {
            return;
        };
        let Some(phase) = self.phases.phase(cursor.index) else {
            return;
        };
        for probe in &phase.probes {
            let observation = if !cursor.sampling {
                Observation::Settling
            } else if field.contact(probe.position) {
                Observation::Hit(probe.driver)
            } else {
                Observation::Miss(probe.driver)
            };
            self.observations.insert(probe.position, observation);
        }
    }

    /// Advance every layer on the samples of the current tick.
    pub fn step(&mut self) -> TickReport {
        let tick = self.tick;
        let peer_present = self.presence.peer_present(tick);
        let link_down = self.presence.link_down(tick);
        let beacon_age = self.presence.beacon_age(tick);
        let mut events = Vec::new();

        if link_down != self.was_down {
            if link_down {
                warn!(link = %self.artifact.link, role = %self.artifact.role, tick, "link down");
                events.push(TickEvent::LinkDown);
            } else {
                debug!(link = %self.artifact.link, role = %self.artifact.role, tick, "link up");
                events.push(TickEvent::LinkUp);
            }
            self.was_down = link_down;
        }

        let presence_inputs = LayerInputs {
            peer_present,
            host_local: self.host_local,
            beacon_sensed: self.beacon_sensed,
            beacon_age,
            ..LayerInputs::default()
        };
        if let Some(step) = self.liveness.step(&presence_inputs) {
            if step.to == StateKind::PeerLocalTimeout {
                warn!(
                    link = %self.artifact.link,
                    role = %self.artifact.role,
                    tick,
                    "liveness timeout"
                );
                events.push(TickEvent::LivenessTimeout);
            }
        }

        for index in 0..self.signals.len() {
            self.step_signal(index, peer_present, &mut events);
        }
        if link_down {
            self.apply_fallbacks();
        }

        TickReport {
            tick,
            peer_present,
            link_down,
            liveness: self.liveness.liveness_state(),
            events,
        }
    }

    fn step_signal(&mut self, index: usize, peer_present: bool, events: &mut Vec<TickEvent>) {
        let observations = &self.observations;
        let runtime = &mut self.signals[index];
        let sensed = match runtime.sensed_set() {
            Some(set) => {
                let observed: Vec<Observation> = set
                    .slots
                    .iter()
                    .map(|slot| observations.get(&slot.position).copied().unwrap_or_default())
                    .collect();
                let plan = &runtime.plan;
                runtime.decoder.decode(&observed, plan)
            }
            None => Sensed::Nothing,
        };

        let emits_primary = runtime.plan.emits_primary();
        let inputs = LayerInputs {
            peer_present,
            local: runtime.input.filter(|_| emits_primary),
            sensed: if emits_primary { Sensed::Nothing } else { sensed },
            ack: if emits_primary { sensed } else { Sensed::Nothing },
            ..LayerInputs::default()
        };

        let before = runtime.runner.protocol_state();
        let step = runtime.runner.step(&inputs);
        let after = runtime.runner.protocol_state();
        let signal = &runtime.plan.name;

        if before != after {
            trace!(signal = %signal, %before, %after, "signal state changed");
            events.push(TickEvent::Transition {
                signal: signal.clone(),
                from: before,
                to: after,
            });
        }
        if let Some(step) = step {
            if step.action == Action::CommitCandidate {
                if let Some(value) = runtime.runner.latched() {
                    runtime.output = value;
                    events.push(TickEvent::Committed {
                        signal: signal.clone(),
                        value,
                    });
                }
            }
            if step.to == StateKind::Confirmed {
                if let Some(value) = runtime.runner.driving() {
                    events.push(TickEvent::Acknowledged {
                        signal: signal.clone(),
                        value,
                    });
                }
            }
        }
        if emits_primary {
            if let Some(value) = runtime.runner.driving() {
                runtime.output = value;
            }
        }
    }

    fn apply_fallbacks(&mut self) {
        let outputs: BTreeMap<String, i32> = self
            .signals
            .iter()
            .map(|runtime| (runtime.plan.name.clone(), runtime.output))
            .collect();
        for runtime in self.signals.iter_mut().filter(|r| !r.plan.emits_primary()) {
            match &runtime.plan.fallback {
                Fallback::Hold => {}
                Fallback::Reset(value) => runtime.output = *value,
                Fallback::Forward(source) => {
                    let mirrored = self
                        .forwards
                        .get(source)
                        .or_else(|| outputs.get(source))
                        .copied();
                    if let Some(value) = mirrored {
                        runtime.output = value.clamp(runtime.plan.min, runtime.plan.max);
                    }
                }
            }
        }
    }

    /// Place beacons, emitters and the probes of the next tick, then finish
    /// the tick.
    pub fn drive<F: ContactField + ?Sized>(&mut self, field: &mut F) -> Result<()> {
        place_beacon(field, &self.plan.local_beacon, true)?;
        place_beacon(field, &self.plan.peer_beacon, false)?;

        for runtime in &self.signals {
            let Some(set) = runtime.emitted_set() else {
                continue;
            };
            let symbols = runtime.emitted_symbols(set.len());
            for (slot, symbol) in set.slots.iter().zip(symbols) {
                let word: Option<Codeword> = slot.codebook.codeword(symbol);
                field.drive(slot.position, word)?;
            }
        }

        let next = self.tick + 1;
        if let Some(cursor) = self.phases.phase_at(next) {
            if let Some(phase) = self.phases.phase(cursor.index) {
                for probe in &phase.probes {
                    field.probe(probe.position, Some(probe.codeword))?;
                }
            }
        }

        self.tick = next;
        Ok(())
    }

    /// Run a full tick against a field this participant has to itself.
    pub fn tick<F: ContactField + ?Sized>(&mut self, field: &mut F) -> Result<TickReport> {
        self.sample(field);
        let report = self.step();
        self.drive(field)?;
        Ok(report)
    }
}

fn place_beacon<F: ContactField + ?Sized>(
    field: &mut F,
    beacon: &ContactSlot,
    local: bool,
) -> Result<()> {
    let word = beacon.codebook.codeword(1);
    if local {
        field.drive(beacon.position, word)?;
    } else {
        field.probe(beacon.position, word)?;
    }
    Ok(())
}
