use std::sync::Arc;

use proxlink_spec::{LinkConfig, LinkSpec, Role};
use proxlink_substrate::{ContactField, SimulatedField};
use serde::Serialize;
use tracing::debug;

use crate::artifact::Artifact;
use crate::compiler::{compile, verify_pair};
use crate::error::Result;
use crate::participant::{Participant, TickReport};

/// Reports of both participants for one lockstep tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopbackTick {
    pub transmitter: TickReport,
    pub receiver: TickReport,
}

/// Both sides of a link sharing one [`SimulatedField`].
///
/// Each tick both participants sample, then both step, then both drive,
/// and finally the field advances. Neither side ever sees the other's
/// state except through contacts.
#[derive(Debug)]
pub struct Loopback {
    transmitter: Participant,
    receiver: Participant,
    field: SimulatedField,
}

impl Loopback {
    /// Pair two artifacts on a default field.
    pub fn new(transmitter: Arc<Artifact>, receiver: Arc<Artifact>) -> Result<Self> {
        Self::with_field(transmitter, receiver, SimulatedField::new())
    }

    /// Pair two artifacts on an explicit field.
    pub fn with_field(
        transmitter: Arc<Artifact>,
        receiver: Arc<Artifact>,
        field: SimulatedField,
    ) -> Result<Self> {
        verify_pair(&transmitter, &receiver)?;
        Ok(Self {
            transmitter: Participant::new(transmitter)?,
            receiver: Participant::new(receiver)?,
            field,
        })
    }

    /// Compile both roles of `spec` with default timing.
    pub fn from_spec(spec: &LinkSpec) -> Result<Self> {
        Self::from_spec_with_config(spec, &LinkConfig::default())
    }

    pub fn from_spec_with_config(spec: &LinkSpec, config: &LinkConfig) -> Result<Self> {
        let transmitter = compile(spec, config, Role::Transmitter)?;
        let receiver = compile(spec, config, Role::Receiver)?;
        Self::new(Arc::new(transmitter), Arc::new(receiver))
    }

    pub fn transmitter(&self) -> &Participant {
        &self.transmitter
    }

    pub fn transmitter_mut(&mut self) -> &mut Participant {
        &mut self.transmitter
    }

    pub fn receiver(&self) -> &Participant {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut Participant {
        &mut self.receiver
    }

    pub fn participant(&self, role: Role) -> &Participant {
        match role {
            Role::Transmitter => &self.transmitter,
            Role::Receiver => &self.receiver,
        }
    }

    pub fn participant_mut(&mut self, role: Role) -> &mut Participant {
        match role {
            Role::Transmitter => &mut self.transmitter,
            Role::Receiver => &mut self.receiver,
        }
    }

    pub fn field(&self) -> &SimulatedField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut SimulatedField {
        &mut self.field
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.transmitter.ticks()
    }

    /// Advance both participants by one tick.
    pub fn step(&mut self) -> Result<LoopbackTick> {
        self.transmitter.sample(&self.field);
        self.receiver.sample(&self.field);
        let transmitter = self.transmitter.step();
        let receiver = self.receiver.step();
        self.transmitter.drive(&mut self.field)?;
        self.receiver.drive(&mut self.field)?;
        self.field.advance();
        Ok(LoopbackTick {
            transmitter,
            receiver,
        })
    }

    /// Advance `ticks` ticks, returning every report.
    pub fn run(&mut self, ticks: u64) -> Result<Vec<LoopbackTick>> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Step until `done` holds, for at most `max_ticks` ticks.
    ///
    /// Returns the number of ticks taken, or `None` if `done` never held.
    pub fn run_until(
        &mut self,
        max_ticks: u64,
        mut done: impl FnMut(&Loopback) -> bool,
    ) -> Result<Option<u64>> {
        for taken in 0..=max_ticks {
            if done(self) {
                return Ok(Some(taken));
            }
            if taken < max_ticks {
                self.step()?;
            }
        }
        Ok(None)
    }

    fn withdrawn_positions(&self, role: Role) -> Vec<u32> {
        let Some(plan) = self.participant(role).artifact().plan() else {
            return Vec::new();
        };
        let mut positions = vec![plan.local_beacon.position];
        positions.extend(plan.emitted_slots().iter().map(|slot| slot.position));
        positions
    }

    /// Hide everything `role` drives from its peer.
    pub fn withdraw(&mut self, role: Role) {
        let positions = self.withdrawn_positions(role);
        debug!(%role, slots = positions.len(), "participant withdrawn");
        for position in positions {
            self.field.block(position);
        }
    }

    /// Undo [`withdraw`](Self::withdraw).
    pub fn restore(&mut self, role: Role) {
        let positions = self.withdrawn_positions(role);
        debug!(%role, slots = positions.len(), "participant restored");
        for position in positions {
            self.field.unblock(position);
        }
    }

    pub fn is_withdrawn(&self, role: Role) -> bool {
        self.participant(role)
            .artifact()
            .plan()
            .is_some_and(|plan| self.field.is_blocked(plan.local_beacon.position))
    }

    /// Corrupt the word emitted at `position` for `ticks` ticks.
    pub fn inject_noise(&mut self, position: u32, mask: u32, ticks: u64) {
        self.field.inject_noise(position, mask, ticks);
    }
}
