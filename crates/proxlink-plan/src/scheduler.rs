use proxlink_codeword::Codeword;
use proxlink_spec::LinkConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::slot::SlotPlan;

/// Probe placement for one sensed slot during one phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeSetting {
    pub slot: String,
    pub position: u32,
    pub driver: u16,
    pub codeword: Codeword,
    /// Symbol a contact in this phase decodes to.
    pub expected_symbol: u16,
    /// Value a contact in this phase decodes to, if the symbol carries one.
    pub expected_value: Option<i32>,
}

/// One step of the probe sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbePhase {
    pub index: usize,
    pub probes: Vec<ProbeSetting>,
}

impl ProbePhase {
    pub fn probe_at(&self, position: u32) -> Option<&ProbeSetting> {
        self.probes.iter().find(|probe| probe.position == position)
    }
}

/// Where a tick falls within the probe sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCursor {
    pub index: usize,
    /// Ticks elapsed since the phase started.
    pub offset: u64,
    /// Probes have settled and contacts may be sampled.
    pub sampling: bool,
}

/// Time-multiplexed probe schedule of one role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhasePlan {
    pub phases: Vec<ProbePhase>,
    pub settle_ticks: u64,
    pub sample_ticks: u64,
    pub phase_ticks: u64,
}

impl PhasePlan {
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Ticks needed to walk every phase once.
    pub fn cycle_ticks(&self) -> u64 {
        self.phase_ticks * self.phases.len() as u64
    }

    /// Phase active at `tick`, counted from the start of the sweep.
    pub fn phase_at(&self, tick: u64) -> Option<PhaseCursor> {
        if self.phases.is_empty() || self.phase_ticks == 0 {
            return None;
        }
        let index = ((tick / self.phase_ticks) % self.phases.len() as u64) as usize;
        let offset = tick % self.phase_ticks;
        Some(PhaseCursor {
            index,
            offset,
            sampling: offset >= self.settle_ticks,
        })
    }

    pub fn phase(&self, index: usize) -> Option<&ProbePhase> {
        self.phases.get(index)
    }
}

/// Build the probe sweep for the slots `plan` senses.
///
/// Phase `i` tunes every sensed slot to driver `i mod len`. Beacons are not
/// part of the sweep; they are probed continuously.
pub fn plan_phases(plan: &SlotPlan, config: &LinkConfig) -> PhasePlan {
    let sensed = plan.sensed_slots();
    let count = sensed
        .iter()
        .map(|slot| slot.codebook.len())
        .max()
        .unwrap_or(0);

    let phases: Vec<ProbePhase> = (0..count)
        .map(|index| ProbePhase {
            index,
            probes: sensed
                .iter()
                .filter_map(|slot| {
                    let driver = slot.codebook.driver((index % slot.codebook.len()) as u16)?;
                    Some(ProbeSetting {
                        slot: slot.name.clone(),
                        position: slot.position,
                        driver: driver.index,
                        codeword: driver.codeword,
                        expected_symbol: driver.index,
                        expected_value: driver.meaning,
                    })
                })
                .collect(),
        })
        .collect();

    let settle_ticks = config.settle_ticks();
    let sample_ticks = u64::from(config.stable_ticks);
    debug!(
        link = %plan.link,
        role = %plan.role,
        phases = phases.len(),
        settle_ticks,
        sample_ticks,
        "probe phases planned"
    );

    PhasePlan {
        phases,
        settle_ticks,
        sample_ticks,
        phase_ticks: settle_ticks + sample_ticks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::allocate;
    use proxlink_spec::{LinkSpec, Role, Signal};

    fn phases_for(spec: &LinkSpec, role: Role) -> PhasePlan {
        let config = LinkConfig::default();
        plan_phases(&allocate(spec, &config, role).unwrap(), &config)
    }

    #[test]
    fn phase_count_is_longest_sensed_codebook() {
        let spec = LinkSpec::new("x")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("mode", 0, 9));
        let rx = phases_for(&spec, Role::Receiver);
        assert_eq!(rx.len(), 11);
        assert_eq!(rx.settle_ticks, 2);
        assert_eq!(rx.sample_ticks, 2);
        assert_eq!(rx.phase_ticks, 4);
        assert_eq!(rx.cycle_ticks(), 44);
    }

    #[test]
    fn emitting_only_role_has_no_phases() {
        let spec = LinkSpec::new("x").with_signal(Signal::bool("grip"));
        let tx = phases_for(&spec, Role::Transmitter);
        assert!(tx.is_empty());
        assert_eq!(tx.phase_at(10), None);
    }

    #[test]
    fn short_codebooks_wrap() {
        let spec = LinkSpec::new("x")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("mode", 0, 4));
        let rx = phases_for(&spec, Role::Receiver);
        assert_eq!(rx.len(), 6);

        let phase = rx.phase(4).unwrap();
        let grip = phase.probe_at(8).unwrap();
        assert_eq!(grip.driver, 1);
        assert_eq!(grip.expected_value, Some(0));
        let mode = phase.probe_at(12).unwrap();
        assert_eq!(mode.driver, 4);
        assert_eq!(mode.expected_value, Some(3));

        let absent = rx.phase(0).unwrap().probe_at(8).unwrap();
        assert_eq!(absent.expected_symbol, 0);
        assert_eq!(absent.expected_value, None);
    }

    #[test]
    fn two_way_sender_probes_acknowledgments() {
        let spec = LinkSpec::new("x").with_signal(Signal::bounded("slider", 0, 255).two_way());
        let tx = phases_for(&spec, Role::Transmitter);
        assert_eq!(tx.len(), 17);
        let positions: Vec<u32> = tx.phases[0].probes.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![16, 20]);
    }

    #[test]
    fn cursor_tracks_settling() {
        let spec = LinkSpec::new("x").with_signal(Signal::bool("grip"));
        let rx = phases_for(&spec, Role::Receiver);
        let at = |tick| rx.phase_at(tick).unwrap();
        assert_eq!(at(0).index, 0);
        assert!(!at(1).sampling);
        assert!(at(2).sampling);
        assert_eq!(at(5).index, 1);
        assert_eq!(at(5).offset, 1);
        assert_eq!(at(12).index, 0);
    }

    #[test]
    fn both_roles_compute_the_same_schedule_shape() {
        let spec = LinkSpec::new("x")
            .with_signal(Signal::bounded("level", 0, 20).two_way());
        let tx = phases_for(&spec, Role::Transmitter);
        let rx = phases_for(&spec, Role::Receiver);
        assert_eq!(tx.len(), rx.len());
        assert_ne!(tx.phases[3].probes, rx.phases[3].probes);
    }
}
