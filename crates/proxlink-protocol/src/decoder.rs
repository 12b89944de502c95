use proxlink_plan::{Encoding, SignalPlan, ABSENT_SYMBOL, NIBBLE_BITS};
use tracing::trace;

/// What one probe saw during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Observation {
    /// The probe moved recently and has not settled.
    #[default]
    Settling,
    /// Contact with the driver at this codebook index.
    Hit(u16),
    /// No contact while probing this codebook index.
    Miss(u16),
}

/// A slot set's observations translated into signal values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sensed {
    /// Nothing conclusive this tick.
    #[default]
    Nothing,
    /// The peer drives the reserved absent symbol.
    Absent,
    /// The peer drives this value.
    Hit(i32),
    /// The peer no longer drives this value.
    Miss(i32),
}

fn decode_direct(observation: Observation, plan: &SignalPlan) -> Sensed {
    match observation {
        Observation::Hit(ABSENT_SYMBOL) => Sensed::Absent,
        Observation::Hit(symbol) => plan.value_of_symbol(symbol).map_or(Sensed::Nothing, Sensed::Hit),
        Observation::Miss(symbol) => plan
            .value_of_symbol(symbol)
            .map_or(Sensed::Nothing, Sensed::Miss),
        Observation::Settling => Sensed::Nothing,
    }
}

/// Reassembles a value carried over several nibble groups.
///
/// Groups are observed independently as the probe sweep reaches their
/// symbols. The decoder keeps the latest nibble seen on each group and
/// narrows the candidate range one group per tick, most significant first.
/// A consumed group whose latest nibble disagrees for more than
/// `tolerance` ticks sends the decoder back to the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibbleDecoder {
    latest: Vec<Option<u8>>,
    narrowed: Vec<u8>,
    out_ticks: u32,
    tolerance: u32,
}

impl NibbleDecoder {
    pub fn new(groups: usize, tolerance: u32) -> Self {
        Self {
            latest: vec![None; groups],
            narrowed: Vec::with_capacity(groups),
            out_ticks: 0,
            tolerance,
        }
    }

    /// Drop the narrowing progress. Latest observations are kept.
    pub fn restart(&mut self) {
        self.narrowed.clear();
        self.out_ticks = 0;
    }

    pub fn groups(&self) -> usize {
        self.latest.len()
    }

    pub fn is_complete(&self) -> bool {
        self.narrowed.len() == self.latest.len()
    }

    /// Inclusive value range still consistent with the consumed groups.
    pub fn bounds(&self, plan: &SignalPlan) -> (i32, i32) {
        let remaining = (self.latest.len() - self.narrowed.len()) as u32 * NIBBLE_BITS;
        let prefix = self
            .narrowed
            .iter()
            .fold(0i64, |acc, nibble| (acc << NIBBLE_BITS) | i64::from(*nibble));
        let lo = i64::from(plan.min) + (prefix << remaining);
        let hi = lo + (1i64 << remaining) - 1;
        let clamp = |value: i64| value.clamp(i64::from(plan.min), i64::from(plan.max)) as i32;
        (clamp(lo), clamp(hi))
    }

    fn value(&self, plan: &SignalPlan) -> Option<i32> {
        if self.is_complete() {
            plan.value_of_nibbles(&self.narrowed)
        } else {
            None
        }
    }

    fn narrow(&mut self) {
        if let Some(Some(nibble)) = self.latest.get(self.narrowed.len()) {
            self.narrowed.push(*nibble);
        }
    }

    /// Fold one tick of per-group observations into the decoder.
    pub fn update(&mut self, observations: &[Observation], plan: &SignalPlan) -> Sensed {
        let previous = self.value(plan);
        let mut hit = vec![false; self.latest.len()];
        let mut changed = false;
        let mut absent = false;

        for (group, observation) in observations.iter().enumerate().take(self.latest.len()) {
            match *observation {
                Observation::Hit(ABSENT_SYMBOL) => {
                    self.latest[group] = None;
                    absent = true;
                }
                Observation::Hit(symbol) => {
                    let nibble = ((symbol - 1) & 0xF) as u8;
                    if self.latest[group].is_some_and(|old| old != nibble) {
                        changed = true;
                    }
                    self.latest[group] = Some(nibble);
                    hit[group] = true;
                }
                Observation::Miss(symbol) if symbol != ABSENT_SYMBOL => {
                    if self.latest[group] == Some(((symbol - 1) & 0xF) as u8) {
                        self.latest[group] = None;
                    }
                }
                _ => {}
            }
        }

        if absent {
            self.restart();
            return Sensed::Absent;
        }

        if changed {
            for (group, latest) in self.latest.iter_mut().enumerate() {
                if !hit[group] {
                    *latest = None;
                }
            }
        }

        let mismatch = self
            .narrowed
            .iter()
            .zip(&self.latest)
            .any(|(nibble, latest)| *latest != Some(*nibble));
        if mismatch {
            self.out_ticks += 1;
            if self.out_ticks <= self.tolerance {
                return Sensed::Nothing;
            }
            trace!(signal = %plan.name, "nibble decoder escaped");
            self.restart();
            self.narrow();
            return previous.map_or(Sensed::Nothing, Sensed::Miss);
        }

        self.out_ticks = 0;
        self.narrow();
        match self.value(plan) {
            Some(value) if hit.iter().any(|group| *group) => Sensed::Hit(value),
            _ => Sensed::Nothing,
        }
    }
}

/// Per-signal decoder matching the slot set encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoder {
    Direct,
    Nibbles(NibbleDecoder),
}

impl Decoder {
    pub fn for_plan(plan: &SignalPlan, tolerance: u32) -> Self {
        match plan.encoding {
            Encoding::Direct => Decoder::Direct,
            Encoding::Nibbles { groups } => {
                Decoder::Nibbles(NibbleDecoder::new(usize::from(groups), tolerance))
            }
        }
    }

    pub fn decode(&mut self, observations: &[Observation], plan: &SignalPlan) -> Sensed {
        match self {
            Decoder::Direct => observations
                .first()
                .map_or(Sensed::Nothing, |observation| decode_direct(*observation, plan)),
            Decoder::Nibbles(decoder) => decoder.update(observations, plan),
        }
    }
}
