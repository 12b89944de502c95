use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{Result, SubstrateError};
use crate::traits::{check_word, ContactField};

/// Physical behavior of a [`SimulatedField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConfig {
    /// Ticks a moved contact needs before it can register contact.
    pub settle_ticks: u64,
    /// Maximum number of differing word bits that still register contact.
    pub tolerance: u32,
    /// Highest addressable slot position.
    pub max_position: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            settle_ticks: 1,
            tolerance: 0,
            max_position: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Placed {
    word: u32,
    since: u64,
}

#[derive(Debug, Clone, Copy)]
struct Noise {
    mask: u32,
    until: u64,
}

#[derive(Debug, Default)]
struct Site {
    emitter: Option<Placed>,
    probe: Option<Placed>,
    blocked: bool,
    noise: Option<Noise>,
}

/// In-memory contact field shared by two simulated participants.
///
/// Models settle time, occlusion (a blocked position never registers
/// contact) and transient bit noise on emitted words.
#[derive(Debug, Default)]
pub struct SimulatedField {
    sites: BTreeMap<u32, Site>,
    config: FieldConfig,
    now: u64,
}

impl SimulatedField {
    /// Create an empty field with default physics.
    pub fn new() -> Self {
        Self::with_config(FieldConfig::default())
    }

    /// Create an empty field with explicit physics.
    pub fn with_config(config: FieldConfig) -> Self {
        Self {
            sites: BTreeMap::new(),
            config,
            now: 0,
        }
    }

    /// Field configuration.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Occlude a position so its probe can no longer touch the emitter.
    pub fn block(&mut self, position: u32) {
        self.sites.entry(position).or_default().blocked = true;
    }

    /// Remove an occlusion added by [`block`](Self::block).
    pub fn unblock(&mut self, position: u32) {
        if let Some(site) = self.sites.get_mut(&position) {
            site.blocked = false;
        }
    }

    /// Whether a position is currently occluded.
    pub fn is_blocked(&self, position: u32) -> bool {
        self.sites.get(&position).is_some_and(|site| site.blocked)
    }

    /// Flip `mask` bits of the emitted word at `position` for `ticks` ticks.
    pub fn inject_noise(&mut self, position: u32, mask: u32, ticks: u64) {
        let until = self.now.saturating_add(ticks);
        self.sites.entry(position).or_default().noise = Some(Noise { mask, until });
    }

    /// Word currently driven at `position`, if any.
    pub fn emitted(&self, position: u32) -> Option<u32> {
        self.sites
            .get(&position)
            .and_then(|site| site.emitter.map(|placed| placed.word))
    }

    /// Word the probe at `position` is tuned to, if any.
    pub fn probed(&self, position: u32) -> Option<u32> {
        self.sites
            .get(&position)
            .and_then(|site| site.probe.map(|placed| placed.word))
    }

    fn check_position(&self, position: u32) -> Result<()> {
        if position > self.config.max_position {
            return Err(SubstrateError::OutOfRange {
                position,
                max: self.config.max_position,
            });
        }
        Ok(())
    }

    fn settled(&self, placed: &Placed) -> bool {
        self.now.saturating_sub(placed.since) >= self.config.settle_ticks
    }
}

fn place(slot: &mut Option<Placed>, word: Option<u32>, now: u64) {
    if slot.map(|placed| placed.word) == word {
        return;
    }
    *slot = word.map(|word| Placed { word, since: now });
}

impl ContactField for SimulatedField {
    fn drive(&mut self, position: u32, word: Option<u32>) -> Result<()> {
        self.check_position(position)?;
        check_word(word)?;
        let now = self.now;
        let site = self.sites.entry(position).or_default();
        place(&mut site.emitter, word, now);
        trace!(position, ?word, "emitter placed");
        Ok(())
    }

    fn probe(&mut self, position: u32, word: Option<u32>) -> Result<()> {
        self.check_position(position)?;
        check_word(word)?;
        let now = self.now;
        let site = self.sites.entry(position).or_default();
        place(&mut site.probe, word, now);
        Ok(())
    }

    fn contact(&self, position: u32) -> bool {
        let Some(site) = self.sites.get(&position) else {
            return false;
        };
        if site.blocked {
            return false;
        }
        let (Some(emitter), Some(probe)) = (site.emitter, site.probe) else {
            return false;
        };
        if !self.settled(&emitter) || !self.settled(&probe) {
            return false;
        }

        let mut emitted = emitter.word;
        if let Some(noise) = site.noise {
            if noise.until > self.now {
                emitted ^= noise.mask;
            }
        }
        (emitted ^ probe.word).count_ones() <= self.config.tolerance
    }

    fn advance(&mut self) {
        self.now += 1;
        let now = self.now;
        for site in self.sites.values_mut() {
            if site.noise.is_some_and(|noise| noise.until <= now) {
                site.noise = None;
            }
        }
    }

    fn now(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled_pair(field: &mut SimulatedField, position: u32, emit: u32, probe: u32) {
        field.drive(position, Some(emit)).unwrap();
        field.probe(position, Some(probe)).unwrap();
        field.advance();
    }

    #[test]
    fn contact_requires_settle_time() {
        let mut field = SimulatedField::new();
        field.drive(8, Some(0x1D9)).unwrap();
        field.probe(8, Some(0x1D9)).unwrap();
        assert!(!field.contact(8));

        field.advance();
        assert!(field.contact(8));
    }

    #[test]
    fn mismatched_words_never_touch() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 4, 0x1D9, 0x26B);
        assert!(!field.contact(4));
    }

    #[test]
    fn moving_a_contact_restarts_settling() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 4, 0x1D9, 0x1D9);
        assert!(field.contact(4));

        field.probe(4, Some(0x26B)).unwrap();
        field.drive(4, Some(0x26B)).unwrap();
        assert!(!field.contact(4));
        field.advance();
        assert!(field.contact(4));
    }

    #[test]
    fn re_placing_same_word_keeps_settled_state() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 4, 0x1D9, 0x1D9);
        field.drive(4, Some(0x1D9)).unwrap();
        assert!(field.contact(4));
    }

    #[test]
    fn blocked_position_has_no_contact() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 0, 0x1D9, 0x1D9);
        field.block(0);
        assert!(field.is_blocked(0));
        assert!(!field.contact(0));

        field.unblock(0);
        assert!(field.contact(0));
    }

    #[test]
    fn noise_breaks_contact_until_it_expires() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 12, 0x1D9, 0x1D9);
        field.inject_noise(12, 0b1, 2);
        assert!(!field.contact(12));

        field.advance();
        assert!(!field.contact(12));
        field.advance();
        assert!(field.contact(12));
    }

    #[test]
    fn tolerance_absorbs_single_bit_noise() {
        let mut field = SimulatedField::with_config(FieldConfig {
            tolerance: 1,
            ..FieldConfig::default()
        });
        settled_pair(&mut field, 12, 0x1D9, 0x1D9);
        field.inject_noise(12, 0b100, 5);
        assert!(field.contact(12));

        field.inject_noise(12, 0b101, 5);
        assert!(!field.contact(12));
    }

    #[test]
    fn retracted_emitter_loses_contact() {
        let mut field = SimulatedField::new();
        settled_pair(&mut field, 3, 0x1D9, 0x1D9);
        field.drive(3, None).unwrap();
        assert!(!field.contact(3));
        assert_eq!(field.emitted(3), None);
        assert_eq!(field.probed(3), Some(0x1D9));
    }

    #[test]
    fn rejects_positions_outside_extent() {
        let mut field = SimulatedField::with_config(FieldConfig {
            max_position: 16,
            ..FieldConfig::default()
        });
        let err = field.drive(17, Some(1)).unwrap_err();
        assert!(matches!(err, SubstrateError::OutOfRange { position: 17, max: 16 }));
    }
}
