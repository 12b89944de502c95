use std::fmt;

use proxlink_codeword::{generate_codes, Codeword};
use proxlink_spec::{Direction, Fallback, Role};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Codebook index reserved for "nothing driven".
pub const ABSENT_SYMBOL: u16 = 0;

/// Bits carried by one nibble group.
pub const NIBBLE_BITS: u32 = 4;

/// Codebook length of a nibble group slot (absent plus 16 nibbles).
pub const NIBBLE_CODEBOOK_LEN: usize = (1 << NIBBLE_BITS) + 1;

/// Parameter the presence beacons report into.
pub const PRESENCE_PARAMETER: &str = "@presence";

/// Whether the local role drives or senses a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Emit,
    Sense,
}

impl Ownership {
    pub(crate) fn for_role(owner: Role, local: Role) -> Self {
        if owner == local {
            Ownership::Emit
        } else {
            Ownership::Sense
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Ownership::Emit => Ownership::Sense,
            Ownership::Sense => Ownership::Emit,
        }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Emit => f.write_str("emit"),
            Ownership::Sense => f.write_str("sense"),
        }
    }
}

/// Closed set of protocol layer shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Bool,
    BoundedInt,
    TwoWayBoundedInt,
    LocalPresence,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Bool => "bool",
            LayerKind::BoundedInt => "bounded_int",
            LayerKind::TwoWayBoundedInt => "two_way_bounded_int",
            LayerKind::LocalPresence => "local_presence",
        }
    }
}

/// One codebook entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalDriver {
    pub index: u16,
    pub codeword: Codeword,
    /// Decoded meaning; `None` for the reserved absent entry.
    pub meaning: Option<i32>,
}

/// Ordered drivers a slot can be set to. Index 0 is always absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Codebook {
    drivers: Vec<SignalDriver>,
}

impl Codebook {
    /// Build a codebook of `len` entries; `meaning` maps indexes 1.. to values.
    pub fn build(len: usize, meaning: impl Fn(u16) -> i32) -> Result<Self> {
        let codes = generate_codes(len)?;
        let drivers = codes
            .into_iter()
            .enumerate()
            .map(|(index, codeword)| {
                let index = index as u16;
                SignalDriver {
                    index,
                    codeword,
                    meaning: (index != ABSENT_SYMBOL).then(|| meaning(index)),
                }
            })
            .collect();
        Ok(Self { drivers })
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn drivers(&self) -> &[SignalDriver] {
        &self.drivers
    }

    pub fn driver(&self, index: u16) -> Option<&SignalDriver> {
        self.drivers.get(usize::from(index))
    }

    pub fn codeword(&self, index: u16) -> Option<Codeword> {
        self.driver(index).map(|driver| driver.codeword)
    }

    pub fn codes(&self) -> Vec<Codeword> {
        self.drivers.iter().map(|driver| driver.codeword).collect()
    }
}

/// A spatial slot with a fixed owner and codebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactSlot {
    pub name: String,
    pub ownership: Ownership,
    pub position: u32,
    pub span: u32,
    /// Host parameter the slot reads from (emit) or reports into (sense).
    pub parameter: String,
    pub codebook: Codebook,
}

/// Slots carrying one value: a single slot, or one per nibble group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotSet {
    pub slots: Vec<ContactSlot>,
}

impl SlotSet {
    pub fn ownership(&self) -> Option<Ownership> {
        self.slots.first().map(|slot| slot.ownership)
    }

    pub fn positions(&self) -> Vec<u32> {
        self.slots.iter().map(|slot| slot.position).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// How a value is spread over slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Encoding {
    Direct,
    /// Most significant group first.
    Nibbles { groups: u8 },
}

impl Encoding {
    pub fn groups(&self) -> usize {
        match *self {
            Encoding::Direct => 1,
            Encoding::Nibbles { groups } => usize::from(groups),
        }
    }
}

/// Everything one participant needs to carry a single signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalPlan {
    pub name: String,
    pub layer: LayerKind,
    pub min: i32,
    pub max: i32,
    pub direction: Direction,
    pub sender: Role,
    pub fallback: Fallback,
    /// Output before the first decoded value.
    pub default: i32,
    pub encoding: Encoding,
    pub primary: SlotSet,
    /// Acknowledgment slots, present for two-way signals.
    pub ack: Option<SlotSet>,
}

impl SignalPlan {
    pub fn value_count(&self) -> u64 {
        (i64::from(self.max) - i64::from(self.min) + 1) as u64
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Whether the local role drives the primary slots.
    pub fn emits_primary(&self) -> bool {
        self.primary.ownership() == Some(Ownership::Emit)
    }

    /// Per-group symbols carrying `value`, or `None` if it is out of range.
    pub fn symbols_for(&self, value: i32) -> Option<Vec<u16>> {
        if !self.contains(value) {
            return None;
        }
        let offset = (i64::from(value) - i64::from(self.min)) as u64;
        let symbols = match self.encoding {
            Encoding::Direct => vec![offset as u16 + 1],
            Encoding::Nibbles { groups } => (0..u32::from(groups))
                .map(|k| {
                    let shift = NIBBLE_BITS * (u32::from(groups) - 1 - k);
                    ((offset >> shift) & 0xF) as u16 + 1
                })
                .collect(),
        };
        Some(symbols)
    }

    /// Value carried by a direct-encoded symbol.
    pub fn value_of_symbol(&self, symbol: u16) -> Option<i32> {
        if symbol == ABSENT_SYMBOL {
            return None;
        }
        let value = i64::from(self.min) + i64::from(symbol) - 1;
        i32::try_from(value).ok().filter(|value| self.contains(*value))
    }

    /// Value assembled from nibbles, most significant first.
    pub fn value_of_nibbles(&self, nibbles: &[u8]) -> Option<i32> {
        let offset = nibbles
            .iter()
            .fold(0u64, |acc, nibble| (acc << NIBBLE_BITS) | u64::from(*nibble & 0xF));
        let value = i64::from(self.min).checked_add(i64::try_from(offset).ok()?)?;
        i32::try_from(value).ok().filter(|value| self.contains(*value))
    }
}

/// Role-specific slot layout of one link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotPlan {
    pub role: Role,
    pub link: String,
    pub base_offset: u32,
    pub slot_spacing: u32,
    /// Beacon this role always drives.
    pub local_beacon: ContactSlot,
    /// Beacon of the peer, probed continuously.
    pub peer_beacon: ContactSlot,
    /// Signals in declared order.
    pub signals: Vec<SignalPlan>,
}

impl SlotPlan {
    pub fn signal(&self, name: &str) -> Option<&SignalPlan> {
        self.signals.iter().find(|signal| signal.name == name)
    }

    /// Every slot including the beacons, transmitter beacon first.
    pub fn slots(&self) -> Vec<&ContactSlot> {
        let beacons = match self.role {
            Role::Transmitter => [&self.local_beacon, &self.peer_beacon],
            Role::Receiver => [&self.peer_beacon, &self.local_beacon],
        };
        let mut slots: Vec<&ContactSlot> = beacons.into_iter().collect();
        for signal in &self.signals {
            slots.extend(signal.primary.slots.iter());
            if let Some(ack) = &signal.ack {
                slots.extend(ack.slots.iter());
            }
        }
        slots
    }

    /// Signal slots the local role senses, in position order.
    pub fn sensed_slots(&self) -> Vec<&ContactSlot> {
        self.signal_slots(Ownership::Sense)
    }

    /// Signal slots the local role drives, in position order.
    pub fn emitted_slots(&self) -> Vec<&ContactSlot> {
        self.signal_slots(Ownership::Emit)
    }

    fn signal_slots(&self, ownership: Ownership) -> Vec<&ContactSlot> {
        let mut slots: Vec<&ContactSlot> = self
            .signals
            .iter()
            .flat_map(|signal| {
                signal
                    .primary
                    .slots
                    .iter()
                    .chain(signal.ack.iter().flat_map(|ack| ack.slots.iter()))
            })
            .filter(|slot| slot.ownership == ownership)
            .collect();
        slots.sort_by_key(|slot| slot.position);
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(min: i32, max: i32, encoding: Encoding) -> SignalPlan {
        SignalPlan {
            name: "level".to_string(),
            layer: LayerKind::BoundedInt,
            min,
            max,
            direction: Direction::OneWay,
            sender: Role::Transmitter,
            fallback: Fallback::Hold,
            default: min,
            encoding,
            primary: SlotSet { slots: Vec::new() },
            ack: None,
        }
    }

    #[test]
    fn codebook_reserves_absent_entry() {
        let codebook = Codebook::build(3, |index| i32::from(index) - 1).unwrap();
        assert_eq!(codebook.len(), 3);
        assert_eq!(codebook.driver(0).unwrap().meaning, None);
        assert_eq!(codebook.driver(2).unwrap().meaning, Some(1));
        assert_eq!(codebook.codeword(1), Some(0x1D9));
        assert_eq!(codebook.codeword(3), None);
    }

    #[test]
    fn direct_symbols_are_offset_by_one() {
        let signal = plan(-3, 3, Encoding::Direct);
        assert_eq!(signal.symbols_for(-3), Some(vec![1]));
        assert_eq!(signal.symbols_for(3), Some(vec![7]));
        assert_eq!(signal.symbols_for(4), None);
        assert_eq!(signal.value_of_symbol(7), Some(3));
        assert_eq!(signal.value_of_symbol(8), None);
        assert_eq!(signal.value_of_symbol(ABSENT_SYMBOL), None);
    }

    #[test]
    fn nibble_symbols_most_significant_first() {
        let signal = plan(0, 255, Encoding::Nibbles { groups: 2 });
        // 173 = 0xAD
        assert_eq!(signal.symbols_for(173), Some(vec![0xA + 1, 0xD + 1]));
        assert_eq!(signal.value_of_nibbles(&[0xA, 0xD]), Some(173));
    }

    #[test]
    fn nibbles_respect_bounds() {
        let signal = plan(100, 300, Encoding::Nibbles { groups: 2 });
        assert_eq!(signal.symbols_for(100), Some(vec![1, 1]));
        assert_eq!(signal.value_of_nibbles(&[0, 0]), Some(100));
        assert_eq!(signal.value_of_nibbles(&[0xF, 0xF]), None);
    }

    #[test]
    fn full_i32_range_fits_eight_groups() {
        let signal = plan(i32::MIN, i32::MAX, Encoding::Nibbles { groups: 8 });
        let symbols = signal.symbols_for(i32::MAX).unwrap();
        assert_eq!(symbols, vec![16; 8]);
        assert_eq!(signal.value_of_nibbles(&[0xF; 8]), Some(i32::MAX));
        assert_eq!(signal.value_of_nibbles(&[0; 8]), Some(i32::MIN));
    }
}
