use proxlink_spec::{Direction, LinkConfig, LinkSpec, Role, Signal, ValueKind};
use tracing::debug;

use crate::error::{PlanError, Result};
use crate::slot::{
    Codebook, ContactSlot, Encoding, LayerKind, Ownership, SignalPlan, SlotPlan, SlotSet,
    NIBBLE_BITS, NIBBLE_CODEBOOK_LEN, PRESENCE_PARAMETER,
};

/// Hands out slot positions in ordinal order.
struct SlotCursor {
    base: u32,
    spacing: u32,
    next: u32,
}

impl SlotCursor {
    fn take(&mut self) -> Result<u32> {
        let position = self
            .next
            .checked_mul(self.spacing)
            .and_then(|offset| self.base.checked_add(offset))
            .ok_or_else(|| {
                PlanError::DesynchronizationRisk(format!(
                    "slot ordinal {} overflows the position space (base {}, spacing {})",
                    self.next, self.base, self.spacing
                ))
            })?;
        self.next += 1;
        Ok(position)
    }
}

/// Lay out slots, ownership and codebooks of `spec` for `role`.
///
/// Positions depend only on the link spec and config, never on `role`; the two
/// roles get identical geometry with complementary ownership.
pub fn allocate(spec: &LinkSpec, config: &LinkConfig, role: Role) -> Result<SlotPlan> {
    config.validate()?;
    spec.validate()?;

    let mut cursor = SlotCursor {
        base: spec.base_offset,
        spacing: config.slot_spacing,
        next: 0,
    };

    let transmitter_beacon = beacon_slot(cursor.take()?, Role::Transmitter, role, config)?;
    let receiver_beacon = beacon_slot(cursor.take()?, Role::Receiver, role, config)?;
    let (local_beacon, peer_beacon) = match role {
        Role::Transmitter => (transmitter_beacon, receiver_beacon),
        Role::Receiver => (receiver_beacon, transmitter_beacon),
    };

    let signals = spec
        .signals
        .iter()
        .map(|signal| plan_signal(signal, config, role, &mut cursor))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        link = %spec.name,
        %role,
        signals = signals.len(),
        slots = cursor.next,
        "link allocated"
    );

    Ok(SlotPlan {
        role,
        link: spec.name.clone(),
        base_offset: spec.base_offset,
        slot_spacing: config.slot_spacing,
        local_beacon,
        peer_beacon,
        signals,
    })
}

fn beacon_slot(position: u32, owner: Role, local: Role, config: &LinkConfig) -> Result<ContactSlot> {
    Ok(ContactSlot {
        name: format!("@beacon/{owner}"),
        ownership: Ownership::for_role(owner, local),
        position,
        span: config.slot_spacing,
        parameter: PRESENCE_PARAMETER.to_string(),
        codebook: Codebook::build(2, |_| 1)?,
    })
}

fn plan_signal(
    signal: &Signal,
    config: &LinkConfig,
    role: Role,
    cursor: &mut SlotCursor,
) -> Result<SignalPlan> {
    let (min, max) = signal.kind.range();
    let value_count = signal.kind.value_count();

    let layer = match (signal.kind, signal.direction) {
        (_, Direction::TwoWay) => LayerKind::TwoWayBoundedInt,
        (ValueKind::Bool, Direction::OneWay) => LayerKind::Bool,
        (ValueKind::BoundedInt { .. }, Direction::OneWay) => LayerKind::BoundedInt,
    };

    let encoding = if value_count > u64::from(config.direct_symbol_limit) {
        let bits = u64::BITS - (value_count - 1).leading_zeros();
        Encoding::Nibbles {
            groups: bits.div_ceil(NIBBLE_BITS) as u8,
        }
    } else {
        Encoding::Direct
    };

    let primary_ownership = Ownership::for_role(signal.sender, role);
    let primary = slot_set(
        signal,
        false,
        primary_ownership,
        encoding,
        config,
        cursor,
    )?;
    let ack = match signal.direction {
        Direction::OneWay => None,
        Direction::TwoWay => Some(slot_set(
            signal,
            true,
            primary_ownership.opposite(),
            encoding,
            config,
            cursor,
        )?),
    };

    Ok(SignalPlan {
        name: signal.name.clone(),
        layer,
        min,
        max,
        direction: signal.direction,
        sender: signal.sender,
        fallback: signal.fallback.clone(),
        default: signal.default_value(),
        encoding,
        primary,
        ack,
    })
}

fn slot_set(
    signal: &Signal,
    is_ack: bool,
    ownership: Ownership,
    encoding: Encoding,
    config: &LinkConfig,
    cursor: &mut SlotCursor,
) -> Result<SlotSet> {
    let name = if is_ack {
        format!("{}/ack", signal.name)
    } else {
        signal.name.clone()
    };
    let parameter = match (ownership, is_ack) {
        (Ownership::Emit, false) => format!("{}/in", signal.name),
        (Ownership::Sense, false) => signal.name.clone(),
        (Ownership::Emit, true) => signal.name.clone(),
        (Ownership::Sense, true) => format!("{}/ack", signal.name),
    };

    let slots = match encoding {
        Encoding::Direct => {
            let (min, _) = signal.kind.range();
            let len = signal.kind.value_count().max(2) as usize + 1;
            vec![ContactSlot {
                name,
                ownership,
                position: cursor.take()?,
                span: config.slot_spacing,
                parameter,
                codebook: Codebook::build(len, |index| {
                    min.saturating_add(i32::from(index) - 1)
                })?,
            }]
        }
        Encoding::Nibbles { groups } => (0..groups)
            .map(|group| {
                Ok(ContactSlot {
                    name: format!("{name}/g{group}"),
                    ownership,
                    position: cursor.take()?,
                    span: config.slot_spacing,
                    parameter: parameter.clone(),
                    codebook: Codebook::build(NIBBLE_CODEBOOK_LEN, |index| {
                        i32::from(index) - 1
                    })?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    Ok(SlotSet { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxlink_spec::{Fallback, SpecError};

    fn hands() -> LinkSpec {
        LinkSpec::new("hands")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("slider", 0, 255).two_way())
            .with_signal(Signal::bounded("mode", 0, 3).with_sender(Role::Receiver))
    }

    #[test]
    fn beacons_take_the_first_two_ordinals() {
        let spec = hands().with_base_offset(100);
        let tx = allocate(&spec, &LinkConfig::default(), Role::Transmitter).unwrap();
        assert_eq!(tx.local_beacon.position, 100);
        assert_eq!(tx.peer_beacon.position, 104);
        assert_eq!(tx.local_beacon.ownership, Ownership::Emit);
        assert_eq!(tx.peer_beacon.ownership, Ownership::Sense);

        let rx = allocate(&spec, &LinkConfig::default(), Role::Receiver).unwrap();
        assert_eq!(rx.local_beacon.position, 104);
        assert_eq!(rx.peer_beacon.position, 100);
    }

    #[test]
    fn layout_follows_declared_order() {
        let plan = allocate(&hands(), &LinkConfig::default(), Role::Transmitter).unwrap();
        let positions: Vec<u32> = plan.slots().iter().map(|slot| slot.position).collect();
        assert_eq!(positions, vec![0, 4, 8, 12, 16, 20, 24, 28]);

        let grip = plan.signal("grip").unwrap();
        assert_eq!(grip.layer, LayerKind::Bool);
        assert_eq!(grip.encoding, Encoding::Direct);
        assert_eq!(grip.primary.slots[0].codebook.len(), 3);
        assert_eq!(grip.primary.slots[0].parameter, "grip/in");

        let slider = plan.signal("slider").unwrap();
        assert_eq!(slider.layer, LayerKind::TwoWayBoundedInt);
        assert_eq!(slider.encoding, Encoding::Nibbles { groups: 2 });
        assert_eq!(slider.primary.positions(), vec![12, 16]);
        assert_eq!(slider.ack.as_ref().unwrap().positions(), vec![20, 24]);
        assert_eq!(slider.primary.slots[1].name, "slider/g1");
        assert_eq!(slider.primary.slots[0].codebook.len(), NIBBLE_CODEBOOK_LEN);
    }

    #[test]
    fn ownership_is_complementary() {
        let config = LinkConfig::default();
        let tx = allocate(&hands(), &config, Role::Transmitter).unwrap();
        let rx = allocate(&hands(), &config, Role::Receiver).unwrap();

        for (a, b) in tx.slots().into_iter().zip(rx.slots()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.codebook, b.codebook);
            assert_ne!(a.ownership, b.ownership, "slot {}", a.name);
        }

        let mode_tx = tx.signal("mode").unwrap();
        assert!(!mode_tx.emits_primary());
        assert_eq!(mode_tx.primary.slots[0].parameter, "mode");
        assert!(rx.signal("mode").unwrap().emits_primary());
    }

    #[test]
    fn two_way_bool_uses_bounded_layer() {
        let spec = LinkSpec::new("x").with_signal(Signal::bool("ok").two_way());
        let plan = allocate(&spec, &LinkConfig::default(), Role::Receiver).unwrap();
        let ok = plan.signal("ok").unwrap();
        assert_eq!(ok.layer, LayerKind::TwoWayBoundedInt);
        assert_eq!((ok.min, ok.max), (0, 1));
        let ack = ok.ack.as_ref().unwrap();
        assert_eq!(ack.ownership(), Some(Ownership::Emit));
        assert_eq!(ack.slots[0].parameter, "ok");
    }

    #[test]
    fn singleton_range_still_has_two_values() {
        let spec = LinkSpec::new("x").with_signal(Signal::bounded("fixed", 7, 7));
        let plan = allocate(&spec, &LinkConfig::default(), Role::Transmitter).unwrap();
        let codebook = &plan.signal("fixed").unwrap().primary.slots[0].codebook;
        assert_eq!(codebook.len(), 3);
        assert_eq!(codebook.driver(1).unwrap().meaning, Some(7));
    }

    #[test]
    fn direct_limit_is_configurable() {
        let spec = LinkSpec::new("x").with_signal(Signal::bounded("level", 0, 9));
        let config = LinkConfig {
            direct_symbol_limit: 8,
            ..LinkConfig::default()
        };
        let plan = allocate(&spec, &config, Role::Transmitter).unwrap();
        assert_eq!(
            plan.signal("level").unwrap().encoding,
            Encoding::Nibbles { groups: 1 }
        );
    }

    #[test]
    fn full_range_needs_eight_groups() {
        let spec = LinkSpec::new("x").with_signal(Signal::bounded("wide", i32::MIN, i32::MAX));
        let plan = allocate(&spec, &LinkConfig::default(), Role::Transmitter).unwrap();
        assert_eq!(
            plan.signal("wide").unwrap().encoding,
            Encoding::Nibbles { groups: 8 }
        );
    }

    #[test]
    fn position_overflow_is_desync_risk() {
        let spec = hands().with_base_offset(u32::MAX - 10);
        let err = allocate(&spec, &LinkConfig::default(), Role::Transmitter).unwrap_err();
        assert!(matches!(err, PlanError::DesynchronizationRisk(_)));
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let spec = LinkSpec::new("x")
            .with_signal(Signal::bool("grip").with_fallback(Fallback::Reset(5)));
        let err = allocate(&spec, &LinkConfig::default(), Role::Transmitter).unwrap_err();
        assert!(matches!(err, PlanError::Spec(SpecError::KindMismatch { .. })));
    }
}
