use proxlink_protocol::{LivenessState, Loopback, ProtocolState, TickEvent};
use proxlink_spec::{Fallback, LinkSpec, Role, Signal};
use proxlink_substrate::{FieldConfig, SimulatedField};

fn grip(fallback: Fallback) -> LinkSpec {
    LinkSpec::new("hands").with_signal(Signal::bool("grip").with_fallback(fallback))
}

fn converged_grip(fallback: Fallback) -> Loopback {
    let mut link = Loopback::from_spec(&grip(fallback)).unwrap();
    link.transmitter_mut().set_input("grip", 1).unwrap();
    let taken = link
        .run_until(100, |link| link.receiver().output("grip").unwrap() == 1)
        .unwrap();
    assert!(taken.is_some(), "grip never latched");
    link
}

fn grip_position(link: &Loopback) -> u32 {
    link.transmitter()
        .artifact()
        .plan()
        .unwrap()
        .signal("grip")
        .unwrap()
        .primary
        .slots[0]
        .position
}

#[test]
fn bool_arrives_within_one_probe_cycle() {
    let mut link = Loopback::from_spec(&grip(Fallback::Hold)).unwrap();
    link.transmitter_mut().set_input("grip", 1).unwrap();

    let present = link
        .run_until(10, |link| link.receiver().peer_present())
        .unwrap();
    assert!(present.is_some());
    assert_eq!(link.receiver().output("grip").unwrap(), 0);

    let cycle = link.receiver().artifact().phases().unwrap().cycle_ticks();
    link.run(cycle).unwrap();
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
    assert_eq!(
        link.receiver().state("grip").unwrap(),
        ProtocolState::LocalDriving(1)
    );
    assert_eq!(
        link.transmitter().state("grip").unwrap(),
        ProtocolState::LocalDriving(1)
    );
}

#[test]
fn withdrawn_sender_holds_last_value() {
    let mut link = converged_grip(Fallback::Hold);
    link.withdraw(Role::Transmitter);

    let reset = link
        .run_until(20, |link| {
            link.receiver().state("grip").unwrap() == ProtocolState::Startup
        })
        .unwrap();
    assert!(reset.is_some());
    assert!(!link.receiver().peer_present());
    assert!(!link.receiver().link_down());

    let mut saw_down = false;
    let mut saw_timeout = false;
    for tick in link.run(700).unwrap() {
        saw_down |= tick.receiver.events.contains(&TickEvent::LinkDown);
        saw_timeout |= tick.receiver.events.contains(&TickEvent::LivenessTimeout);
    }
    assert!(saw_down);
    assert!(saw_timeout);
    assert!(link.receiver().link_down());
    assert_eq!(link.receiver().state("grip").unwrap(), ProtocolState::Startup);
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
    assert_eq!(link.receiver().liveness(), LivenessState::Init);
}

#[test]
fn withdrawn_sender_resets_to_configured_value() {
    let mut link = converged_grip(Fallback::Reset(0));
    link.withdraw(Role::Transmitter);

    link.run(300).unwrap();
    assert_eq!(link.receiver().state("grip").unwrap(), ProtocolState::Startup);
    assert_eq!(link.receiver().output("grip").unwrap(), 1);

    link.run(400).unwrap();
    assert!(link.receiver().link_down());
    assert_eq!(link.receiver().output("grip").unwrap(), 0);
}

#[test]
fn restored_sender_is_relatched() {
    let mut link = converged_grip(Fallback::Reset(0));
    link.withdraw(Role::Transmitter);
    link.run(700).unwrap();
    assert_eq!(link.receiver().output("grip").unwrap(), 0);

    link.restore(Role::Transmitter);
    let mut saw_up = false;
    for tick in link.run(40).unwrap() {
        saw_up |= tick.receiver.events.contains(&TickEvent::LinkUp);
    }
    assert!(saw_up);
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
    assert_eq!(link.receiver().liveness(), LivenessState::PeerLocal);
}

#[test]
fn forward_fallback_mirrors_host_parameter() {
    let spec = LinkSpec::new("hands").with_signal(
        Signal::bounded("level", 0, 9).with_fallback(Fallback::Forward("manual".to_string())),
    );
    let mut link = Loopback::from_spec(&spec).unwrap();
    link.transmitter_mut().set_input("level", 4).unwrap();
    link.receiver_mut().set_forward("manual", 12);
    link.run(60).unwrap();
    assert_eq!(link.receiver().output("level").unwrap(), 4);

    link.withdraw(Role::Transmitter);
    link.run(700).unwrap();
    assert_eq!(link.receiver().output("level").unwrap(), 9);
}

#[test]
fn forward_fallback_mirrors_sibling_output() {
    let spec = LinkSpec::new("hands")
        .with_signal(Signal::bool("grip").with_fallback(Fallback::Hold))
        .with_signal(
            Signal::bounded("level", 0, 9).with_fallback(Fallback::Forward("grip".to_string())),
        );
    let mut link = Loopback::from_spec(&spec).unwrap();
    link.transmitter_mut().set_input("grip", 1).unwrap();
    link.transmitter_mut().set_input("level", 7).unwrap();
    let converged = link
        .run_until(300, |link| {
            link.receiver().output("grip").unwrap() == 1
                && link.receiver().output("level").unwrap() == 7
        })
        .unwrap();
    assert!(converged.is_some());

    link.withdraw(Role::Transmitter);
    link.run(700).unwrap();
    assert!(link.receiver().link_down());
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
    assert_eq!(link.receiver().output("level").unwrap(), 1);
}

#[test]
fn cleared_input_returns_sender_to_idle() {
    let spec = LinkSpec::new("dial").with_signal(Signal::bounded("level", 0, 9));
    let mut link = Loopback::from_spec(&spec).unwrap();
    link.transmitter_mut().set_input("level", 4).unwrap();
    let latched = link
        .run_until(100, |link| link.receiver().output("level").unwrap() == 4)
        .unwrap();
    assert!(latched.is_some());

    link.transmitter_mut().clear_input("level").unwrap();
    for tick in link.run(100).unwrap() {
        assert!(!tick
            .receiver
            .events
            .iter()
            .any(|event| matches!(event, TickEvent::Committed { .. })));
    }
    assert_eq!(
        link.transmitter().state("level").unwrap(),
        ProtocolState::IdleAwaitingPeer
    );
    assert_eq!(link.receiver().output("level").unwrap(), 4);
    assert!(!link.receiver().link_down());

    link.transmitter_mut().set_input("level", 6).unwrap();
    let relatched = link
        .run_until(100, |link| link.receiver().output("level").unwrap() == 6)
        .unwrap();
    assert!(relatched.is_some());
}

#[test]
fn two_way_value_is_acknowledged_before_change() {
    let spec = LinkSpec::new("hands").with_signal(Signal::bounded("slider", 0, 255).two_way());
    let mut link = Loopback::from_spec(&spec).unwrap();
    link.transmitter_mut().set_input("slider", 173).unwrap();

    let latched = link
        .run_until(200, |link| link.receiver().output("slider").unwrap() == 173)
        .unwrap();
    assert!(latched.is_some());
    assert!(!link.transmitter().acknowledged("slider").unwrap());

    link.transmitter_mut().set_input("slider", 42).unwrap();
    let mut acknowledged = false;
    for _ in 0..200 {
        let tick = link.step().unwrap();
        if !acknowledged {
            assert_eq!(
                link.transmitter().state("slider").unwrap(),
                ProtocolState::LocalDriving(173)
            );
        }
        acknowledged |= tick.transmitter.events.contains(&TickEvent::Acknowledged {
            signal: "slider".to_string(),
            value: 173,
        });
    }
    assert!(acknowledged);

    let switched = link
        .run_until(400, |link| link.receiver().output("slider").unwrap() == 42)
        .unwrap();
    assert!(switched.is_some());
    assert_eq!(
        link.transmitter().state("slider").unwrap(),
        ProtocolState::LocalDriving(42)
    );
}

#[test]
fn receiver_can_send_to_transmitter() {
    let spec = LinkSpec::new("hands")
        .with_signal(Signal::bool("grip"))
        .with_signal(Signal::bounded("mode", -2, 2).with_sender(Role::Receiver));
    let mut link = Loopback::from_spec(&spec).unwrap();
    link.receiver_mut().set_input("mode", -1).unwrap();
    link.transmitter_mut().set_input("grip", 1).unwrap();
    link.run(60).unwrap();
    assert_eq!(link.transmitter().output("mode").unwrap(), -1);
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
}

#[test]
fn bit_noise_never_latches_a_wrong_value() {
    let mut link = converged_grip(Fallback::Hold);
    let position = grip_position(&link);

    for mask in [0b1, 0b11, 0b111] {
        link.inject_noise(position, mask, 50);
        for tick in link.run(60).unwrap() {
            assert!(!tick.receiver.events.iter().any(|event| matches!(
                event,
                TickEvent::Committed { value, .. } if *value != 1
            )));
        }
        assert_eq!(link.receiver().output("grip").unwrap(), 1);
    }
}

#[test]
fn tolerant_field_reads_through_single_bit_noise() {
    let field = SimulatedField::with_config(FieldConfig {
        tolerance: 1,
        ..FieldConfig::default()
    });
    let spec = grip(Fallback::Hold);
    let transmitter = proxlink_protocol::compile_transmitter(&spec).unwrap();
    let receiver = proxlink_protocol::compile_receiver(&spec).unwrap();
    let mut link =
        Loopback::with_field(transmitter.into(), receiver.into(), field).unwrap();
    link.transmitter_mut().set_input("grip", 1).unwrap();
    let position = grip_position(&link);
    link.inject_noise(position, 0b100, 1000);

    link.run(60).unwrap();
    assert_eq!(link.receiver().output("grip").unwrap(), 1);
}
