//! Both sides of a two-signal link on one simulated field.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! The transmitter sends a grip flag, the receiver sends a slider value back
//! and waits for it to be acknowledged. Halfway through, the transmitter is
//! withdrawn and the receiver falls back to holding the last grip value.

use proxlink::protocol::{Loopback, TickEvent};
use proxlink::spec::{Fallback, LinkSpec, Role, Signal};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec = LinkSpec::new("hands")
        .with_signal(Signal::bool("grip").with_fallback(Fallback::Hold))
        .with_signal(
            Signal::bounded("slider", 0, 255)
                .two_way()
                .with_sender(Role::Receiver),
        );

    let mut link = Loopback::from_spec(&spec)?;
    link.transmitter_mut().set_input("grip", 1)?;
    link.receiver_mut().set_input("slider", 173)?;

    for tick in 0..1000u64 {
        if tick == 300 {
            eprintln!("-- withdrawing transmitter");
            link.withdraw(Role::Transmitter);
        }
        let step = link.step()?;
        for (role, report) in [("tx", &step.transmitter), ("rx", &step.receiver)] {
            for event in &report.events {
                match event {
                    TickEvent::Transition { .. } => {}
                    other => eprintln!("{:>5} {role} {other:?}", report.tick),
                }
            }
        }
    }

    eprintln!(
        "receiver: grip={} link_down={} liveness={}",
        link.receiver().output("grip")?,
        link.receiver().link_down(),
        link.receiver().liveness()
    );
    eprintln!(
        "transmitter: slider={} link_down={}",
        link.transmitter().output("slider")?,
        link.transmitter().link_down()
    );

    Ok(())
}
