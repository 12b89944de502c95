use proxlink_protocol::{LinkError, LivenessState, Loopback, Participant, ProtocolState, TickEvent};
use proxlink_spec::Role;
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::{load_document, parse_assignment, parse_role_at, SimulateArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct EventRow {
    tick: u64,
    role: Role,
    #[serde(flatten)]
    event: TickEvent,
}

#[derive(Serialize)]
struct SignalSummary {
    name: String,
    state: ProtocolState,
    output: i32,
    acknowledged: bool,
}

#[derive(Serialize)]
struct RoleSummary {
    role: Role,
    peer_present: bool,
    link_down: bool,
    liveness: LivenessState,
    signals: Vec<SignalSummary>,
}

#[derive(Serialize)]
struct SimulationOutput {
    schema_id: &'static str,
    link: String,
    ticks: u64,
    roles: Vec<RoleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<EventRow>>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let document = load_document(&args.document)?;
    let mut link = Loopback::from_spec_with_config(&document.link, &document.config)
        .map_err(|err| link_error("link setup failed", err))?;

    for assignment in &args.set {
        let (name, value) = parse_assignment(assignment)?;
        set_input(&mut link, &name, value)?;
    }
    for assignment in &args.forward {
        let (name, value) = parse_assignment(assignment)?;
        link.transmitter_mut().set_forward(&name, value);
        link.receiver_mut().set_forward(&name, value);
    }
    let withdraw = args.withdraw.as_deref().map(parse_role_at).transpose()?;
    let restore = args.restore.as_deref().map(parse_role_at).transpose()?;

    let mut events = Vec::new();
    for _ in 0..args.ticks {
        let tick = link.ticks();
        if let Some((role, _)) = withdraw.filter(|(_, at)| *at == tick) {
            link.withdraw(role);
        }
        if let Some((role, _)) = restore.filter(|(_, at)| *at == tick) {
            link.restore(role);
        }
        let step = link
            .step()
            .map_err(|err| link_error("simulation failed", err))?;
        if args.events {
            for (role, report) in [
                (Role::Transmitter, step.transmitter),
                (Role::Receiver, step.receiver),
            ] {
                events.extend(report.events.into_iter().map(|event| EventRow {
                    tick: report.tick,
                    role,
                    event,
                }));
            }
        }
    }
    info!(ticks = link.ticks(), "simulation finished");

    let signal_names: Vec<&str> = document
        .link
        .signals
        .iter()
        .map(|signal| signal.name.as_str())
        .collect();
    let output = SimulationOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/simulation.schema.json",
        link: document.link.name.clone(),
        ticks: link.ticks(),
        roles: vec![
            summarize(link.transmitter(), &signal_names)?,
            summarize(link.receiver(), &signal_names)?,
        ],
        events: args.events.then_some(events),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            println!("{} after {} ticks", output.link, output.ticks);
            let mut out = table(vec!["ROLE", "SIGNAL", "STATE", "OUTPUT", "ACK"]);
            for role in &output.roles {
                for signal in &role.signals {
                    out.add_row(vec![
                        role.role.to_string(),
                        signal.name.clone(),
                        signal.state.to_string(),
                        signal.output.to_string(),
                        signal.acknowledged.to_string(),
                    ]);
                }
            }
            println!("{out}");
            print_events(output.events.as_deref());
        }
        OutputFormat::Pretty => {
            for role in &output.roles {
                println!(
                    "{}: liveness {}, link {}",
                    role.role,
                    role.liveness,
                    if role.link_down { "down" } else { "up" }
                );
                for signal in &role.signals {
                    println!("  {:<16} {:>6}  {}", signal.name, signal.output, signal.state);
                }
            }
            print_events(output.events.as_deref());
        }
        OutputFormat::Raw => {
            for role in &output.roles {
                for signal in &role.signals {
                    println!("{} {} {}", role.role, signal.name, signal.output);
                }
            }
        }
    }

    Ok(SUCCESS)
}

/// Host inputs go to whichever role sends the signal.
fn set_input(link: &mut Loopback, name: &str, value: i32) -> CliResult<()> {
    match link.transmitter_mut().set_input(name, value) {
        Ok(()) => Ok(()),
        Err(LinkError::NotWritable(_)) => {
            debug!(signal = name, "input routed to receiver");
            link.receiver_mut()
                .set_input(name, value)
                .map_err(|err| link_error("invalid --set", err))
        }
        Err(err) => Err(link_error("invalid --set", err)),
    }
}

fn summarize(participant: &Participant, names: &[&str]) -> CliResult<RoleSummary> {
    let signals = names
        .iter()
        .map(|name| {
            Ok(SignalSummary {
                name: name.to_string(),
                state: participant.state(name)?,
                output: participant.output(name)?,
                acknowledged: participant.acknowledged(name)?,
            })
        })
        .collect::<Result<Vec<_>, LinkError>>()
        .map_err(|err| link_error("summary failed", err))?;
    Ok(RoleSummary {
        role: participant.role(),
        peer_present: participant.peer_present(),
        link_down: participant.link_down(),
        liveness: participant.liveness(),
        signals,
    })
}

fn print_events(events: Option<&[EventRow]>) {
    let Some(events) = events else {
        return;
    };
    println!();
    for row in events {
        let detail = match &row.event {
            TickEvent::Transition { signal, from, to } => format!("{signal}: {from} -> {to}"),
            TickEvent::Committed { signal, value } => format!("{signal} committed {value}"),
            TickEvent::Acknowledged { signal, value } => format!("{signal} acknowledged {value}"),
            TickEvent::LinkDown => "link down".to_string(),
            TickEvent::LinkUp => "link up".to_string(),
            TickEvent::LivenessTimeout => "liveness timeout".to_string(),
        };
        println!("{:>6} {:<11} {}", row.tick, row.role.to_string(), detail);
    }
}
