use proxlink_plan::{allocate, ContactSlot, Encoding, SlotPlan};
use proxlink_spec::Role;
use serde::Serialize;

use crate::cmd::{load_document, PlanArgs};
use crate::exit::{plan_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct SlotRow {
    name: String,
    ownership: String,
    position: u32,
    span: u32,
    parameter: String,
    symbols: usize,
}

#[derive(Serialize)]
struct SignalRow {
    name: String,
    layer: &'static str,
    min: i32,
    max: i32,
    sender: Role,
    encoding: String,
}

#[derive(Serialize)]
struct PlanOutput {
    schema_id: &'static str,
    link: String,
    role: Role,
    fingerprint: String,
    base_offset: u32,
    signals: Vec<SignalRow>,
    slots: Vec<SlotRow>,
}

pub fn run(args: PlanArgs, format: OutputFormat) -> CliResult<i32> {
    let document = load_document(&args.document)?;
    let plan = allocate(&document.link, &document.config, args.role.into())
        .map_err(|err| plan_error("planning failed", err))?;

    let output = describe(&plan);
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            println!(
                "{} ({}) fingerprint {}",
                output.link, output.role, output.fingerprint
            );
            let mut out = table(vec![
                "SLOT",
                "OWNERSHIP",
                "POSITION",
                "SPAN",
                "PARAMETER",
                "SYMBOLS",
            ]);
            for slot in &output.slots {
                out.add_row(vec![
                    slot.name.clone(),
                    slot.ownership.clone(),
                    slot.position.to_string(),
                    slot.span.to_string(),
                    slot.parameter.clone(),
                    slot.symbols.to_string(),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!("link:        {}", output.link);
            println!("role:        {}", output.role);
            println!("fingerprint: {}", output.fingerprint);
            for signal in &output.signals {
                println!(
                    "  {} [{}..={}] {} from {} ({})",
                    signal.name, signal.min, signal.max, signal.layer, signal.sender, signal.encoding
                );
            }
        }
        OutputFormat::Raw => println!("{}", output.fingerprint),
    }

    Ok(SUCCESS)
}

fn describe(plan: &SlotPlan) -> PlanOutput {
    PlanOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/slot-plan.schema.json",
        link: plan.link.clone(),
        role: plan.role,
        fingerprint: plan.fingerprint().to_string(),
        base_offset: plan.base_offset,
        signals: plan
            .signals
            .iter()
            .map(|signal| SignalRow {
                name: signal.name.clone(),
                layer: signal.layer.as_str(),
                min: signal.min,
                max: signal.max,
                sender: signal.sender,
                encoding: match signal.encoding {
                    Encoding::Direct => "direct".to_string(),
                    Encoding::Nibbles { groups } => format!("nibbles x{groups}"),
                },
            })
            .collect(),
        slots: plan.slots().into_iter().map(slot_row).collect(),
    }
}

fn slot_row(slot: &ContactSlot) -> SlotRow {
    SlotRow {
        name: slot.name.clone(),
        ownership: slot.ownership.to_string(),
        position: slot.position,
        span: slot.span,
        parameter: slot.parameter.clone(),
        symbols: slot.codebook.len(),
    }
}
