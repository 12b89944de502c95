use proxlink_plan::{allocate, plan_phases, PhasePlan, ProbeSetting};
use proxlink_spec::Role;
use serde::Serialize;

use crate::cmd::{load_document, PhasesArgs};
use crate::exit::{plan_error, CliResult, SUCCESS};
use crate::output::{hex_word, print_json, table, OutputFormat};

#[derive(Serialize)]
struct PhasesOutput<'a> {
    schema_id: &'static str,
    link: &'a str,
    role: Role,
    settle_ticks: u64,
    sample_ticks: u64,
    phase_ticks: u64,
    cycle_ticks: u64,
    phases: &'a PhasePlan,
}

pub fn run(args: PhasesArgs, format: OutputFormat) -> CliResult<i32> {
    let document = load_document(&args.document)?;
    let role: Role = args.role.into();
    let plan = allocate(&document.link, &document.config, role)
        .map_err(|err| plan_error("planning failed", err))?;
    let phases = plan_phases(&plan, &document.config);

    match format {
        OutputFormat::Json => print_json(&PhasesOutput {
            schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/probe-phases.schema.json",
            link: &plan.link,
            role,
            settle_ticks: phases.settle_ticks,
            sample_ticks: phases.sample_ticks,
            phase_ticks: phases.phase_ticks,
            cycle_ticks: phases.cycle_ticks(),
            phases: &phases,
        }),
        OutputFormat::Table => {
            println!(
                "{} phases x {} ticks (settle {}, sample {})",
                phases.len(),
                phases.phase_ticks,
                phases.settle_ticks,
                phases.sample_ticks
            );
            let mut out = table(vec!["PHASE", "SLOT", "POSITION", "DRIVER", "CODEWORD", "VALUE"]);
            for phase in &phases.phases {
                for probe in &phase.probes {
                    out.add_row(row(phase.index, probe));
                }
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            for phase in &phases.phases {
                let probes: Vec<String> = phase
                    .probes
                    .iter()
                    .map(|probe| format!("{}={}", probe.slot, probe.driver))
                    .collect();
                println!("phase {:>3}: {}", phase.index, probes.join(" "));
            }
        }
        OutputFormat::Raw => println!("{}", phases.len()),
    }

    Ok(SUCCESS)
}

fn row(index: usize, probe: &ProbeSetting) -> Vec<String> {
    vec![
        index.to_string(),
        probe.slot.clone(),
        probe.position.to_string(),
        probe.driver.to_string(),
        hex_word(probe.codeword),
        probe
            .expected_value
            .map_or_else(|| "absent".to_string(), |value| value.to_string()),
    ]
}
