use std::path::Path;

use proxlink_protocol::{verify_pair, Artifact};
use serde::Serialize;

use crate::cmd::VerifyArgs;
use crate::exit::{io_error, link_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VerifyOutput {
    schema_id: &'static str,
    link: String,
    fingerprint: String,
    signals: usize,
    compatible: bool,
    detail: Option<String>,
}

pub fn run(args: VerifyArgs, format: OutputFormat) -> CliResult<i32> {
    let transmitter = read_artifact(&args.transmitter)?;
    let receiver = read_artifact(&args.receiver)?;

    let (compatible, detail, code) = match verify_pair(&transmitter, &receiver) {
        Ok(()) => (true, None, SUCCESS),
        Err(err) => {
            let err = link_error("pair rejected", err);
            (false, Some(err.message), err.code)
        }
    };

    let output = VerifyOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/pair-verification.schema.json",
        link: transmitter.link.clone(),
        fingerprint: transmitter.fingerprint.to_string(),
        signals: transmitter
            .plan()
            .map_or(0, |plan| plan.signals.len()),
        compatible,
        detail,
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("proxlink verify\n");
            println!("  Link:        {}", output.link);
            println!("  Fingerprint: {}", output.fingerprint);
            println!("  Signals:     {}", output.signals);
            match &output.detail {
                None => println!("\n  Result: artifacts form a working link"),
                Some(detail) => println!("\n  Result: {detail}"),
            }
        }
        OutputFormat::Raw => println!("{}", if compatible { "ok" } else { "mismatch" }),
    }

    Ok(code)
}

fn read_artifact(path: &Path) -> CliResult<Artifact> {
    let bytes =
        std::fs::read(path).map_err(|err| io_error(&format!("read {}", path.display()), err))?;
    Artifact::decode(&bytes).map_err(|err| link_error(&format!("decode {}", path.display()), err))
}
