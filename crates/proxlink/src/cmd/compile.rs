use proxlink_protocol::{compile, Artifact};
use proxlink_spec::Role;
use serde::Serialize;
use tracing::info;

use crate::cmd::{load_document, CompileArgs};
use crate::exit::{io_error, link_error, CliResult, SUCCESS};
use crate::output::{print_json, print_raw, table, OutputFormat};

#[derive(Serialize)]
struct CompileOutput {
    schema_id: &'static str,
    link: String,
    role: Role,
    fingerprint: String,
    size: usize,
    entries: Vec<String>,
    written_to: Option<String>,
}

pub fn run(args: CompileArgs, format: OutputFormat) -> CliResult<i32> {
    let document = load_document(&args.document)?;
    let artifact = compile(&document.link, &document.config, args.role.into())
        .map_err(|err| link_error("compile failed", err))?;
    let image = artifact
        .encode()
        .map_err(|err| link_error("encode failed", err))?;

    if let Some(path) = &args.output {
        std::fs::write(path, &image)
            .map_err(|err| io_error(&format!("write {}", path.display()), err))?;
        info!(path = %path.display(), bytes = image.len(), "artifact written");
    }

    let output = summarize(&artifact, image.len(), &args);
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            let mut out = table(vec!["ENTRY"]);
            for entry in &output.entries {
                out.add_row(vec![entry.clone()]);
            }
            println!(
                "{} ({}) fingerprint {} size {} bytes",
                output.link, output.role, output.fingerprint, output.size
            );
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!(
                "compiled {} for {}: {} entries, {} bytes",
                output.link,
                output.role,
                output.entries.len(),
                output.size
            );
            if let Some(path) = &output.written_to {
                println!("  written to {path}");
            }
        }
        OutputFormat::Raw => {
            if args.output.is_none() {
                print_raw(&image);
            }
        }
    }

    Ok(SUCCESS)
}

fn summarize(artifact: &Artifact, size: usize, args: &CompileArgs) -> CompileOutput {
    CompileOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/artifact-summary.schema.json",
        link: artifact.link.clone(),
        role: artifact.role,
        fingerprint: artifact.fingerprint.to_string(),
        size,
        entries: artifact
            .entries()
            .keys()
            .map(|id| id.to_string())
            .collect(),
        written_to: args
            .output
            .as_ref()
            .map(|path| path.display().to_string()),
    }
}
