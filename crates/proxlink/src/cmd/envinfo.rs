use std::collections::BTreeMap;

use proxlink_codeword::{CRC_BITS, MAX_DATA_BITS, MIN_HAMMING_DISTANCE, POLYNOMIAL};
use proxlink_protocol::FORMAT_VERSION;
use proxlink_spec::{LinkConfig, DEFAULT_MAX_DOCUMENT_SIZE};
use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

const ENV_VARS: [&str; 2] = ["PROXLINK_LOG_LEVEL", "RUST_LOG"];

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
    target: String,
    rustc: &'static str,
    git_hash: &'static str,
    features: Vec<&'static str>,
}

#[derive(Serialize)]
struct WireInfo {
    artifact_format: u8,
    crc_polynomial: String,
    crc_bits: u32,
    max_data_bits: u32,
    min_hamming_distance: u32,
}

#[derive(Serialize)]
struct DefaultsInfo {
    tick_hz: u32,
    settle_ticks: u64,
    liveness_ticks: u64,
    direct_symbol_limit: u32,
    max_document_size: usize,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    schema_id: &'static str,
    build: BuildInfo,
    wire: WireInfo,
    defaults: DefaultsInfo,
    dependencies: BTreeMap<&'static str, &'static str>,
    environment: BTreeMap<&'static str, Option<String>>,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let output = collect();
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => print_sections(&output),
        OutputFormat::Raw => println!("{}", output.build.version),
    }
    Ok(SUCCESS)
}

fn collect() -> EnvInfoOutput {
    let config = LinkConfig::default();
    EnvInfoOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/envinfo.schema.json",
        build: BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            target: target_triple(),
            rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            features: if cfg!(feature = "cli") { vec!["cli"] } else { Vec::new() },
        },
        wire: WireInfo {
            artifact_format: FORMAT_VERSION,
            crc_polynomial: format!("0x{POLYNOMIAL:03X}"),
            crc_bits: CRC_BITS,
            max_data_bits: MAX_DATA_BITS,
            min_hamming_distance: MIN_HAMMING_DISTANCE,
        },
        defaults: DefaultsInfo {
            tick_hz: config.tick_hz,
            settle_ticks: config.settle_ticks(),
            liveness_ticks: config.liveness_ticks(),
            direct_symbol_limit: config.direct_symbol_limit,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
        },
        dependencies: BTreeMap::from([
            ("clap", "4.5"),
            ("comfy-table", "7"),
            ("jsonschema", "0.41"),
            ("sha2", "0.10"),
        ]),
        environment: ENV_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect(),
    }
}

fn target_triple() -> String {
    option_env!("PROXLINK_BUILD_TARGET")
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{}-unknown-{}",
                std::env::consts::ARCH,
                std::env::consts::OS
            )
        })
}

fn print_sections(output: &EnvInfoOutput) {
    let build = &output.build;
    println!("proxlink environment\n");
    println!("  Version:    {}", build.version);
    println!("  Target:     {}", build.target);
    println!("  Rust:       {}", build.rustc);
    println!("  Git hash:   {}", build.git_hash);
    println!("  Features:   {}", build.features.join(", "));

    let wire = &output.wire;
    println!("\n  Wire:");
    println!("    artifact format   v{}", wire.artifact_format);
    println!(
        "    codeword          {} data + {} crc bits, poly {}",
        wire.max_data_bits, wire.crc_bits, wire.crc_polynomial
    );
    println!("    min distance      {}", wire.min_hamming_distance);

    let defaults = &output.defaults;
    println!("\n  Defaults:");
    println!("    tick rate         {} Hz", defaults.tick_hz);
    println!("    settle            {} ticks", defaults.settle_ticks);
    println!("    liveness timeout  {} ticks", defaults.liveness_ticks);
    println!("    direct limit      {} values", defaults.direct_symbol_limit);
    println!("    document limit    {} bytes", defaults.max_document_size);

    println!("\n  Dependencies:");
    for (name, version) in &output.dependencies {
        println!("    {name:<12} {version}");
    }
    println!("\n  Environment:");
    for (name, value) in &output.environment {
        println!("    {name:<20} {}", value.as_deref().unwrap_or("(not set)"));
    }
}
