use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use proxlink_spec::{DocumentLoader, LinkDocument, Role};

use crate::exit::{spec_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod codes;
pub mod compile;
pub mod doctor;
pub mod envinfo;
pub mod phases;
pub mod plan;
pub mod simulate;
pub mod verify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CRC codebook for a symbol count.
    Codes(CodesArgs),
    /// Show the slot layout one role compiles from a link document.
    Plan(PlanArgs),
    /// Show the probe sweep one role runs.
    Phases(PhasesArgs),
    /// Compile a link document into a binary artifact.
    Compile(CompileArgs),
    /// Check that two compiled artifacts form a working link.
    Verify(VerifyArgs),
    /// Run both roles of a link against a simulated field.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local self-checks.
    Doctor(DoctorArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Codes(args) => codes::run(args, format),
        Command::Plan(args) => plan::run(args, format),
        Command::Phases(args) => phases::run(args, format),
        Command::Compile(args) => compile::run(args, format),
        Command::Verify(args) => verify::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Transmitter,
    Receiver,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Transmitter => Role::Transmitter,
            RoleArg::Receiver => Role::Receiver,
        }
    }
}

#[derive(Args, Debug)]
pub struct CodesArgs {
    /// Number of symbols, including the reserved absent symbol.
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Link document (JSON).
    pub document: PathBuf,
    /// Role to plan for.
    #[arg(long, short = 'r', default_value = "transmitter")]
    pub role: RoleArg,
}

#[derive(Args, Debug)]
pub struct PhasesArgs {
    /// Link document (JSON).
    pub document: PathBuf,
    /// Role whose probe sweep to show.
    #[arg(long, short = 'r', default_value = "receiver")]
    pub role: RoleArg,
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Link document (JSON).
    pub document: PathBuf,
    /// Role to compile for.
    #[arg(long, short = 'r')]
    pub role: RoleArg,
    /// Write the artifact image to this file.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Compiled transmitter artifact.
    pub transmitter: PathBuf,
    /// Compiled receiver artifact.
    pub receiver: PathBuf,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Link document (JSON).
    pub document: PathBuf,
    /// Number of ticks to run.
    #[arg(long, default_value = "600")]
    pub ticks: u64,
    /// Host input for the sending role (NAME=VALUE, repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
    /// Host parameter for forward fallbacks (NAME=VALUE, repeatable).
    #[arg(long = "forward", value_name = "NAME=VALUE")]
    pub forward: Vec<String>,
    /// Hide a role from its peer from a tick on (ROLE@TICK).
    #[arg(long, value_name = "ROLE@TICK")]
    pub withdraw: Option<String>,
    /// Bring a withdrawn role back at a tick (ROLE@TICK).
    #[arg(long, value_name = "ROLE@TICK")]
    pub restore: Option<String>,
    /// Include every tick event in the output.
    #[arg(long)]
    pub events: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

pub fn load_document(path: &Path) -> CliResult<LinkDocument> {
    let loader = DocumentLoader::new().map_err(|err| spec_error("schema setup failed", err))?;
    loader
        .load(path)
        .map_err(|err| spec_error("invalid link document", err))
}

/// Parse `NAME=VALUE`.
pub fn parse_assignment(input: &str) -> CliResult<(String, i32)> {
    let Some((name, value)) = input.split_once('=') else {
        return Err(CliError::new(
            USAGE,
            format!("expected NAME=VALUE, got '{input}'"),
        ));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::new(USAGE, format!("missing name in '{input}'")));
    }
    let value = match value.trim() {
        "true" => 1,
        "false" => 0,
        other => other
            .parse()
            .map_err(|_| CliError::new(USAGE, format!("invalid value in '{input}'")))?,
    };
    Ok((name.to_string(), value))
}

/// Parse `ROLE@TICK`.
pub fn parse_role_at(input: &str) -> CliResult<(Role, u64)> {
    let Some((role, tick)) = input.split_once('@') else {
        return Err(CliError::new(
            USAGE,
            format!("expected ROLE@TICK, got '{input}'"),
        ));
    };
    let role = RoleArg::from_str(role.trim(), true)
        .map_err(|_| CliError::new(USAGE, format!("unknown role in '{input}'")))?;
    let tick = tick
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid tick in '{input}'")))?;
    Ok((role.into(), tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_accept_booleans_and_integers() {
        assert_eq!(parse_assignment("grip=true").unwrap(), ("grip".to_string(), 1));
        assert_eq!(parse_assignment("level = -3").unwrap(), ("level".to_string(), -3));
        assert!(parse_assignment("grip").is_err());
        assert!(parse_assignment("=1").is_err());
        assert!(parse_assignment("grip=yes").is_err());
    }

    #[test]
    fn role_at_tick() {
        assert_eq!(
            parse_role_at("transmitter@40").unwrap(),
            (Role::Transmitter, 40)
        );
        assert_eq!(parse_role_at("Receiver@0").unwrap(), (Role::Receiver, 0));
        assert_eq!(parse_role_at("nobody@1").unwrap_err().code, USAGE);
        assert_eq!(parse_role_at("receiver").unwrap_err().code, USAGE);
    }
}
