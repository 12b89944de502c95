mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "proxlink", version, about = "Proximity link planning and simulation CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "PROXLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simulate_subcommand() {
        let cli = Cli::try_parse_from([
            "proxlink",
            "simulate",
            "link.json",
            "--ticks",
            "120",
            "--set",
            "grip=1",
            "--withdraw",
            "transmitter@40",
        ])
        .expect("simulate args should parse");

        assert!(matches!(cli.command, Command::Simulate(_)));
    }

    #[test]
    fn parses_codes_subcommand() {
        let cli = Cli::try_parse_from(["proxlink", "--format", "json", "codes", "17"])
            .expect("codes args should parse");
        assert!(matches!(cli.command, Command::Codes(_)));
    }

    #[test]
    fn rejects_unknown_role() {
        let err = Cli::try_parse_from(["proxlink", "plan", "link.json", "--role", "observer"])
            .expect_err("unknown role should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
