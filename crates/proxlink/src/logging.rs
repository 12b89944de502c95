use std::str::FromStr;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Shape of the diagnostics written to stderr.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One human-readable line per event.
    Text,
    /// One JSON object per event, fields flattened, with the emitting crate.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Pick the more verbose of `--log-level` and a bare `RUST_LOG` level.
///
/// Directive lists such as `proxlink_protocol=trace` are not understood
/// here and leave the flag in charge.
pub fn effective_filter(level: LogLevel, rust_log: Option<&str>) -> LevelFilter {
    let flag = LevelFilter::from(level);
    rust_log
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .map_or(flag, |env| env.max(flag))
}

/// Route tracing output from the proxlink crates to stderr; stdout carries
/// command output only. Per-tick protocol events sit at `trace`.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(effective_filter(level, rust_log.as_deref()))
        .with_ansi(false);

    let _ = match format {
        LogFormat::Text => builder.with_target(false).compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_level_applies_without_env() {
        assert_eq!(effective_filter(LogLevel::Warn, None), LevelFilter::WARN);
        assert_eq!(effective_filter(LogLevel::Trace, None), LevelFilter::TRACE);
    }

    #[test]
    fn rust_log_only_raises_verbosity() {
        assert_eq!(effective_filter(LogLevel::Warn, Some("debug")), LevelFilter::DEBUG);
        assert_eq!(effective_filter(LogLevel::Debug, Some("error")), LevelFilter::DEBUG);
    }

    #[test]
    fn directive_lists_are_ignored() {
        assert_eq!(
            effective_filter(LogLevel::Info, Some("proxlink_protocol=trace")),
            LevelFilter::INFO
        );
    }
}
