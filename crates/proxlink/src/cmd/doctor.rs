use proxlink_codeword::{
    generate_codes, min_distance, nearest, symbol_of, Codeword, CRC_BITS, MAX_DATA_BITS,
    MIN_HAMMING_DISTANCE,
};
use proxlink_protocol::Loopback;
use proxlink_spec::{DocumentLoader, LinkSpec, Signal};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

const SELF_TEST_SYMBOLS: usize = 4096;
const CORRECTION_STRIDE: usize = 64;
const SELF_TEST_TICKS: u64 = 40;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        codeword_check(),
        document_schema_check(),
        loopback_check(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("proxlink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
    }
}

fn check(name: &str, status: CheckStatus, detail: impl Into<String>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status,
        detail: detail.into(),
    }
}

fn codeword_check() -> CheckResult {
    let codes = match generate_codes(SELF_TEST_SYMBOLS) {
        Ok(codes) => codes,
        Err(err) => return check("codeword_self_test", CheckStatus::Fail, err.to_string()),
    };
    let distance = match min_distance(&codes) {
        Some(distance) if distance >= MIN_HAMMING_DISTANCE => distance,
        Some(distance) => {
            return check(
                "codeword_self_test",
                CheckStatus::Fail,
                format!("min distance {distance} below {MIN_HAMMING_DISTANCE}"),
            )
        }
        None => return check("codeword_self_test", CheckStatus::Fail, "empty codebook"),
    };
    if let Some(symbol) = (0..codes.len()).find(|&i| symbol_of(codes[i]) != Some(i as u16)) {
        return check(
            "codeword_self_test",
            CheckStatus::Fail,
            format!("codeword for symbol {symbol} does not decode"),
        );
    }
    if let Some(symbol) = first_uncorrected(&codes) {
        return check(
            "codeword_self_test",
            CheckStatus::Fail,
            format!("single-bit error on symbol {symbol} not corrected"),
        );
    }
    check(
        "codeword_self_test",
        CheckStatus::Pass,
        format!("{} codewords, min distance {distance}", codes.len()),
    )
}

/// First sampled symbol whose one-bit corruptions do not map back to it.
fn first_uncorrected(codes: &[Codeword]) -> Option<usize> {
    let bits = MAX_DATA_BITS + CRC_BITS;
    (0..codes.len()).step_by(CORRECTION_STRIDE).find(|&index| {
        (0..bits).any(|bit| nearest(codes[index] ^ (1 << bit), codes, 1) != Some(index))
    })
}

fn document_schema_check() -> CheckResult {
    match DocumentLoader::new() {
        Ok(loader) => check(
            "document_schema",
            CheckStatus::Pass,
            format!("compiled, {} byte limit", loader.max_size()),
        ),
        Err(err) => check("document_schema", CheckStatus::Fail, err.to_string()),
    }
}

fn loopback_check() -> CheckResult {
    let spec = LinkSpec::new("doctor").with_signal(Signal::bool("grip"));
    let result = Loopback::from_spec(&spec).and_then(|mut link| {
        link.transmitter_mut().set_input("grip", 1)?;
        link.run_until(SELF_TEST_TICKS, |link| {
            matches!(link.receiver().output("grip"), Ok(1))
        })
    });
    match result {
        Ok(Some(ticks)) => check(
            "loopback_self_test",
            CheckStatus::Pass,
            format!("value latched after {ticks} ticks"),
        ),
        Ok(None) => check(
            "loopback_self_test",
            CheckStatus::Fail,
            format!("value not latched within {SELF_TEST_TICKS} ticks"),
        ),
        Err(err) => check("loopback_self_test", CheckStatus::Fail, err.to_string()),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    check("compiled_features", CheckStatus::Info, features.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_checks_pass() {
        assert!(matches!(codeword_check().status, CheckStatus::Pass));
        assert!(matches!(document_schema_check().status, CheckStatus::Pass));
        assert!(matches!(loopback_check().status, CheckStatus::Pass));
    }

    #[test]
    fn close_codewords_fail_correction() {
        assert_eq!(first_uncorrected(&[0b00, 0b11]), Some(0));
        let codes = generate_codes(256).unwrap();
        assert_eq!(first_uncorrected(&codes), None);
    }

    #[test]
    fn doctor_output_has_overall_status() {
        let output = DoctorOutput {
            schema_id: "x",
            checks: vec![check("x", CheckStatus::Pass, "ok")],
            overall: "pass",
        };
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"overall\":\"pass\""));
    }
}
