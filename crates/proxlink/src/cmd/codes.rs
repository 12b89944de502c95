use proxlink_codeword::{data_width, generate_codes, min_distance, CRC_BITS};
use serde::Serialize;

use crate::cmd::CodesArgs;
use crate::exit::{codeword_error, CliResult, SUCCESS};
use crate::output::{hex_word, print_json, table, OutputFormat};

#[derive(Serialize)]
struct CodeEntry {
    symbol: usize,
    codeword: u32,
}

#[derive(Serialize)]
struct CodesOutput {
    schema_id: &'static str,
    count: usize,
    data_bits: u32,
    crc_bits: u32,
    min_distance: Option<u32>,
    codes: Vec<CodeEntry>,
}

pub fn run(args: CodesArgs, format: OutputFormat) -> CliResult<i32> {
    let codes =
        generate_codes(args.count).map_err(|err| codeword_error("codebook failed", err))?;
    let data_bits =
        data_width(args.count).map_err(|err| codeword_error("codebook failed", err))?;

    let output = CodesOutput {
        schema_id: "https://schemas.3leaps.dev/proxlink/cli/v1/codebook.schema.json",
        count: codes.len(),
        data_bits,
        crc_bits: CRC_BITS,
        min_distance: min_distance(&codes),
        codes: codes
            .iter()
            .enumerate()
            .map(|(symbol, codeword)| CodeEntry {
                symbol,
                codeword: *codeword,
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            let mut out = table(vec!["SYMBOL", "CODEWORD", "BITS"]);
            for entry in &output.codes {
                out.add_row(vec![
                    entry.symbol.to_string(),
                    hex_word(entry.codeword),
                    format!("{:0width$b}", entry.codeword, width = bit_width(&output)),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} codewords, {} data bits + {} crc bits, min distance {}",
                output.count,
                output.data_bits,
                output.crc_bits,
                output
                    .min_distance
                    .map_or_else(|| "n/a".to_string(), |d| d.to_string())
            );
            for entry in &output.codes {
                println!("  {:>5}  {}", entry.symbol, hex_word(entry.codeword));
            }
        }
        OutputFormat::Raw => {
            for entry in &output.codes {
                println!("{}", entry.codeword);
            }
        }
    }

    Ok(SUCCESS)
}

fn bit_width(output: &CodesOutput) -> usize {
    (output.data_bits + output.crc_bits) as usize
}
