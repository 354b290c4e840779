//! Decode syndromes from a DEM file with the graph oracle.
//!
//! Usage: oracle_decode <dem_file>
//! Stdin:  one syndrome per line, space-separated 0/1 per detector
//! Stdout: one line per syndrome, space-separated indices of flipped observables
//!
//! An empty stdin line is a syndrome with no detectors and still gets its output line.

use std::io::{self, BufRead, BufWriter, Write};
use std::process::ExitCode;

use dem_crosscheck::{init_logging, CrosscheckError, GraphOracle, Result};
use tracing::debug;

fn main() -> ExitCode {
    init_logging();

    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        eprintln!("Usage: oracle_decode <dem_file>");
        return ExitCode::from(1);
    }

    match decode_stream(&args[1]) {
        Ok(count) => {
            debug!(count, "syndromes decoded");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("oracle_decode: {}", e);
            ExitCode::from(1)
        }
    }
}

fn decode_stream(dem_path : &str) -> Result<usize> {
    let oracle = GraphOracle::from_dem_text(&std::fs::read_to_string(dem_path)?)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0usize;
    for (line_idx, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let syndrome = parse_syndrome(line)
            .map_err(|reason| CrosscheckError::InvalidParameter(format!("stdin line {}: {}", line_idx + 1, reason)))?;
        let faults = oracle.decode(&syndrome)?;
        let tokens = faults.iter().map(|f| f.to_string()).collect::<Vec<_>>();
        writeln!(out, "{}", tokens.join(" "))?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

fn parse_syndrome(line : &str) -> std::result::Result<Vec<bool>, String> {
    line.split_whitespace()
        .map(|token| match token {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(format!("syndrome values must be 0 or 1, got '{}'", other)),
        })
        .collect()
}
