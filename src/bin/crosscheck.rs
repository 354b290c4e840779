//! Cross-check a candidate MWPM decoder against the in-process graph oracle
//! on random repetition code syndromes.
//!
//! Exit status: 0 if every syndrome matches, 1 on any mismatch, 2 if a
//! decoder or the run parameters failed, 130 if interrupted.

use std::process::ExitCode;

use dem_crosscheck::{init_logging, remove_live_artifacts, run, RunConfig};
use tracing::warn;

/// 128 + SIGINT
const INTERRUPTED : i32 = 130;

fn main() -> ExitCode {
    init_logging();

    // The DEM handed to a decoder would otherwise outlive an interrupted run
    if let Err(e) = ctrlc::set_handler(|| {
        let removed = remove_live_artifacts();
        eprintln!("interrupted, removed {} DEM file(s)", removed);
        std::process::exit(INTERRUPTED);
    }) {
        warn!(error = %e, "no interrupt handler, DEM files may be left behind on Ctrl-C");
    }

    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    println!(
        "Cross-validating: rep code d={}, p={}, {} syndromes",
        config.chain_length, config.error_probability, config.num_syndromes,
    );
    match run(&config) {
        Ok(verdict) => {
            println!("{}", verdict.summary());
            ExitCode::from(verdict.exit_code())
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
