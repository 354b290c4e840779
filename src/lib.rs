pub mod error;
pub mod detector_error_model;
pub mod syndrome_sampler;
pub mod decoder;
pub mod process_decoder;
pub mod graph_oracle;
pub mod comparator;
pub mod harness;

pub use comparator::{compare, Counterexample, MismatchReport, Verdict};
pub use decoder::{Decoder, DecoderConfig, FaultVector, OutputFormat};
pub use detector_error_model::{build_repetition_dem, mechanism_weight, DetectorErrorModel, ErrorMechanism};
pub use error::{CrosscheckError, Result};
pub use graph_oracle::{GraphOracle, GraphOracleDecoder};
pub use harness::{run, RunConfig};
pub use process_decoder::{remove_live_artifacts, ProcessDecoder, ProcessDecoderConfig};
pub use syndrome_sampler::{sample_syndromes, Bitstring, SyndromeSampler};

/// Log to stderr, filtered by `RUST_LOG` (default `warn`)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
