use std::env;

use tracing::info;

use crate::comparator::{compare, Verdict};
use crate::decoder::{DecoderConfig, OutputFormat};
use crate::detector_error_model::build_repetition_dem;
use crate::error::{CrosscheckError, Result};
use crate::process_decoder::ProcessDecoderConfig;
use crate::syndrome_sampler::sample_syndromes;

pub const NUM_SYNDROMES : usize = 1000;
pub const CHAIN_LENGTH : usize = 5;
pub const ERROR_PROBABILITY : f64 = 0.1;
pub const SEED : u64 = 42;

/// Decoder under test when nothing else is configured
pub const DEFAULT_DECODER_PROGRAM : &str = "rmatching_cli";

/// Overrides the candidate decoder program
pub const DECODER_ENV : &str = "DEM_CROSSCHECK_DECODER";
/// `sparse` or `dense`
pub const FORMAT_ENV : &str = "DEM_CROSSCHECK_FORMAT";

/// Everything one cross-check run depends on. Fixed before the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub num_syndromes : usize,
    pub chain_length : usize,
    pub error_probability : f64,
    pub seed : u64,
    pub candidate : DecoderConfig,
    pub reference : DecoderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_syndromes: NUM_SYNDROMES,
            chain_length: CHAIN_LENGTH,
            error_probability: ERROR_PROBABILITY,
            seed: SEED,
            candidate: DecoderConfig::ExternalProcess(ProcessDecoderConfig::new(DEFAULT_DECODER_PROGRAM, OutputFormat::Dense)),
            reference: DecoderConfig::GraphOracle,
        }
    }
}

impl RunConfig {
    /// Compiled-in run parameters; only the candidate program and its output format may come from the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = RunConfig::default();
        if let DecoderConfig::ExternalProcess(candidate) = &mut config.candidate {
            if let Some(program) = env::var_os(DECODER_ENV) {
                candidate.program = program.into();
            }
            match env::var(FORMAT_ENV) {
                Ok(format) => candidate.output_format = format.parse()?,
                Err(env::VarError::NotPresent) => {}
                Err(e) => return Err(CrosscheckError::InvalidParameter(format!("{}: {}", FORMAT_ENV, e))),
            }
        }
        Ok(config)
    }

    /// Bits per sampled syndrome: one per detector on the chain interior
    pub fn syndrome_width(self : &Self) -> usize {
        self.chain_length.saturating_sub(1)
    }
}

/// Build the DEM, sample the batch and compare candidate against reference.
pub fn run(config : &RunConfig) -> Result<Verdict> {
    let dem_text = build_repetition_dem(config.chain_length, config.error_probability)?;
    info!(d = config.chain_length, p = config.error_probability, "repetition DEM built");

    let syndromes = sample_syndromes(config.num_syndromes, config.syndrome_width(), config.seed);
    info!(n = syndromes.len(), width = config.syndrome_width(), seed = config.seed, "syndromes sampled");

    let mut candidate = config.candidate.build();
    let mut reference = config.reference.build();
    compare(&dem_text, &syndromes, candidate.as_mut(), reference.as_mut())
}
