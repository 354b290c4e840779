use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use enum_as_inner::EnumAsInner;

use crate::error::{CrosscheckError, Result};
use crate::graph_oracle::GraphOracleDecoder;
use crate::process_decoder::{ProcessDecoder, ProcessDecoderConfig};
use crate::syndrome_sampler::Bitstring;

/// Correction predicted for one syndrome, in whichever shape the decoder emits it.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum FaultVector {
    /// Indices of the logical observables that flipped
    Sparse(Vec<usize>),
    /// One entry per logical observable, nonzero if it flipped
    Dense(Vec<u8>),
}

impl FaultVector {
    /// Sorted, deduplicated indices of flipped observables
    pub fn normalized(self : &Self) -> Vec<usize> {
        match self {
            FaultVector::Sparse(indices) => indices.iter().copied().collect::<BTreeSet<_>>().into_iter().collect(),
            FaultVector::Dense(bits) => bits.iter().enumerate().filter(|(_, &b)| b != 0).map(|(i, _)| i).collect(),
        }
    }
}

impl fmt::Display for FaultVector {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultVector::Sparse(indices) => write!(f, "{:?}", indices),
            FaultVector::Dense(bits) => write!(f, "{:?}", bits),
        }
    }
}

/// How an external decoder writes each output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Sparse,
    Dense,
}

impl OutputFormat {
    pub fn parse_line(self : Self, line : &str) -> std::result::Result<FaultVector, String> {
        let tokens = line.split_whitespace();
        match self {
            OutputFormat::Sparse => tokens
                .map(|t| t.parse::<usize>().map_err(|e| format!("bad fault index '{}': {}", t, e)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FaultVector::Sparse),
            OutputFormat::Dense => tokens
                .map(|t| t.parse::<u8>().map_err(|e| format!("bad fault bit '{}': {}", t, e)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FaultVector::Dense),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CrosscheckError;

    fn from_str(s : &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sparse" => Ok(OutputFormat::Sparse),
            "dense" => Ok(OutputFormat::Dense),
            other => Err(CrosscheckError::InvalidParameter(format!("unknown decoder output format '{}'", other))),
        }
    }
}

pub trait Decoder {
    /// Decode every syndrome of the batch against the DEM given as text.
    /// Returns exactly one fault vector per syndrome, in batch order.
    fn decode_batch(self : &mut Self, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>>;

    /// Short label used in logs
    fn name(self : &Self) -> String;
}

/// Which decoder implementation sits behind a [`Decoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderConfig {
    ExternalProcess(ProcessDecoderConfig),
    GraphOracle,
}

impl DecoderConfig {
    pub fn build(self : &Self) -> Box<dyn Decoder> {
        match self {
            DecoderConfig::ExternalProcess(config) => Box::new(ProcessDecoder::new(config.clone())),
            DecoderConfig::GraphOracle => Box::new(GraphOracleDecoder),
        }
    }
}
