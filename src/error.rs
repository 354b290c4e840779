use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscheckError>;

/// Everything that can abort a cross-check run.
///
/// A disagreement between decoders is not in here: it is reported as
/// [`crate::comparator::Verdict::ComparisonMismatch`].
#[derive(Debug, Error)]
pub enum CrosscheckError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid DEM at line {line}: {reason}")]
    InvalidDem { line : usize, reason : String },

    /// The external decoder failed or broke the output protocol.
    /// `diagnostics` holds whatever it wrote to stderr.
    #[error("decoder process error: {reason}\n{diagnostics}")]
    DecoderProcess { reason : String, diagnostics : String },

    #[error("no perfect matching exists: {0}")]
    Unmatchable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrosscheckError {
    pub(crate) fn process(reason : impl Into<String>, diagnostics : impl Into<String>) -> Self {
        CrosscheckError::DecoderProcess { reason: reason.into(), diagnostics: diagnostics.into() }
    }

    pub(crate) fn dem(line : usize, reason : impl Into<String>) -> Self {
        CrosscheckError::InvalidDem { line, reason: reason.into() }
    }
}
