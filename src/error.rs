use thiserror::Error;

/// Result alias for `partita`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engines and their supporting types.
///
/// Only [`Error::EmptyInput`], [`Error::InvalidArgument`], [`Error::SchemaMismatch`],
/// [`Error::ThreadPool`] and [`Error::Config`] normally reach a caller of `fit`.
/// [`Error::NumericDegeneracy`] and [`Error::InsufficientData`] are raised inside
/// the iteration loops and recovered there (restart, smaller k, earlier search level).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Dataset has no records.
    #[error("empty input provided")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidArgument {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// A record value does not match the attribute it is stored under.
    #[error("schema mismatch at attribute {index}: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Attribute index (or record arity when the lengths differ).
        index: usize,
        /// Expected kind.
        expected: String,
        /// Found kind.
        found: String,
    },

    /// Fewer usable records than requested clusters.
    #[error("insufficient data: need at least {needed} records, got {got}")]
    InsufficientData {
        /// Records needed.
        needed: usize,
        /// Records available.
        got: usize,
    },

    /// Numerical breakdown during an iteration (non-finite likelihood, zero prior mass).
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// The worker pool could not be created.
    #[error("worker pool: {0}")]
    ThreadPool(String),

    /// Configuration could not be read.
    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Whether the engines may recover from this error by reseeding or shrinking k.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NumericDegeneracy(_) | Error::InsufficientData { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
