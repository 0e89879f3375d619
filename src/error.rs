//! Error taxonomy of the sweep pipeline.
//!
//! Fatal conditions are real errors: a [`ConfigurationError`] aborts grid generation and a
//! [`SubmissionError`] aborts a single execution unit. Per-run gaps met during extraction and
//! aggregation are diagnostics instead, see [`ExtractionGap`](crate::extract::ExtractionGap) and
//! [`AggregationGap`](crate::aggregate::AggregationGap).

use thiserror::Error;

use crate::grid::ConfigId;

/// Raised while building a sweep grid. Aborts the whole generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Two distinct axis tuples rendered the same configuration name.
    #[error("duplicate configuration name '{name}': produced by {first} and by {second}")]
    DuplicateName {
        /// The colliding name.
        name: String,
        /// Identity of the configuration that claimed the name first.
        first: Box<ConfigId>,
        /// Identity of the configuration that collided with it.
        second: Box<ConfigId>,
    },

    /// An axis was declared without any value.
    #[error("axis '{0}' has no values")]
    EmptyAxis(String),

    /// An axis lists the same value twice.
    #[error("axis '{axis}' lists value {value} more than once")]
    RepeatedAxisValue {
        /// Axis name.
        axis: String,
        /// Rendered value.
        value: String,
    },

    /// A numeric range that cannot be enumerated (zero step, NaN bound, ...).
    #[error("axis '{axis}': {reason}")]
    InvalidRange {
        /// Axis name.
        axis: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The grid has no seeds, so it would never produce an execution unit.
    #[error("sweep '{0}' declares no seeds")]
    NoSeeds(String),
}

/// Raised while turning a `(RunConfig, seed)` pair into an execution unit.
///
/// Fatal only for that unit: the dispatcher records it and carries on with the batch.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// A flag is empty or does not start with `-`.
    #[error("invalid flag '{0}'")]
    InvalidFlag(String),

    /// The value of a flag is not a string. The solver only accepts string arguments.
    #[error("value of '{flag}' is not a string (got {kind} {value})")]
    NonStringValue {
        /// Flag carrying the value.
        flag: String,
        /// Kind of the offending value.
        kind: &'static str,
        /// Rendered value.
        value: String,
    },

    /// A string value cannot be passed as a single argument.
    #[error("value '{value}' of '{flag}' {reason}")]
    MalformedValue {
        /// Flag carrying the value.
        flag: String,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A unit with the same canonical name and seed was already registered.
    #[error("'{canonical_name}' with seed {seed} was already submitted")]
    DuplicateUnit {
        /// Canonical configuration name (`<domain>-<name>`).
        canonical_name: String,
        /// Replicate seed.
        seed: u64,
    },

    /// The backend refused the unit (after retries, if any were allowed).
    #[error("backend refused '{run_id}' after {attempts} attempt(s)")]
    Backend {
        /// Run id handed to the backend.
        run_id: String,
        /// Number of submission attempts made.
        attempts: u32,
        /// Last backend error.
        #[source]
        source: BackendError,
    },
}

/// Error reported by an [`ExecutionBackend`](crate::dispatch::ExecutionBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    /// Temporary condition; the submission may succeed if retried.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The backend will never accept this unit.
    #[error("backend rejected the unit: {0}")]
    Rejected(String),

    /// Anything else (IO, serialization...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Raised when a swept parameter cannot be recovered from a canonical name.
///
/// The legacy plotting script silently dropped such names; here every failure is returned to
/// the caller, which logs it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterDecodeError {
    /// The algorithm token does not occur in the name.
    #[error("token '{token}' not found")]
    TokenNotFound {
        /// Token searched for.
        token: String,
    },

    /// The name ends right after the token.
    #[error("nothing follows token '{token}'")]
    NothingAfterToken {
        /// Token searched for.
        token: String,
    },

    /// The character after the token is not a digit (e.g. `uct` matching inside `ucttuned`).
    #[error("expected a digit after the token, found '{0}'")]
    NotADigit(char),

    /// `div10` denominators are skipped, as the legacy decoder did.
    #[error("denominator token '10' is skipped")]
    DenominatorTen,

    /// A `div` encoding whose denominator is not a usable digit.
    #[error("invalid denominator '{0}'")]
    InvalidDenominator(String),

    /// The assembled literal is not a floating point number.
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
}
