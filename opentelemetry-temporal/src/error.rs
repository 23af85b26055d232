use std::result;
use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned by the metrics core.
///
/// Only configuration-time operations surface these to callers. Problems
/// found while recording or collecting are reported through the internal
/// logging macros and never returned.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum MetricError {
    /// Invalid configuration
    #[error("Config error {0}")]
    Config(String),
    /// Invalid instrument configuration such as an invalid instrument name or
    /// unit.
    #[error("Invalid instrument configuration: {0}")]
    InvalidInstrumentConfiguration(&'static str),
    /// A NaN or infinite value was recorded.
    #[error("NaN or infinite value recorded")]
    NonFiniteInput,
    /// A negative value was recorded on an instrument that only accepts
    /// non-negative values.
    #[error("Negative value recorded on a non-negative instrument")]
    NegativeInput,
}
