//! Error types for the accumulator.

use thiserror::Error;

/// Error returned when starting an accumulator.
#[derive(Debug, Error)]
pub enum AccumulatorError {
    /// The consumption loop is already running for this accumulator.
    #[error("accumulator already started")]
    AlreadyStarted,
}
