//! Engine error types
//!
//! Only setup paths return errors. The render path never fails; it reports
//! through [`crate::DiagFlags`] instead.

use thiserror::Error;

/// Errors from engine setup and configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A sample rate of zero was supplied
    #[error("Sample rate must be non-zero ({0})")]
    ZeroSampleRate(&'static str),

    /// Sample data exceeds the 32-bit index range of the phase accumulator
    #[error("Sample buffer too large: {0} samples")]
    BufferTooLarge(usize),

    /// The deferred-deallocation thread could not be started
    #[error("Buffer collector unavailable: {0}")]
    CollectorUnavailable(String),

    /// Configuration value out of range
    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Result type for engine setup operations
pub type EngineResult<T> = Result<T, EngineError>;
