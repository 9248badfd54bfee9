//! Unified error types for the PWM/ADC core.
//!
//! Nothing on the tick path returns these: delegation failures fall back
//! to software PWM and settle timeouts are counted and logged.  Errors
//! only surface from construction-time work (config validation, board
//! table checks, EEPROM access) where the caller can still fall back to
//! defaults.  All variants are `Copy`.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible construction-time operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// The board table violates a binding invariant.
    Board(BoardError),
    /// EEPROM access failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Board(e) => write!(f, "board: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Board table errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// More outputs than the service can hold.
    TooManyOutputs,
    /// More analog inputs than the pipeline can hold.
    TooManyInputs,
    /// Two logical outputs claim the same PWM channel.
    PwmChannelShared(u8),
    /// Two logical outputs claim the same Timer/Counter sub-output.
    TimerOutputShared(u8),
    /// PWM channel index beyond the engine's channel count.
    PwmChannelOutOfRange(u8),
    /// Timer channel index beyond the Timer/Counter block.
    TimerChannelOutOfRange(u8),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyOutputs => write!(f, "too many outputs"),
            Self::TooManyInputs => write!(f, "too many analog inputs"),
            Self::PwmChannelShared(ch) => write!(f, "PWM channel {ch} bound twice"),
            Self::TimerOutputShared(ch) => write!(f, "timer channel {ch} output bound twice"),
            Self::PwmChannelOutOfRange(ch) => write!(f, "PWM channel {ch} out of range"),
            Self::TimerChannelOutOfRange(ch) => write!(f, "timer channel {ch} out of range"),
        }
    }
}

impl From<BoardError> for Error {
    fn from(e: BoardError) -> Self {
        Self::Board(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Storage(e) => Self::Storage(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
