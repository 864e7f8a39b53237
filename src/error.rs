//! Custom error types for the positioner.
//!
//! This module defines the primary error type, `PositionerError`, for the whole crate.
//! Using the `thiserror` crate, it gives one consistent place for every failure the
//! stage session can surface, from configuration problems to a silent controller.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`** / **`Config`**: no port supplied, or a configuration file that
//!   fails to parse or validate.
//! - **`NotConnected`** / **`SessionClosed`** / **`Serial`** / **`Io`**: the serial channel is
//!   unavailable or failed underneath us.
//! - **`Range`** / **`StepRange`**: a requested move lies outside the axis travel or the
//!   controller's counter range. Always raised before any byte is written.
//! - **`InvalidAxis`**: an axis label outside `{x, y, z}`.
//! - **`UnexpectedReply`** / **`NoReply`**: the controller answered with something we cannot
//!   parse, or did not answer within the configured read budget.
//!
//! Callers that only care about the broad category can match on [`PositionerError::kind`].

use crate::axis::Axis;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, PositionerError>;

/// Broad failure category of a [`PositionerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid configuration.
    Configuration,
    /// The serial channel is closed, unavailable or failed.
    Connection,
    /// Requested position outside configured bounds.
    Range,
    /// Axis label outside `{x, y, z}`.
    InvalidAxis,
    /// The controller replied with something unparseable.
    Protocol,
    /// The controller did not reply within the read budget.
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Range => "range",
            ErrorKind::InvalidAxis => "invalid_axis",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
        };
        write!(f, "{}", label)
    }
}

/// Primary error type for the positioner.
#[derive(Error, Debug)]
pub enum PositionerError {
    /// Semantic configuration problem, e.g. no serial port given.
    ///
    /// **Recovery Strategy**: enumerate ports with [`crate::ports::list_ports`], pick one
    /// and construct the session again.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// I/O attempted while the connection is not open.
    #[error("Serial connection is not open")]
    NotConnected,

    /// The session was closed and cannot be reopened.
    #[error("Session already closed; create a new session to reconnect")]
    SessionClosed,

    /// The serial port could not be opened or configured.
    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Read or write on the open channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Physical target outside the configured travel of an axis.
    #[error("{axis} target {value_mm} mm is outside bounds [{min_mm}, {max_mm}] mm")]
    Range {
        /// Axis being moved.
        axis: Axis,
        /// Requested position.
        value_mm: f64,
        /// Lower travel bound.
        min_mm: f64,
        /// Upper travel bound.
        max_mm: f64,
    },

    /// Raw step count outside the controller's signed 32-bit counter.
    #[error("{axis} step count {steps} exceeds the controller counter range")]
    StepRange {
        /// Axis being moved.
        axis: Axis,
        /// Requested step count.
        steps: i64,
    },

    /// Axis label outside `{x, y, z}`.
    #[error("Invalid coordinate '{0}', expected one of x, y, z")]
    InvalidAxis(String),

    /// The controller replied with text that does not parse.
    #[error("Unexpected reply '{reply}' to command '{command}'")]
    UnexpectedReply {
        /// Command that was sent.
        command: String,
        /// Trimmed reply line.
        reply: String,
    },

    /// The read budget ran out before a non-empty reply arrived.
    #[error("No reply to '{command}' after {attempts} read attempts ({elapsed:?})")]
    NoReply {
        /// Command that was sent.
        command: String,
        /// Number of empty reads performed.
        attempts: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// Functionality compiled out via feature flags.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for PositionerError {
    fn from(err: figment::Error) -> Self {
        PositionerError::Config(Box::new(err))
    }
}

impl PositionerError {
    /// Broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PositionerError::Configuration(_)
            | PositionerError::Config(_)
            | PositionerError::FeatureNotEnabled(_) => ErrorKind::Configuration,
            PositionerError::NotConnected
            | PositionerError::SessionClosed
            | PositionerError::Io(_) => ErrorKind::Connection,
            #[cfg(feature = "instrument_serial")]
            PositionerError::Serial(_) => ErrorKind::Connection,
            PositionerError::Range { .. } | PositionerError::StepRange { .. } => ErrorKind::Range,
            PositionerError::InvalidAxis(_) => ErrorKind::InvalidAxis,
            PositionerError::UnexpectedReply { .. } => ErrorKind::Protocol,
            PositionerError::NoReply { .. } => ErrorKind::Timeout,
        }
    }
}
