//! Controller wire protocol.
//!
//! Protocol Overview:
//! - Format: short ASCII tokens, one reply line per command
//! - Commands: `{axis}?`, `{axis}{steps}`, `t{axis}`, `L?`, `L{value}`
//! - Example: `"x-2000"` (move x to raw step -2000)
//!
//! The firmware never labels replies, so commands must be strictly serialized.

use crate::axis::Axis;
use crate::error::{AppResult, PositionerError};
use std::fmt;

/// A single controller command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `L?`, reply is the LED state.
    QueryLed,
    /// `L{v}`, reply is an acknowledgement.
    SetLed(i64),
    /// `{a}?`, reply is the raw step count of the axis.
    QueryAxis(Axis),
    /// `{a}{v}`, reply is an acknowledgement.
    SetAxis(Axis, i64),
    /// `t{a}`, zero the step counter of the axis.
    Tare(Axis),
}

impl Command {
    /// Wire text without any line terminator.
    pub fn encode(&self) -> String {
        match self {
            Command::QueryLed => "L?".to_string(),
            Command::SetLed(value) => format!("L{}", value),
            Command::QueryAxis(axis) => format!("{}?", axis.label()),
            Command::SetAxis(axis, steps) => format!("{}{}", axis.label(), steps),
            Command::Tare(axis) => format!("t{}", axis.label()),
        }
    }

    /// Whether the reply carries a value rather than a bare acknowledgement.
    pub fn is_query(&self) -> bool {
        matches!(self, Command::QueryLed | Command::QueryAxis(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Parse an integer reply such as a step count or LED state.
pub fn parse_integer(command: &Command, reply: &str) -> AppResult<i64> {
    reply
        .trim()
        .parse::<i64>()
        .map_err(|_| PositionerError::UnexpectedReply {
            command: command.encode(),
            reply: reply.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_encode_commands() {
        assert_eq!(Command::QueryLed.encode(), "L?");
        assert_eq!(Command::SetLed(1).encode(), "L1");
        assert_eq!(Command::QueryAxis(Axis::Y).encode(), "y?");
        assert_eq!(Command::SetAxis(Axis::X, -2000).encode(), "x-2000");
        assert_eq!(Command::Tare(Axis::Z).encode(), "tz");
    }

    #[test]
    fn test_query_classification() {
        assert!(Command::QueryAxis(Axis::X).is_query());
        assert!(!Command::Tare(Axis::X).is_query());
    }

    #[test]
    fn test_parse_integer_reply() {
        let cmd = Command::QueryAxis(Axis::X);
        assert_eq!(parse_integer(&cmd, " -2000 ").unwrap(), -2000);
        let err = parse_integer(&cmd, "busy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("x?"));
    }
}
