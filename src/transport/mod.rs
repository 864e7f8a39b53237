//! Byte channel between the session and the controller.
//!
//! The session only needs four things from a channel: open it, write a
//! command, read one line (possibly empty when nothing arrived within the
//! read timeout), and close it. [`SerialTransport`] does this over a real
//! port; [`MockTransport`] simulates the controller firmware for tests.

pub mod mock;
pub mod serial;

pub use mock::{MockLog, MockTransport};
pub use serial::{SerialSettings, SerialTransport};

use crate::error::AppResult;

/// Line-oriented command channel.
pub trait Transport {
    /// Open the underlying channel. Opening an open channel is a no-op.
    fn open(&mut self) -> AppResult<()>;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Write `command` verbatim and flush.
    fn write_command(&mut self, command: &str) -> AppResult<()>;

    /// Read one line, decoded and trimmed.
    ///
    /// Returns an empty string when the read timeout elapsed without a
    /// complete line.
    fn read_line(&mut self) -> AppResult<String>;

    /// Close the channel. Closing a closed channel is a no-op.
    fn close(&mut self) -> AppResult<()>;

    /// Human-readable channel identity for logs.
    fn describe(&self) -> String;
}
