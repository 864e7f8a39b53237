//! Core library for the magnet positioner.
//!
//! Remote control of a three-axis magnet stage driven by a microcontroller over
//! a serial link. The controller only understands integer step counts; this
//! crate exposes positions in millimetres, converts between the two, and
//! enforces per-axis travel bounds before anything reaches the wire.
//!
//! - [`units`]: millimetre/step conversion
//! - [`axis`]: axes, mechanical constants, bounds and positions
//! - [`protocol`]: command tokens and reply parsing
//! - [`transport`]: serial and simulated channels
//! - [`session`]: the blocking command/response session
//! - [`ports`]: serial port enumeration

pub mod axis;
pub mod config;
pub mod error;
pub mod logging;
pub mod ports;
pub mod protocol;
pub mod read_policy;
pub mod session;
pub mod transport;
pub mod units;

pub use axis::{Axis, AxisConfig, AxisSign, AxisTable, Position};
pub use error::{AppResult, ErrorKind, PositionerError};
pub use session::{DeviceSession, SessionOptions, SessionState};
