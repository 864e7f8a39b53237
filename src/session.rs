//! Device session for the magnet positioning stage.
//!
//! A [`DeviceSession`] owns the controller channel and mediates every read and
//! write. Each operation is a blocking round trip: write one command, then read
//! lines until a non-empty one arrives or the [`ReadPolicy`] budget runs out.
//! Nothing is pipelined; the controller has a single unlabelled reply channel.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened --open()--> Open --close()--> Closed
//! ```
//!
//! Only `Open` permits I/O. `Closed` is terminal. Dropping a session closes it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use magnet_positioner::{config::PositionerConfig, session::DeviceSession, axis::Axis};
//!
//! let config = PositionerConfig::load()?;
//! DeviceSession::scoped(&config, |stage| {
//!     stage.set_axis_mm(Axis::X, 10.0)?;
//!     println!("{}", stage.position()?);
//!     Ok(())
//! })?;
//! ```

use crate::axis::{Axis, AxisTable, Position};
use crate::config::PositionerConfig;
use crate::error::{AppResult, PositionerError};
use crate::protocol::{self, Command};
use crate::read_policy::ReadPolicy;
use crate::transport::{SerialTransport, Transport};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, channel not yet opened.
    Unopened,
    /// Channel open, I/O permitted.
    Open,
    /// Channel closed for good.
    Closed,
}

/// Protocol timing and framing for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Warm-up delay after the port opens before the controller answers reliably.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,
    /// Pause between empty read attempts.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Budget for waiting on a reply.
    #[serde(default)]
    pub read_policy: ReadPolicy,
    /// Appended to every command. The stock firmware expects none.
    #[serde(default)]
    pub line_terminator: String,
    /// Read and log the position right after connecting.
    #[serde(default = "default_report_position")]
    pub report_position_on_open: bool,
}

fn default_settle() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(10)
}

fn default_report_position() -> bool {
    true
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settle: default_settle(),
            poll_interval: default_poll_interval(),
            read_policy: ReadPolicy::default(),
            line_terminator: String::new(),
            report_position_on_open: default_report_position(),
        }
    }
}

impl SessionOptions {
    /// No settle delay and no polling pause, for simulated controllers.
    ///
    /// A real controller needs the settle delay; [`DeviceSession::connect`]
    /// rejects a configuration without one.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            poll_interval: Duration::ZERO,
            report_position_on_open: false,
            ..Default::default()
        }
    }

    /// Replace the read policy.
    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }
}

/// Session with the stage controller over a [`Transport`].
pub struct DeviceSession<T: Transport> {
    transport: T,
    axes: AxisTable,
    options: SessionOptions,
    state: SessionState,
}

impl DeviceSession<SerialTransport> {
    /// Open a serial session from configuration.
    ///
    /// # Errors
    /// Returns error if:
    /// - The configuration fails [`PositionerConfig::validate`], e.g. a zero settle delay
    /// - No serial port is configured ([`PositionerError::Configuration`])
    /// - The port cannot be opened
    pub fn connect(config: &PositionerConfig) -> AppResult<Self> {
        config.validate()?;
        let transport = SerialTransport::new(&config.serial)?;
        let mut session = Self::new(transport, config.axes, config.session.clone())?;
        session.open()?;

        if session.options.report_position_on_open {
            let position = session.position()?;
            info!("Current position: {}", position);
        }
        Ok(session)
    }

    /// Connect, run `f`, and close on every exit path.
    pub fn scoped<R>(
        config: &PositionerConfig,
        f: impl FnOnce(&mut Self) -> AppResult<R>,
    ) -> AppResult<R> {
        Self::connect(config)?.run(f)
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Create an unopened session.
    ///
    /// # Errors
    /// Returns [`PositionerError::Configuration`] if the axis table fails validation.
    pub fn new(transport: T, axes: AxisTable, options: SessionOptions) -> AppResult<Self> {
        axes.validate()?;
        Ok(Self {
            transport,
            axes,
            options,
            state: SessionState::Unopened,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether commands can be sent.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open && self.transport.is_open()
    }

    /// Axis constants in use.
    pub fn axes(&self) -> &AxisTable {
        &self.axes
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the channel and wait for the controller to settle.
    #[instrument(skip(self), fields(channel = %self.transport.describe()), err)]
    pub fn open(&mut self) -> AppResult<()> {
        match self.state {
            SessionState::Open => return Ok(()),
            SessionState::Closed => return Err(PositionerError::SessionClosed),
            SessionState::Unopened => {}
        }

        self.transport.open()?;
        if !self.options.settle.is_zero() {
            debug!("Waiting {:?} for controller to settle", self.options.settle);
            thread::sleep(self.options.settle);
        }
        self.state = SessionState::Open;
        info!("Connected to {}", self.transport.describe());
        Ok(())
    }

    /// Close the channel. Closing twice is a no-op.
    pub fn close(&mut self) -> AppResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let was_open = self.state == SessionState::Open;
        self.state = SessionState::Closed;
        self.transport.close()?;
        if was_open {
            info!("Connection to {} closed", self.transport.describe());
        }
        Ok(())
    }

    /// Open if needed, run `f`, then close regardless of the outcome.
    ///
    /// The error from `f` wins over a close failure.
    pub fn run<R>(mut self, f: impl FnOnce(&mut Self) -> AppResult<R>) -> AppResult<R> {
        let result = self.open().and_then(|_| f(&mut self));
        let closed = self.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Send `command` and block until the controller replies.
    #[instrument(level = "debug", skip(self), fields(command = %command), err)]
    pub fn ask(&mut self, command: Command) -> AppResult<String> {
        if !self.is_open() {
            return Err(PositionerError::NotConnected);
        }

        let wire = format!("{}{}", command.encode(), self.options.line_terminator);
        self.transport.write_command(&wire)?;
        debug!("Sent command: {}", command);

        let mut budget = self.options.read_policy.start();
        loop {
            let reply = self.transport.read_line()?;
            if !reply.is_empty() {
                if command.is_query() {
                    debug!(empty_reads = budget.empty_reads(), "Received reply: {}", reply);
                } else {
                    debug!(empty_reads = budget.empty_reads(), "Acknowledged: {}", reply);
                }
                return Ok(reply);
            }

            if !budget.record_empty() {
                warn!(
                    attempts = budget.empty_reads(),
                    "No reply to {} within read budget", command
                );
                return Err(PositionerError::NoReply {
                    command: command.encode(),
                    attempts: budget.empty_reads(),
                    elapsed: budget.elapsed(),
                });
            }

            if !self.options.poll_interval.is_zero() {
                thread::sleep(self.options.poll_interval);
            }
        }
    }

    fn ask_integer(&mut self, command: Command) -> AppResult<i64> {
        let reply = self.ask(command)?;
        protocol::parse_integer(&command, &reply)
    }

    /// LED state.
    pub fn led(&mut self) -> AppResult<i64> {
        self.ask_integer(Command::QueryLed)
    }

    /// Set the LED state.
    #[instrument(skip(self), err)]
    pub fn set_led(&mut self, value: i64) -> AppResult<()> {
        self.ask(Command::SetLed(value)).map(|_| ())
    }

    /// Raw controller step count of `axis`.
    pub fn steps(&mut self, axis: Axis) -> AppResult<i64> {
        self.ask_integer(Command::QueryAxis(axis))
    }

    /// Command `axis` to a raw step count.
    ///
    /// Counts outside the controller's signed 32-bit counter are rejected
    /// before any I/O.
    #[instrument(skip(self), err)]
    pub fn set_steps(&mut self, axis: Axis, steps: i64) -> AppResult<()> {
        if i32::try_from(steps).is_err() {
            return Err(PositionerError::StepRange { axis, steps });
        }
        self.ask(Command::SetAxis(axis, steps)).map(|_| ())
    }

    /// Position of `axis` in millimetres.
    pub fn axis_mm(&mut self, axis: Axis) -> AppResult<f64> {
        let steps = self.steps(axis)?;
        Ok(self.axes.get(axis).to_mm(steps))
    }

    /// Move `axis` to `mm`, rejecting targets outside its bounds before any I/O.
    #[instrument(skip(self), err)]
    pub fn set_axis_mm(&mut self, axis: Axis, mm: f64) -> AppResult<()> {
        let cfg = *self.axes.get(axis);
        if !cfg.contains(mm) {
            return Err(PositionerError::Range {
                axis,
                value_mm: mm,
                min_mm: cfg.min_mm,
                max_mm: cfg.max_mm,
            });
        }
        let steps = cfg.to_steps(mm);
        debug!(steps, "Converted {} mm", mm);
        self.set_steps(axis, steps)
    }

    /// Move `axis` by `delta_mm` relative to where it is now.
    pub fn move_by_mm(&mut self, axis: Axis, delta_mm: f64) -> AppResult<f64> {
        let target = self.axis_mm(axis)? + delta_mm;
        self.set_axis_mm(axis, target)?;
        Ok(target)
    }

    /// Fresh read of all three axes, in x, y, z order.
    pub fn position(&mut self) -> AppResult<Position> {
        Ok(Position {
            x: self.axis_mm(Axis::X)?,
            y: self.axis_mm(Axis::Y)?,
            z: self.axis_mm(Axis::Z)?,
        })
    }

    /// Zero the step counters of the axes named in `labels` (e.g. `"xyz"`).
    ///
    /// Labels are case-insensitive. Every label is checked before the first
    /// command goes out.
    pub fn tare(&mut self, labels: &str) -> AppResult<()> {
        let axes = Axis::parse_labels(labels)?;
        self.tare_axes(&axes)
    }

    /// Zero the step counters of `axes`, in order.
    #[instrument(skip(self), err)]
    pub fn tare_axes(&mut self, axes: &[Axis]) -> AppResult<()> {
        for &axis in axes {
            self.ask(Command::Tare(axis))?;
        }
        Ok(())
    }

    /// Zero all three step counters.
    pub fn tare_all(&mut self) -> AppResult<()> {
        self.tare_axes(&Axis::ALL)
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close session cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn open_session(mock: MockTransport) -> DeviceSession<MockTransport> {
        let mut session =
            DeviceSession::new(mock, AxisTable::default(), SessionOptions::immediate()).unwrap();
        session.open().unwrap();
        session
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session =
            DeviceSession::new(MockTransport::new(), AxisTable::default(), SessionOptions::immediate())
                .unwrap();
        assert_eq!(session.state(), SessionState::Unopened);
        assert_eq!(session.axes(), &AxisTable::default());
        assert!(!session.transport().is_open());
        session.open().unwrap();
        assert!(session.transport().is_open());
        assert_eq!(session.state(), SessionState::Open);
        session.open().unwrap();
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.open(), Err(PositionerError::SessionClosed)));
    }

    #[test]
    fn test_unopened_session_refuses_io() {
        let mock = MockTransport::new();
        let log = mock.log();
        let mut session =
            DeviceSession::new(mock, AxisTable::default(), SessionOptions::immediate()).unwrap();
        assert!(matches!(session.led(), Err(PositionerError::NotConnected)));
        assert!(log.writes().is_empty());
    }

    #[test]
    fn test_set_steps_outside_counter_range() {
        let mock = MockTransport::new();
        let log = mock.log();
        let mut session = open_session(mock);
        let err = session.set_steps(Axis::Y, i64::from(i32::MAX) + 1).unwrap_err();
        assert!(matches!(err, PositionerError::StepRange { axis: Axis::Y, .. }));
        assert!(log.writes().is_empty());
    }

    #[test]
    fn test_move_by_mm_is_relative() {
        let mut session = open_session(MockTransport::new());
        session.set_axis_mm(Axis::Z, 100.0).unwrap();
        let target = session.move_by_mm(Axis::Z, 2.5).unwrap();
        assert!((target - 102.5).abs() < 1e-9);
        assert!((session.axis_mm(Axis::Z).unwrap() - 102.5).abs() < 1e-9);
    }

    #[test]
    fn test_line_terminator_appended() {
        let mock = MockTransport::new();
        let log = mock.log();
        let options = SessionOptions {
            line_terminator: "\n".to_string(),
            ..SessionOptions::immediate()
        };
        let mut session = DeviceSession::new(mock, AxisTable::default(), options).unwrap();
        session.open().unwrap();
        session.led().unwrap();
        assert_eq!(log.writes(), vec!["L?\n".to_string()]);
    }
}
