//! Mock transport for testing
//!
//! Simulates the stage firmware without hardware. It provides:
//! - Per-axis step counters and an LED register answering the real command set
//! - Injected empty reads before the next reply (slow controller)
//! - Scripted reply overrides and a silent mode (dead controller)
//! - A shared [`MockLog`] of every write for test verification

use super::Transport;
use crate::axis::Axis;
use crate::error::{AppResult, PositionerError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Observable record of what a [`MockTransport`] was asked to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockRecord {
    /// Every command written, in order.
    pub writes: Vec<String>,
    /// Total `read_line` calls, empty or not.
    pub reads: usize,
    /// Number of successful opens.
    pub opens: usize,
    /// Number of closes that actually closed an open channel.
    pub closes: usize,
}

/// Shared handle onto a [`MockTransport`]'s record.
///
/// Stays valid after the transport has been moved into (or dropped with) a session.
#[derive(Debug, Clone, Default)]
pub struct MockLog(Arc<Mutex<MockRecord>>);

impl MockLog {
    fn lock(&self) -> MutexGuard<'_, MockRecord> {
        // A poisoned record only happens after a test already panicked.
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Copy of the commands written so far.
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// Total `read_line` calls so far.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Snapshot of the whole record.
    pub fn snapshot(&self) -> MockRecord {
        self.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        *self.lock() = MockRecord::default();
    }
}

/// Simulated stage controller.
///
/// # Example
///
/// ```
/// use magnet_positioner::transport::{MockTransport, Transport};
///
/// let mut mock = MockTransport::new();
/// mock.open().unwrap();
/// mock.write_command("x-2000").unwrap();
/// assert_eq!(mock.read_line().unwrap(), "x-2000");
/// mock.write_command("x?").unwrap();
/// assert_eq!(mock.read_line().unwrap(), "-2000");
/// ```
#[derive(Debug)]
pub struct MockTransport {
    open: bool,
    steps: [i64; 3],
    led: i64,
    blank_reads: usize,
    silent: bool,
    overrides: VecDeque<String>,
    outbox: VecDeque<String>,
    log: MockLog,
}

impl MockTransport {
    /// Create a closed mock controller with all counters at zero.
    pub fn new() -> Self {
        Self {
            open: false,
            steps: [0; 3],
            led: 0,
            blank_reads: 0,
            silent: false,
            overrides: VecDeque::new(),
            outbox: VecDeque::new(),
            log: MockLog::default(),
        }
    }

    /// Start with the given raw step counts on x, y, z.
    pub fn with_steps(mut self, x: i64, y: i64, z: i64) -> Self {
        self.steps = [x, y, z];
        self
    }

    /// Return `count` empty lines before each reply.
    pub fn with_blank_reads(mut self, count: usize) -> Self {
        self.blank_reads = count;
        self
    }

    /// Never reply to anything.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Replace the next reply with `reply` verbatim.
    pub fn push_reply(&mut self, reply: impl Into<String>) {
        self.overrides.push_back(reply.into());
    }

    /// Shared handle onto this mock's write log.
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    /// Current simulated step counter of `axis`.
    pub fn steps(&self, axis: Axis) -> i64 {
        self.steps[Self::index(axis)]
    }

    fn index(axis: Axis) -> usize {
        match axis {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn respond(&mut self, command: &str) -> String {
        let mut chars = command.chars();
        let head = chars.next();
        let rest: String = chars.collect();
        let axis = head.and_then(|c| Axis::from_label(c).ok());

        match (head, axis) {
            (Some('L'), _) if rest == "?" => self.led.to_string(),
            (Some('L'), _) => match rest.parse::<i64>() {
                Ok(v) => {
                    self.led = v;
                    command.to_string()
                }
                Err(_) => "ERR".to_string(),
            },
            (Some('t'), _) => match rest.parse::<char>().ok().map(Axis::from_label) {
                Some(Ok(axis)) => {
                    self.steps[Self::index(axis)] = 0;
                    command.to_string()
                }
                _ => "ERR".to_string(),
            },
            (_, Some(axis)) if rest == "?" => self.steps[Self::index(axis)].to_string(),
            (_, Some(axis)) => match rest.parse::<i64>() {
                Ok(v) => {
                    self.steps[Self::index(axis)] = v;
                    command.to_string()
                }
                Err(_) => "ERR".to_string(),
            },
            _ => "ERR".to_string(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> AppResult<()> {
        if !self.open {
            self.open = true;
            self.log.lock().opens += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_command(&mut self, command: &str) -> AppResult<()> {
        if !self.open {
            return Err(PositionerError::NotConnected);
        }
        self.log.lock().writes.push(command.to_string());

        if self.silent {
            return Ok(());
        }
        let reply = match self.overrides.pop_front() {
            Some(reply) => reply,
            None => self.respond(command.trim_end()),
        };
        for _ in 0..self.blank_reads {
            self.outbox.push_back(String::new());
        }
        self.outbox.push_back(reply);
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<String> {
        if !self.open {
            return Err(PositionerError::NotConnected);
        }
        self.log.lock().reads += 1;
        Ok(self.outbox.pop_front().unwrap_or_default().trim().to_string())
    }

    fn close(&mut self) -> AppResult<()> {
        if self.open {
            self.open = false;
            self.outbox.clear();
            self.log.lock().closes += 1;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "mock controller".to_string()
    }
}
