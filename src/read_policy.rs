//! Retry budget for the blocking reply loop.
//!
//! Each read attempt already waits up to the serial read timeout. The policy
//! decides how many empty attempts are tolerated before the command is reported
//! as unanswered. [`ReadPolicy::Unbounded`] keeps waiting forever, matching
//! firmware tools that assume the controller always answers.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How long the session keeps waiting for a non-empty reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Never give up. A silent controller blocks the caller indefinitely.
    Unbounded,
    /// Give up after this many empty reads.
    MaxAttempts {
        /// Number of empty reads tolerated.
        attempts: u32,
    },
    /// Give up once this much time has passed since the command was written.
    Deadline {
        /// Total wait budget.
        #[serde(with = "humantime_serde")]
        timeout: Duration,
    },
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy::MaxAttempts { attempts: 10 }
    }
}

impl ReadPolicy {
    /// Start tracking one command's wait.
    pub fn start(&self) -> ReadBudget {
        ReadBudget {
            policy: *self,
            started: Instant::now(),
            empty_reads: 0,
        }
    }
}

/// Running state of a single wait under a [`ReadPolicy`].
#[derive(Debug)]
pub struct ReadBudget {
    policy: ReadPolicy,
    started: Instant,
    empty_reads: u32,
}

impl ReadBudget {
    /// Record an empty read. Returns `false` once the budget is exhausted.
    pub fn record_empty(&mut self) -> bool {
        self.empty_reads = self.empty_reads.saturating_add(1);
        match self.policy {
            ReadPolicy::Unbounded => true,
            ReadPolicy::MaxAttempts { attempts } => self.empty_reads < attempts,
            ReadPolicy::Deadline { timeout } => self.started.elapsed() < timeout,
        }
    }

    /// Empty reads recorded so far.
    pub fn empty_reads(&self) -> u32 {
        self.empty_reads
    }

    /// Time since the wait started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
