//! Validation context: the frozen clock and run identity stamped on output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deterministic time provider with a frozen time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicTime {
    current_time: DateTime<Utc>,
}

impl DeterministicTime {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { current_time: time }
    }

    /// The frozen time
    pub fn current(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn with_time(&self, time: DateTime<Utc>) -> Self {
        Self { current_time: time }
    }
}

/// Everything about a validation run that is not part of its inputs.
///
/// Results and log entries read the time from here, never from the system
/// clock, so re-running with the same context reproduces the same output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationContext {
    time: DeterministicTime,
    run_id: Option<String>,
}

impl ValidationContext {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: DeterministicTime::new(time),
            run_id: None,
        }
    }

    pub fn builder() -> ValidationContextBuilder {
        ValidationContextBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.current()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Same run, later frozen time
    pub fn with_time(&self, time: DateTime<Utc>) -> Self {
        Self {
            time: self.time.with_time(time),
            run_id: self.run_id.clone(),
        }
    }
}

/// Builder for validation contexts
#[derive(Debug, Default)]
pub struct ValidationContextBuilder {
    time: Option<DateTime<Utc>>,
    run_id: Option<String>,
}

impl ValidationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Without an explicit time the clock is frozen at build time
    pub fn build(self) -> ValidationContext {
        ValidationContext {
            time: DeterministicTime::new(self.time.unwrap_or_else(Utc::now)),
            run_id: self.run_id,
        }
    }
}
