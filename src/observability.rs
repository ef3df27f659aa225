use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Severity levels for run logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced while serializing JSON-line log records.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-run counters. Errors accumulate here as counts rather than aborting
/// the run; the report carries them to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTelemetry {
    /// Distinct keys the change detector returned, summed over frames.
    pub keys_changed: u64,
    /// Frame records emitted across all frames.
    pub records_emitted: u64,
    /// Records excluded from frames over missing or uncomposable hook
    /// components.
    pub records_quarantined: u64,
    /// Hook strings that failed the parse grammar during bridge
    /// resolution, one per excluded record.
    pub malformed_hooks: u64,
    /// Keys rebuilt against a truncated history (sentinel boundaries used).
    /// Conservative: a key genuinely first observed after the retention
    /// floor counts here too, since evicted history cannot be told apart
    /// from absent history.
    pub boundary_gaps: u64,
}

impl RunTelemetry {
    pub fn absorb(&mut self, other: RunTelemetry) {
        self.keys_changed += other.keys_changed;
        self.records_emitted += other.records_emitted;
        self.records_quarantined += other.records_quarantined;
        self.malformed_hooks += other.malformed_hooks;
        self.boundary_gaps += other.boundary_gaps;
    }
}

/// Deterministic JSON-line logger for run stages. Timestamps are passed in
/// by the caller, so identical runs produce identical lines.
#[derive(Debug, Clone)]
pub struct RunLogger {
    current_level: LogLevel,
    lines: Vec<String>,
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLogger {
    pub fn new() -> Self {
        Self {
            current_level: LogLevel::Info,
            lines: Vec::new(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.current_level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.current_level = level;
    }

    /// Emits one JSON-line record; entries below the current level drop.
    pub fn log(
        &mut self,
        ts: DateTime<Utc>,
        level: LogLevel,
        stage: &str,
        frame: Option<&str>,
        message: &str,
    ) -> Result<(), LoggingError> {
        if level < self.current_level {
            return Ok(());
        }
        let record = LogRecord {
            ts,
            level: level.as_str(),
            stage,
            frame,
            message,
        };
        self.lines.push(serde_json::to_string(&record)?);
        Ok(())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    ts: DateTime<Utc>,
    level: &'a str,
    stage: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<&'a str>,
    message: &'a str,
}
