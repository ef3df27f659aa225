use crate::observation::ObservationLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors surfaced when constructing a change window.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("change window is empty: start {start} is not before end {end}")]
    Empty {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The half-open `[start, end)` time range covered by one incremental run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ChangeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// True iff `instant` lies inside `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Returns the distinct keys with at least one observation inside the
/// window. Pure read over the log's time index: cost is bounded by the
/// window's arrival volume, not history size.
pub fn changed_keys(log: &ObservationLog, window: &ChangeWindow) -> BTreeSet<String> {
    log.observed_between(window.start(), window.end())
        .map(|observation| observation.unique_key.clone())
        .collect()
}
