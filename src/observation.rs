use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One ingested snapshot of an entity's attributes at a point in time.
///
/// Observations are immutable and append-only: the extraction collaborator
/// creates them once, ordered by `loaded_at`, and nothing in the engine ever
/// updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Caller-supplied key, possibly several source columns joined by `|`.
    pub unique_key: String,
    /// Ingestion timestamp.
    pub loaded_at: DateTime<Utc>,
    /// Content fingerprint of the non-metadata attributes.
    pub content_hash: String,
    /// Source columns, untouched.
    pub payload: Map<String, Value>,
}

impl RawObservation {
    pub fn new(
        unique_key: impl Into<String>,
        loaded_at: DateTime<Utc>,
        content_hash: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            unique_key: unique_key.into(),
            loaded_at,
            content_hash: content_hash.into(),
            payload,
        }
    }
}

/// Append-only store of raw observations with a per-key index.
///
/// The engine only ever reads from the log; history lookups return each key's
/// observations ascending by `loaded_at`. Observations sharing a `loaded_at`
/// keep their ingestion order; there is no further tie-break.
#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    rows: Vec<RawObservation>,
    by_key: BTreeMap<String, Vec<usize>>,
    by_time: BTreeMap<DateTime<Utc>, Vec<usize>>,
    retention_floor: Option<DateTime<Utc>>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log whose history is known to be truncated at `floor`.
    /// Earlier observations were evicted; the version builder uses this to
    /// recognize window-boundary gaps.
    pub fn with_retention_floor(floor: DateTime<Utc>) -> Self {
        Self {
            retention_floor: Some(floor),
            ..Self::default()
        }
    }

    pub fn retention_floor(&self) -> Option<DateTime<Utc>> {
        self.retention_floor
    }

    /// Appends one observation, keeping the per-key index sorted by
    /// `loaded_at` with ties left in ingestion order.
    pub fn append(&mut self, observation: RawObservation) {
        let row_idx = self.rows.len();
        let loaded_at = observation.loaded_at;
        let index = self.by_key.entry(observation.unique_key.clone()).or_default();
        let position = index.partition_point(|&existing| self.rows[existing].loaded_at <= loaded_at);
        index.insert(position, row_idx);
        self.by_time.entry(loaded_at).or_default().push(row_idx);
        self.rows.push(observation);
    }

    /// Observations with `loaded_at` inside `[start, end)`, via the time
    /// index: cost is bounded by the number of matches, not history size.
    /// Co-timestamped observations come back in ingestion order.
    pub fn observed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &RawObservation> {
        self.by_time
            .range(start..end)
            .flat_map(|(_, indices)| indices.iter().map(|&idx| &self.rows[idx]))
    }

    /// Full lifetime history of one key, ascending by `loaded_at`.
    pub fn history(&self, key: &str) -> Vec<&RawObservation> {
        self.by_key
            .get(key)
            .map(|index| index.iter().map(|&idx| &self.rows[idx]).collect())
            .unwrap_or_default()
    }

    /// Every observation in insertion order.
    pub fn rows(&self) -> &[RawObservation] {
        &self.rows
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
