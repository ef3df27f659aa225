use crate::frame::FrameRecord;
use crate::hook::Hook;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A denormalized fact joining versioned streams through shared hooks.
///
/// The row is valid only for the instants during which every joined side
/// was simultaneously valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeRow {
    /// Frames contributing to the row, in join order.
    pub frames: Vec<String>,
    /// Frame name to that side's PIT hook.
    pub pit_hooks: BTreeMap<String, String>,
    /// Union of the sides' hooks, name to canonical string.
    pub hooks: BTreeMap<String, String>,
    /// Union of the sides' payload columns, suffixed `column__frame`.
    pub payload: Map<String, Value>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_current: bool,
}

/// Joins versioned entity streams by hook equality, intersecting validity.
///
/// Chaining across more than two sides is repeated pairwise intersection;
/// max/min/and over intervals are associative, so the resulting set does not
/// depend on which side is evaluated first. A record carrying a hook string
/// that fails the grammar aborts only its own join pairs: the record is
/// excluded and the offending string kept for reporting.
#[derive(Debug, Default)]
pub struct BridgeResolver {
    rows: Vec<BridgeRow>,
    malformed: Vec<String>,
}

impl BridgeResolver {
    /// Starts a bridge from one frame's records.
    pub fn seed(records: &[FrameRecord]) -> Self {
        let mut resolver = Self::default();
        for record in records {
            if !resolver.admit(record) {
                continue;
            }
            resolver.rows.push(seed_row(record));
        }
        resolver
    }

    /// Intersects the bridge with another frame's records on a shared hook.
    pub fn intersect(mut self, on: &str, records: &[FrameRecord]) -> Self {
        let mut admitted = Vec::with_capacity(records.len());
        for record in records {
            if self.admit(record) {
                admitted.push(record);
            }
        }
        let mut joined = Vec::new();
        for row in &self.rows {
            let Some(left_hook) = row.hooks.get(on) else {
                continue;
            };
            for record in &admitted {
                if record.hooks.get(on) != Some(left_hook) {
                    continue;
                }
                if let Some(merged) = merge(row, record) {
                    joined.push(merged);
                }
            }
        }
        self.rows = joined;
        self
    }

    pub fn rows(&self) -> &[BridgeRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<BridgeRow> {
        self.rows
    }

    /// Joined rows plus the offending hook strings, for run reporting.
    pub fn into_parts(self) -> (Vec<BridgeRow>, Vec<String>) {
        (self.rows, self.malformed)
    }

    /// Hook strings that failed the parse grammar, one per excluded record.
    pub fn malformed(&self) -> &[String] {
        &self.malformed
    }

    /// Validates every hook string on the record; false excludes it.
    fn admit(&mut self, record: &FrameRecord) -> bool {
        for text in record.hooks.values() {
            if Hook::parse(text).is_err() {
                self.malformed.push(text.clone());
                return false;
            }
        }
        true
    }
}

fn seed_row(record: &FrameRecord) -> BridgeRow {
    BridgeRow {
        frames: vec![record.frame.clone()],
        pit_hooks: BTreeMap::from([(record.frame.clone(), record.pit_hook.clone())]),
        hooks: record.hooks.clone(),
        payload: suffixed(&record.record.payload, &record.frame),
        valid_from: record.record.valid_from,
        valid_to: record.record.valid_to,
        updated_at: record.record.updated_at,
        is_current: record.record.is_current,
    }
}

fn merge(row: &BridgeRow, record: &FrameRecord) -> Option<BridgeRow> {
    let valid_from = row.valid_from.max(record.record.valid_from);
    let valid_to = row.valid_to.min(record.record.valid_to);
    if valid_from >= valid_to {
        // No instant at which both sides were valid.
        return None;
    }
    let mut merged = row.clone();
    merged.frames.push(record.frame.clone());
    merged
        .pit_hooks
        .insert(record.frame.clone(), record.pit_hook.clone());
    for (name, text) in &record.hooks {
        merged.hooks.insert(name.clone(), text.clone());
    }
    for (column, value) in suffixed(&record.record.payload, &record.frame) {
        merged.payload.insert(column, value);
    }
    merged.valid_from = valid_from;
    merged.valid_to = valid_to;
    merged.updated_at = row.updated_at.max(record.record.updated_at);
    merged.is_current = row.is_current && record.record.is_current;
    Some(merged)
}

fn suffixed(payload: &Map<String, Value>, frame: &str) -> Map<String, Value> {
    payload
        .iter()
        .map(|(column, value)| (format!("{column}__{frame}"), value.clone()))
        .collect()
}
