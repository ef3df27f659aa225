use crate::observation::ObservationLog;
use crate::window::ChangeWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Minimal sentinel opening the first version of every key.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Far-future sentinel closing the open-ended current version. Chosen to
/// stay within the fixed-width sortable timestamp format used by PIT hooks.
pub fn far_future() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 999_999_000).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// One derived historical slice of a key: the originating payload plus the
/// validity interval, currency flag, and recency rank.
///
/// A record emitted with a closed `valid_to` is never mutated afterwards; a
/// later run only adds records that change which row is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub unique_key: String,
    pub content_hash: String,
    pub payload: Map<String, Value>,
    /// Opening boundary: the previous observation's `loaded_at`, or the
    /// epoch sentinel for the first version.
    #[serde(rename = "_valid_from")]
    pub valid_from: DateTime<Utc>,
    /// Exclusive closing boundary: the next observation's `loaded_at`, or
    /// the far-future sentinel for the current version.
    #[serde(rename = "_valid_to")]
    pub valid_to: DateTime<Utc>,
    /// Closing boundary instant for superseded versions; the observation's
    /// own `loaded_at` for the open one, so a newly opened row falls inside
    /// the window that opened it.
    #[serde(rename = "_updated_at")]
    pub updated_at: DateTime<Utc>,
    /// Descending recency rank: 1 for the current row, N for the oldest.
    #[serde(rename = "_version")]
    pub version: u32,
    /// True for exactly one version per key, the latest.
    #[serde(rename = "_is_current")]
    pub is_current: bool,
}

/// Result of an incremental per-key rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildOutcome {
    /// Versions opened or closed inside the window, ordered oldest first.
    pub records: Vec<VersionedRecord>,
    /// True when a window-internal observation had no preceding boundary
    /// observation within the retained history. The interval opened with the
    /// epoch sentinel and self-corrects once a later window covers the
    /// missing instant. Conservative under a retention floor: a key whose
    /// genuine first observation falls inside the window cannot be told
    /// apart from one whose earlier history was evicted, so it is flagged
    /// too.
    pub boundary_gap: bool,
}

/// Reconstructs ordered versions for single keys out of the raw log.
///
/// Invoked only for keys the change detector returned, but always over the
/// key's full retained history: stitching the boundaries of a window-internal
/// observation needs the nearest observation on each side of the window.
pub struct VersionBuilder<'a> {
    log: &'a ObservationLog,
}

impl<'a> VersionBuilder<'a> {
    pub fn new(log: &'a ObservationLog) -> Self {
        Self { log }
    }

    /// Derives every version of `key`, oldest first, with no window filter.
    ///
    /// Two consecutive observations with identical content hashes still
    /// produce distinct versions; the engine never compacts unchanged states,
    /// so `version` stays a pure observation rank.
    pub fn full_history(&self, key: &str) -> Vec<VersionedRecord> {
        let history = self.log.history(key);
        let total = history.len();
        history
            .iter()
            .enumerate()
            .map(|(idx, observation)| {
                let valid_from = match idx {
                    0 => epoch(),
                    _ => history[idx - 1].loaded_at,
                };
                let is_current = idx + 1 == total;
                let valid_to = if is_current {
                    far_future()
                } else {
                    history[idx + 1].loaded_at
                };
                let updated_at = if is_current {
                    observation.loaded_at
                } else {
                    valid_to
                };
                VersionedRecord {
                    unique_key: observation.unique_key.clone(),
                    content_hash: observation.content_hash.clone(),
                    payload: observation.payload.clone(),
                    valid_from,
                    valid_to,
                    updated_at,
                    version: (total - idx) as u32,
                    is_current,
                }
            })
            .collect()
    }

    /// Rebuilds `key` for one incremental window.
    ///
    /// Only boundary-adjacent and window-internal versions are candidates
    /// (the boundary hash set), and of those only versions whose
    /// `updated_at` falls inside `[start, end)` are emitted: a version stays
    /// un-emitted until an event opens or closes it. Re-running the same
    /// window over the same history yields byte-identical output.
    pub fn rebuild(&self, key: &str, window: &ChangeWindow) -> RebuildOutcome {
        let history = self.log.history(key);
        if history.is_empty() {
            return RebuildOutcome::default();
        }

        let mut boundary_hashes: BTreeSet<&str> = BTreeSet::new();
        let mut preceding = None;
        let mut following = None;
        let mut inside = false;
        for observation in &history {
            if observation.loaded_at < window.start() {
                preceding = Some(observation);
            } else if observation.loaded_at >= window.end() {
                following.get_or_insert(observation);
            } else {
                boundary_hashes.insert(observation.content_hash.as_str());
                inside = true;
            }
        }
        if let Some(observation) = preceding {
            boundary_hashes.insert(observation.content_hash.as_str());
        }
        if let Some(observation) = following {
            boundary_hashes.insert(observation.content_hash.as_str());
        }

        let boundary_gap = inside
            && preceding.is_none()
            && self
                .log
                .retention_floor()
                .is_some_and(|floor| floor > epoch());

        let records = self
            .full_history(key)
            .into_iter()
            .filter(|record| {
                boundary_hashes.contains(record.content_hash.as_str())
                    && window.contains(record.updated_at)
            })
            .collect();
        RebuildOutcome {
            records,
            boundary_gap,
        }
    }
}
