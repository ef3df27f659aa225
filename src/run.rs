use crate::bridge::{BridgeResolver, BridgeRow};
use crate::catalog::Catalog;
use crate::frame::{FrameAssembler, FrameRecord};
use crate::observability::RunTelemetry;
use crate::observation::ObservationLog;
use crate::version::VersionBuilder;
use crate::window::{changed_keys, ChangeWindow};
use serde::Serialize;
use std::collections::BTreeMap;

/// A quarantined record as it appears in the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantineNote {
    pub unique_key: String,
    pub version: u32,
    pub reason: String,
}

/// One frame's share of a window run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRun {
    pub frame: String,
    pub records: Vec<FrameRecord>,
    pub quarantined: Vec<QuarantineNote>,
}

/// One declared bridge resolved over a run's frame records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeRun {
    pub bridge: String,
    pub rows: Vec<BridgeRow>,
    /// Hook strings that failed the parse grammar, one per excluded record.
    pub malformed: Vec<String>,
}

/// Everything one incremental run produced. Re-running the same window over
/// the same logs yields an identical report, so downstream writes can be
/// upsert-by-(`unique_key`, `version`) under at-least-once execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRunReport {
    pub window: ChangeWindow,
    pub frames: Vec<FrameRun>,
    pub bridges: Vec<BridgeRun>,
    pub telemetry: RunTelemetry,
}

/// Resolves every bridge the catalog declares over one run's frame output.
/// Frames that emitted nothing contribute an empty side.
pub fn resolve_bridges(catalog: &Catalog, frames: &[FrameRun]) -> Vec<BridgeRun> {
    let by_name: BTreeMap<&str, &[FrameRecord]> = frames
        .iter()
        .map(|run| (run.frame.as_str(), run.records.as_slice()))
        .collect();
    let side = |name: &str| by_name.get(name).copied().unwrap_or(&[]);
    catalog
        .bridges()
        .iter()
        .map(|def| {
            let mut resolver = BridgeResolver::seed(side(&def.seed));
            for join in &def.joins {
                resolver = resolver.intersect(&join.on, side(&join.frame));
            }
            let (rows, malformed) = resolver.into_parts();
            BridgeRun {
                bridge: def.name.clone(),
                rows,
                malformed,
            }
        })
        .collect()
}

/// Drives one window across every frame in the catalog: detect changed
/// keys, rebuild their versions from full history, assemble hook-bearing
/// records, then resolve declared bridges over the emitted records. Keys
/// are independent; iteration order is fixed by the sorted key set so
/// output is deterministic.
pub struct WindowRunner<'a> {
    catalog: &'a Catalog,
}

impl<'a> WindowRunner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Runs the window over per-frame observation logs. Frames without a
    /// log yield an empty run; nothing aborts.
    pub fn run(
        &self,
        logs: &BTreeMap<String, ObservationLog>,
        window: &ChangeWindow,
    ) -> WindowRunReport {
        let mut telemetry = RunTelemetry::default();
        let mut frames = Vec::with_capacity(self.catalog.frames().len());
        for def in self.catalog.frames() {
            let Some(log) = logs.get(&def.name) else {
                frames.push(FrameRun {
                    frame: def.name.clone(),
                    records: Vec::new(),
                    quarantined: Vec::new(),
                });
                continue;
            };
            let keys = changed_keys(log, window);
            let builder = VersionBuilder::new(log);
            let mut frame_telemetry = RunTelemetry {
                keys_changed: keys.len() as u64,
                ..RunTelemetry::default()
            };
            let mut versioned = Vec::new();
            for key in &keys {
                let outcome = builder.rebuild(key, window);
                if outcome.boundary_gap {
                    frame_telemetry.boundary_gaps += 1;
                }
                versioned.extend(outcome.records);
            }
            let output = FrameAssembler::new(def).assemble(versioned);
            frame_telemetry.records_emitted = output.records.len() as u64;
            frame_telemetry.records_quarantined = output.quarantined.len() as u64;
            telemetry.absorb(frame_telemetry);
            frames.push(FrameRun {
                frame: def.name.clone(),
                records: output.records,
                quarantined: output
                    .quarantined
                    .into_iter()
                    .map(|record| QuarantineNote {
                        unique_key: record.unique_key,
                        version: record.version,
                        reason: record.error.to_string(),
                    })
                    .collect(),
            });
        }
        let bridges = resolve_bridges(self.catalog, &frames);
        for bridge in &bridges {
            telemetry.malformed_hooks += bridge.malformed.len() as u64;
        }
        WindowRunReport {
            window: *window,
            frames,
            bridges,
            telemetry,
        }
    }
}
