use crate::catalog::Catalog;
use crate::observability::{LogLevel, RunLogger};
use crate::observation::{ObservationLog, RawObservation};
use crate::run::WindowRunner;
use crate::window::ChangeWindow;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fs;

/// One raw row as supplied by the extraction collaborator: the ingestion
/// timestamp plus untouched source columns.
#[derive(Debug, Deserialize)]
struct ObservationRow {
    loaded_at: DateTime<Utc>,
    payload: Map<String, Value>,
}

/// Application entrypoint: load the catalog and observation batches, run
/// one window, print the JSON report to stdout. Log lines go to stderr.
pub fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [catalog_path, observations_path, start_text, end_text] = args.as_slice() else {
        bail!("usage: strata <catalog.json> <observations.json> <start_ts> <end_ts>");
    };
    let window = ChangeWindow::new(parse_instant(start_text)?, parse_instant(end_text)?)?;

    let catalog_text = fs::read_to_string(catalog_path)
        .with_context(|| format!("unable to read catalog {catalog_path}"))?;
    let admission = Catalog::from_json(&catalog_text)
        .with_context(|| format!("catalog {catalog_path} rejected"))?;

    let mut logger = RunLogger::new();
    for warning in &admission.warnings {
        logger.log(Utc::now(), LogLevel::Warn, "catalog", None, warning)?;
    }

    let observations_text = fs::read_to_string(observations_path)
        .with_context(|| format!("unable to read observations {observations_path}"))?;
    let batches: BTreeMap<String, Vec<ObservationRow>> = serde_json::from_str(&observations_text)
        .with_context(|| format!("unparseable observations {observations_path}"))?;

    let mut logs: BTreeMap<String, ObservationLog> = BTreeMap::new();
    for (frame_name, rows) in batches {
        let Some(def) = admission.catalog.frame(&frame_name) else {
            bail!("observations reference unknown frame '{frame_name}'");
        };
        let mut log = ObservationLog::new();
        let mut unkeyed = 0u64;
        for row in rows {
            match def.unique_key(&row.payload) {
                Some(key) => {
                    let hash = def.content_fingerprint(&row.payload);
                    log.append(RawObservation::new(key, row.loaded_at, hash, row.payload));
                }
                None => unkeyed += 1,
            }
        }
        if unkeyed > 0 {
            logger.log(
                Utc::now(),
                LogLevel::Warn,
                "ingest",
                Some(&frame_name),
                &format!("{unkeyed} rows dropped: missing key component"),
            )?;
        }
        logs.insert(frame_name, log);
    }

    let report = WindowRunner::new(&admission.catalog).run(&logs, &window);
    logger.log(
        Utc::now(),
        LogLevel::Info,
        "run",
        None,
        &format!(
            "keys_changed={} records_emitted={} quarantined={} malformed_hooks={} boundary_gaps={}",
            report.telemetry.keys_changed,
            report.telemetry.records_emitted,
            report.telemetry.records_quarantined,
            report.telemetry.malformed_hooks,
            report.telemetry.boundary_gaps
        ),
    )?;
    for line in logger.lines() {
        eprintln!("{line}");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("unparseable timestamp '{text}' (expected RFC 3339)"))?;
    Ok(parsed.with_timezone(&Utc))
}
