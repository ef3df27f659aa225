//! Incremental slowly-changing-dimension engine with hook-based identity
//! resolution.
//!
//! Append-only raw observations go in; versioned records with exact
//! validity intervals, canonical hook join keys, and bridge rows joining
//! versioned streams come out. Each incremental run covers one half-open
//! change window and touches only the keys that window arrived for, pulling
//! each touched key's full history to stitch interval boundaries correctly.

pub mod app;
pub mod bridge;
pub mod catalog;
pub mod fingerprint;
pub mod frame;
pub mod hook;
pub mod observability;
pub mod observation;
pub mod run;
pub mod version;
pub mod window;

pub use bridge::{BridgeResolver, BridgeRow};
pub use catalog::{
    BridgeDef, BridgeJoin, Catalog, CatalogAdmission, CatalogError, CompositeHookDef, FrameDef,
    HookDef,
};
pub use fingerprint::{fingerprint, fingerprint_row, NULL_SURROGATE};
pub use frame::{FrameAssembler, FrameOutput, FrameRecord, QuarantinedRecord};
pub use hook::{CompositeHook, Hook, HookError, Keyset, PitHook, PrimaryHook};
pub use observability::{LogLevel, LoggingError, RunLogger, RunTelemetry};
pub use observation::{ObservationLog, RawObservation};
pub use run::{resolve_bridges, BridgeRun, FrameRun, QuarantineNote, WindowRunReport, WindowRunner};
pub use version::{epoch, far_future, RebuildOutcome, VersionBuilder, VersionedRecord};
pub use window::{changed_keys, ChangeWindow, WindowError};
