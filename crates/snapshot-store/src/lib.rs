//! Snapshot cache: what worked last time, per test
//!
//! One JSON file per test fingerprint holds the resolved action and target
//! of every step. [`SnapshotStore`] decides whether a snapshot can be used,
//! merges newly executed steps, and keeps lifecycle timestamps;
//! [`ReplayExecutor`] re-runs cached steps against a live driver.

pub mod api;
pub mod errors;
pub mod fs;
pub mod guard;
pub mod index;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod replay;

pub use api::{
    FlagUpdate, FsSnapshotStore, SaveRequest, SnapshotInspection, SnapshotStatus, SnapshotStore,
    SnapshotStoreBuilder, StepInspection,
};
pub use errors::{SnapErrKind, SnapError, SnapResult};
pub use metrics::{SnapMetrics, SnapMetricsSnapshot};
pub use model::{
    ExecutedStep, RecordedAction, Snapshot, SnapshotFlags, SnapshotStep, StoredAction,
    SNAPSHOT_VERSION,
};
pub use policy::{IoCfg, MaintenanceCfg, SnapPolicyView};
pub use replay::{ReplayError, ReplayExecutor, ReplayOutcome, ReplayedStep, DEFAULT_ACTION_TIMEOUT};
