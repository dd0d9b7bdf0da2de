use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use stepreplay_core_types::{Fingerprint, Step};
use tracing::{debug, info, warn};

use crate::errors::{SnapErrKind, SnapError, SnapResult};
use crate::fs::{layout, reader as fs_reader, writer as fs_writer};
use crate::guard;
use crate::index::mem::HotIndex;
use crate::metrics::{SnapMetrics, SnapMetricsSnapshot};
use crate::model::{ExecutedStep, Snapshot};
use crate::policy::SnapPolicyView;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// True when a snapshot exists for `key`, has an entry for every one
    /// of `steps`, and has not been flagged for regeneration. Troubleshoot
    /// mode does not change the answer.
    async fn should_use_snapshot(
        &self,
        key: &Fingerprint,
        steps: &[Step],
        troubleshoot: bool,
    ) -> SnapResult<bool>;

    async fn get_snapshot(&self, key: &Fingerprint) -> SnapResult<Option<Snapshot>>;

    /// Merge executed steps into the stored snapshot and persist it.
    async fn save_snapshot(&self, req: SaveRequest) -> SnapResult<Snapshot>;

    /// Stamp `lastFailedAt`, keeping every cached step.
    async fn record_failure(&self, key: &Fingerprint, reason: &str) -> SnapResult<()>;

    async fn set_flags(&self, key: &Fingerprint, update: FlagUpdate) -> SnapResult<Snapshot>;

    async fn inspect(
        &self,
        key: &Fingerprint,
        steps: &[Step],
        _troubleshoot: bool,
    ) -> SnapResult<SnapshotInspection>;

    fn set_read_only(&self, read_only: bool);
    fn status(&self) -> SnapshotStatus;
}

/// Input of [`SnapshotStore::save_snapshot`].
#[derive(Clone, Debug)]
pub struct SaveRequest {
    pub key: Fingerprint,
    pub test_text: String,
    pub expected: Vec<Step>,
    pub executed: Vec<ExecutedStep>,
    pub troubleshoot: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FlagUpdate {
    pub force_regenerate: Option<bool>,
    pub troubleshooting_enabled: Option<bool>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SnapshotStatus {
    pub read_only: bool,
    pub cached_snapshots: usize,
    pub metrics: SnapMetricsSnapshot,
    pub latest_integrity: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInspection {
    pub index: usize,
    pub text: String,
    pub fingerprint: Fingerprint,
    pub cached: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInspection {
    pub key: Fingerprint,
    pub path: Option<PathBuf>,
    pub exists: bool,
    pub would_replay: bool,
    pub force_regenerate: bool,
    pub troubleshooting_enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_passed_at: Option<DateTime<Utc>>,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    pub steps: Vec<StepInspection>,
    /// Stored entries for steps the test no longer has.
    pub stale_entries: usize,
}

pub struct SnapshotStoreBuilder {
    policy: SnapPolicyView,
    metrics: Arc<SnapMetrics>,
}

impl SnapshotStoreBuilder {
    pub fn new(policy: SnapPolicyView) -> Self {
        Self {
            policy,
            metrics: Arc::new(SnapMetrics::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<SnapMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Arc<dyn SnapshotStore> {
        let store = Arc::new(FsSnapshotStore::new(self.policy, self.metrics));
        if let Err(err) = store.init_from_disk() {
            warn!(error = %err, "snapshot store bootstrap failed");
        }
        store
    }
}

#[derive(Clone, Debug, Default)]
struct IntegrityReport {
    scanned: usize,
    loaded: usize,
    corrupt: Vec<String>,
}

impl IntegrityReport {
    fn has_issues(&self) -> bool {
        !self.corrupt.is_empty()
    }

    fn summary(&self) -> String {
        let mut out = format!("scanned={} loaded={}", self.scanned, self.loaded);
        if self.has_issues() {
            out.push_str(&format!(" corrupt=[{}]", self.corrupt.join(", ")));
        }
        out
    }
}

/// One JSON file per test under the configured root.
pub struct FsSnapshotStore {
    policy: SnapPolicyView,
    metrics: Arc<SnapMetrics>,
    hot: HotIndex,
    integrity: Mutex<Option<IntegrityReport>>,
    read_only: AtomicBool,
}

impl FsSnapshotStore {
    pub fn new(policy: SnapPolicyView, metrics: Arc<SnapMetrics>) -> Self {
        let read_only = policy.read_only;
        Self {
            policy,
            metrics,
            hot: HotIndex::default(),
            integrity: Mutex::new(None),
            read_only: AtomicBool::new(read_only),
        }
    }

    fn ensure_writable(&self) -> SnapResult<()> {
        if !self.policy.enabled {
            return Err(SnapErrKind::Disabled.into());
        }
        if self.read_only.load(Ordering::Relaxed) {
            return Err(SnapErrKind::ReadOnly.into());
        }
        Ok(())
    }

    /// Load every readable snapshot under the root into the hot index.
    pub fn init_from_disk(&self) -> SnapResult<()> {
        if !self.policy.enabled || !self.policy.maintenance.integrity_on_boot {
            return Ok(());
        }
        let mut report = IntegrityReport::default();
        for path in fs_reader::list_snapshot_files(&self.policy.io.root)? {
            report.scanned += 1;
            let Some(key) = layout::key_of(&path) else {
                continue;
            };
            let parsed = std::fs::read(&path)
                .map_err(|err| err.to_string())
                .and_then(|data| Snapshot::from_json(&data).map_err(|err| err.to_string()));
            match parsed {
                Ok(snapshot) if snapshot.test_fingerprint == key => {
                    self.hot.insert_loaded(snapshot, path);
                    report.loaded += 1;
                }
                Ok(snapshot) => {
                    let reason = format!("file key {} holds {}", key, snapshot.test_fingerprint);
                    self.hot.mark_corrupt(key.clone(), reason);
                    report.corrupt.push(key.to_string());
                }
                Err(reason) => {
                    self.hot.mark_corrupt(key.clone(), reason);
                    report.corrupt.push(key.to_string());
                }
            }
        }
        self.publish_integrity_report(report);
        Ok(())
    }

    fn publish_integrity_report(&self, report: IntegrityReport) {
        if report.has_issues() {
            self.metrics.record_warn("integrity_report");
            warn!(summary = %report.summary(), "snapshot integrity issues detected");
        } else {
            debug!(summary = %report.summary(), "snapshot integrity check passed");
        }
        *self.integrity.lock() = Some(report);
    }

    fn handle_io_failure(&self, ctx: &str, err: &SnapError) {
        self.metrics.record_warn(&format!("io_failed:{}", ctx));
        if self.policy.maintenance.fallback_read_only
            && matches!(err.kind(), SnapErrKind::IoFailed(_))
        {
            let prev = self.read_only.swap(true, Ordering::Relaxed);
            if !prev {
                warn!(error = %err, "entering read-only mode after {}", ctx);
            }
        }
    }

    async fn load(&self, key: &Fingerprint) -> SnapResult<Option<Snapshot>> {
        if let Some(snapshot) = self.hot.get(key) {
            return Ok(Some(snapshot));
        }
        let path = layout::snapshot_path(&self.policy.io, key)?;
        match fs_reader::read_snapshot(&path).await {
            Ok(Some(snapshot)) => Ok(Some(self.hot.insert_loaded(snapshot, path))),
            Ok(None) => Ok(None),
            Err(err) => {
                let err = SnapError::from(err);
                if let SnapErrKind::Corrupt(reason) = err.kind() {
                    self.hot.mark_corrupt(key.clone(), reason.clone());
                }
                Err(err)
            }
        }
    }

    /// Existing snapshot for a write; unreadable content is replaced.
    async fn load_for_write(&self, key: &Fingerprint) -> SnapResult<Option<Snapshot>> {
        match self.load(key).await {
            Err(err) if matches!(err.kind(), SnapErrKind::Corrupt(_)) => {
                self.metrics.record_warn("overwrite_corrupt");
                warn!(key = %key, error = %err, "replacing unreadable snapshot");
                Ok(None)
            }
            other => other,
        }
    }

    async fn persist(&self, snapshot: Snapshot, ctx: &str) -> SnapResult<Snapshot> {
        match fs_writer::write_snapshot(&self.policy.io, &snapshot).await {
            Ok(path) => {
                debug!(key = %snapshot.test_fingerprint, path = %path.display(), "snapshot written");
                self.hot.upsert(snapshot.clone(), path);
                Ok(snapshot)
            }
            Err(err) => {
                self.handle_io_failure(ctx, &err);
                Err(err)
            }
        }
    }
}

/// Why a loaded snapshot cannot stand in for `steps`, if it cannot
fn replay_blocker(snapshot: &Snapshot, steps: &[Step]) -> Option<String> {
    if snapshot.flags.force_regenerate {
        return Some("flagged for regeneration".to_string());
    }
    let missing = snapshot.missing(steps);
    if !missing.is_empty() {
        return Some(format!(
            "{} of {} steps not cached",
            missing.len(),
            steps.len()
        ));
    }
    None
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn should_use_snapshot(
        &self,
        key: &Fingerprint,
        steps: &[Step],
        troubleshoot: bool,
    ) -> SnapResult<bool> {
        if !self.policy.enabled || steps.is_empty() {
            return Ok(false);
        }
        let snapshot = match self.load(key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.metrics.record_miss();
                debug!(key = %key, "no snapshot");
                return Ok(false);
            }
            Err(err) if matches!(err.kind(), SnapErrKind::Corrupt(_)) => {
                self.metrics.record_miss();
                warn!(key = %key, error = %err, "snapshot unreadable, regenerating");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        if let Some(reason) = replay_blocker(&snapshot, steps) {
            self.metrics.record_miss();
            info!(key = %key, "snapshot not replayable: {}", reason);
            return Ok(false);
        }
        if troubleshoot {
            debug!(key = %key, "troubleshoot mode, trying cached path first");
        }
        self.metrics.record_hit();
        Ok(true)
    }

    async fn get_snapshot(&self, key: &Fingerprint) -> SnapResult<Option<Snapshot>> {
        if !self.policy.enabled {
            return Ok(None);
        }
        self.load(key).await
    }

    async fn save_snapshot(&self, req: SaveRequest) -> SnapResult<Snapshot> {
        if let Err(err) = self
            .ensure_writable()
            .and_then(|_| guard::check_complete(&req.expected, &req.executed))
        {
            self.metrics.record_refused_save();
            info!(key = %req.key, reason = %err, "snapshot save refused");
            return Err(err);
        }

        let now = Utc::now();
        let mut snapshot = self
            .load_for_write(&req.key)
            .await?
            .unwrap_or_else(|| Snapshot::new(req.key.clone(), req.test_text.clone()));
        let first_pass = snapshot.flags.last_passed_at.is_none();
        let recovering = snapshot.flags.last_failed_at.is_some();

        for executed in &req.executed {
            if let Some(step) = executed.to_snapshot_step() {
                snapshot
                    .steps_by_fingerprint
                    .insert(step.step_fingerprint.clone(), step);
            }
        }
        snapshot.test_text = req.test_text;

        let flags = &mut snapshot.flags;
        flags.created_at.get_or_insert(now);
        if first_pass || recovering {
            flags.last_passed_at = Some(now);
        }
        flags.last_failed_at = None;
        flags.last_failure_reason = None;
        flags.force_regenerate = false;
        flags.troubleshooting_enabled = req.troubleshoot;

        let saved = self.persist(snapshot, "save").await?;
        self.metrics.record_save();
        info!(
            key = %saved.test_fingerprint,
            steps = saved.step_count(),
            recovered = recovering,
            "snapshot saved"
        );
        Ok(saved)
    }

    async fn record_failure(&self, key: &Fingerprint, reason: &str) -> SnapResult<()> {
        self.ensure_writable()?;
        let Some(mut snapshot) = self.load_for_write(key).await? else {
            debug!(key = %key, "no snapshot to mark as failed");
            return Ok(());
        };
        snapshot.flags.last_failed_at = Some(Utc::now());
        snapshot.flags.last_failure_reason = Some(reason.to_string());
        self.persist(snapshot, "record_failure").await?;
        self.metrics.record_failure();
        info!(key = %key, reason, "snapshot failure recorded");
        Ok(())
    }

    async fn set_flags(&self, key: &Fingerprint, update: FlagUpdate) -> SnapResult<Snapshot> {
        self.ensure_writable()?;
        let mut snapshot = self
            .load_for_write(key)
            .await?
            .ok_or(SnapError(SnapErrKind::NotFound))?;
        if let Some(force) = update.force_regenerate {
            snapshot.flags.force_regenerate = force;
        }
        if let Some(troubleshoot) = update.troubleshooting_enabled {
            snapshot.flags.troubleshooting_enabled = troubleshoot;
        }
        self.persist(snapshot, "set_flags").await
    }

    async fn inspect(
        &self,
        key: &Fingerprint,
        steps: &[Step],
        troubleshoot: bool,
    ) -> SnapResult<SnapshotInspection> {
        let snapshot = match self.get_snapshot(key).await {
            Ok(snapshot) => snapshot,
            Err(err) if matches!(err.kind(), SnapErrKind::Corrupt(_)) => None,
            Err(err) => return Err(err),
        };
        let would_replay = self.policy.enabled
            && !steps.is_empty()
            && snapshot
                .as_ref()
                .map_or(false, |s| replay_blocker(s, steps).is_none());
        let path = layout::snapshot_path(&self.policy.io, key).ok();

        let step_rows = steps
            .iter()
            .map(|step| StepInspection {
                index: step.index,
                text: step.text.clone(),
                fingerprint: step.fingerprint.clone(),
                cached: snapshot
                    .as_ref()
                    .map_or(false, |s| s.step(&step.fingerprint).is_some()),
            })
            .collect::<Vec<_>>();
        let stale_entries = snapshot.as_ref().map_or(0, |s| {
            s.steps_by_fingerprint
                .keys()
                .filter(|fp| !steps.iter().any(|step| &step.fingerprint == *fp))
                .count()
        });
        let flags = snapshot.as_ref().map(|s| s.flags.clone()).unwrap_or_default();

        Ok(SnapshotInspection {
            key: key.clone(),
            path,
            exists: snapshot.is_some(),
            would_replay,
            force_regenerate: flags.force_regenerate,
            troubleshooting_enabled: flags.troubleshooting_enabled,
            created_at: flags.created_at,
            last_passed_at: flags.last_passed_at,
            last_failed_at: flags.last_failed_at,
            last_failure_reason: flags.last_failure_reason,
            steps: step_rows,
            stale_entries,
        })
    }

    fn set_read_only(&self, read_only: bool) {
        let prev = self.read_only.swap(read_only, Ordering::Relaxed);
        if read_only && !prev {
            self.metrics.record_warn("read_only_enabled");
        } else if !read_only && prev {
            info!("snapshot store writable again");
        }
    }

    fn status(&self) -> SnapshotStatus {
        let summary = self
            .integrity
            .lock()
            .as_ref()
            .map(|report| report.summary());
        SnapshotStatus {
            read_only: self.read_only.load(Ordering::Relaxed),
            cached_snapshots: self.hot.len(),
            metrics: self.metrics.snapshot(),
            latest_integrity: summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordedAction;
    use action_locator::TargetReference;
    use action_primitives::{ActionRecord, SelectorDescriptor};
    use stepreplay_core_types::parse_steps;

    fn store(root: &std::path::Path) -> Arc<dyn SnapshotStore> {
        SnapshotStoreBuilder::new(SnapPolicyView::with_root(root)).build()
    }

    fn run(steps: &[Step]) -> Vec<ExecutedStep> {
        steps
            .iter()
            .map(|step| {
                ExecutedStep::new(
                    step.clone(),
                    vec![RecordedAction::new(
                        ActionRecord::click(),
                        Some(TargetReference::new(
                            Some(SelectorDescriptor::test_id(format!("s{}", step.index))),
                            None,
                        )),
                    )],
                )
            })
            .collect()
    }

    fn request(key: &Fingerprint, text: &str, executed: Vec<ExecutedStep>) -> SaveRequest {
        SaveRequest {
            key: key.clone(),
            test_text: text.to_string(),
            expected: parse_steps(text),
            executed,
            troubleshoot: false,
        }
    }

    #[tokio::test]
    async fn test_first_save_sets_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "navigate to /login\nclick Submit";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        assert!(!store.should_use_snapshot(&key, &steps, false).await.unwrap());

        let saved = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        assert_eq!(saved.step_count(), 2);
        assert_eq!(saved.flags.created_at, saved.flags.last_passed_at);
        assert!(saved.flags.last_failed_at.is_none());
        assert!(store.should_use_snapshot(&key, &steps, false).await.unwrap());
        assert!(dir.path().join(format!("{}.json", key)).is_file());
    }

    #[tokio::test]
    async fn test_resave_keeps_last_passed_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open\nclick Go";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        let first = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        let second = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        assert_eq!(first.flags.last_passed_at, second.flags.last_passed_at);
        assert_eq!(first.flags.created_at, second.flags.created_at);
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open\nclick Go";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        let first = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();

        store.record_failure(&key, "step 2 stale").await.unwrap();
        let failed = store.get_snapshot(&key).await.unwrap().unwrap();
        assert!(failed.flags.last_failed_at.is_some());
        assert_eq!(failed.step_count(), 2);
        assert!(store.should_use_snapshot(&key, &steps, false).await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let recovered = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        assert!(recovered.flags.last_failed_at.is_none());
        assert!(recovered.flags.last_failure_reason.is_none());
        assert!(recovered.flags.last_passed_at > first.flags.last_passed_at);
        assert_eq!(store.status().metrics.failures_recorded, 1);
    }

    #[tokio::test]
    async fn test_partial_run_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open\nclick Go\nassert title";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();

        let err = store
            .save_snapshot(request(&key, text, run(&steps[..1])))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), SnapErrKind::Incomplete { executed: 1, expected: 3 }));
        assert_eq!(store.get_snapshot(&key).await.unwrap().unwrap().step_count(), 3);
        assert_eq!(store.status().metrics.refused_saves, 1);
    }

    #[tokio::test]
    async fn test_merge_keeps_untouched_steps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = Fingerprint::of_test_id("login#happy");
        let before = "open\nclick Go\nassert title";
        store
            .save_snapshot(request(&key, before, run(&parse_steps(before))))
            .await
            .unwrap();

        let after = "open\nclick Continue\nassert title";
        let steps = parse_steps(after);
        assert!(!store.should_use_snapshot(&key, &steps, false).await.unwrap());
        let inspection = store.inspect(&key, &steps, false).await.unwrap();
        let cached: Vec<bool> = inspection.steps.iter().map(|s| s.cached).collect();
        assert_eq!(cached, vec![true, false, true]);

        let saved = store.save_snapshot(request(&key, after, run(&steps))).await.unwrap();
        assert_eq!(saved.step_count(), 4);
        assert_eq!(saved.test_text, after);
        assert!(store.should_use_snapshot(&key, &steps, false).await.unwrap());
        assert_eq!(store.inspect(&key, &steps, false).await.unwrap().stale_entries, 1);
    }

    #[tokio::test]
    async fn test_inspect_leaves_counters_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open\nclick Save";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);

        let absent = store.inspect(&key, &steps, false).await.unwrap();
        assert!(!absent.would_replay);
        store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        let present = store.inspect(&key, &steps, true).await.unwrap();
        assert!(present.would_replay);

        let metrics = store.status().metrics;
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.misses, 0);

        assert!(store.should_use_snapshot(&key, &steps, false).await.unwrap());
        assert_eq!(store.status().metrics.hits, 1);
    }

    #[tokio::test]
    async fn test_force_regenerate_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        assert!(matches!(
            store.set_flags(&key, FlagUpdate::default()).await.unwrap_err().kind(),
            SnapErrKind::NotFound
        ));
        store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        store
            .set_flags(
                &key,
                FlagUpdate {
                    force_regenerate: Some(true),
                    ..FlagUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(!store.should_use_snapshot(&key, &steps, true).await.unwrap());
        let saved = store.save_snapshot(request(&key, text, run(&steps))).await.unwrap();
        assert!(!saved.flags.force_regenerate);
    }

    #[tokio::test]
    async fn test_snapshots_survive_restart_and_corruption_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let text = "open\nclick Go";
        let key = Fingerprint::of_test_text(text);
        let steps = parse_steps(text);
        store(dir.path())
            .save_snapshot(request(&key, text, run(&steps)))
            .await
            .unwrap();
        let broken = Fingerprint::of_test_text("other");
        std::fs::write(dir.path().join(format!("{}.json", broken)), b"{not json").unwrap();

        let reopened = store(dir.path());
        let status = reopened.status();
        assert_eq!(status.cached_snapshots, 1);
        assert!(status.latest_integrity.unwrap().contains(broken.as_str()));
        assert!(reopened.should_use_snapshot(&key, &steps, false).await.unwrap());
        assert!(!reopened
            .should_use_snapshot(&broken, &parse_steps("other"), false)
            .await
            .unwrap());
        let other = parse_steps("other");
        reopened
            .save_snapshot(request(&broken, "other", run(&other)))
            .await
            .unwrap();
        assert!(reopened.get_snapshot(&broken).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_only_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let text = "open";
        let key = Fingerprint::of_test_text(text);
        store.set_read_only(true);
        let err = store
            .save_snapshot(request(&key, text, run(&parse_steps(text))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &SnapErrKind::ReadOnly);
        assert!(store.status().read_only);
        store.set_read_only(false);
        assert!(store
            .save_snapshot(request(&key, text, run(&parse_steps(text))))
            .await
            .is_ok());
    }

    #[test]
    fn test_disabled_store_never_replays() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = SnapPolicyView::with_root(dir.path());
        policy.enabled = false;
        let store = SnapshotStoreBuilder::new(policy).build();
        let steps = parse_steps("open");
        let key = Fingerprint::of_test_text("open");
        tokio_test::block_on(async {
            assert!(!store.should_use_snapshot(&key, &steps, false).await.unwrap());
            assert!(store.get_snapshot(&key).await.unwrap().is_none());
            let err = store
                .save_snapshot(request(&key, "open", run(&steps)))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), &SnapErrKind::Disabled);
        });
    }
}
