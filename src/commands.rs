//! CLI command implementations

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use stepreplay_core_types::{Fingerprint, TestCase};
use stepreplay_snapshot_store::{
    FlagUpdate, SnapErrKind, SnapshotInspection, SnapshotStore, SnapshotStoreBuilder,
};
use tracing::info;

use crate::config::Config;

/// Read a test file; the optional id pins the snapshot key across edits
pub async fn load_test(path: &Path, id: Option<&str>) -> Result<TestCase> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    let mut test = TestCase::new(text);
    if let Some(id) = id {
        test = test.with_id(id);
    }
    if test.steps().is_empty() {
        bail!("{} contains no steps", path.display());
    }
    Ok(test)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintReport {
    pub key: Fingerprint,
    pub steps: Vec<StepFingerprint>,
}

#[derive(Debug, Serialize)]
pub struct StepFingerprint {
    pub index: usize,
    pub fingerprint: Fingerprint,
    pub text: String,
}

pub fn fingerprint_report(test: &TestCase) -> FingerprintReport {
    FingerprintReport {
        key: test.snapshot_key(),
        steps: test
            .steps()
            .into_iter()
            .map(|step| StepFingerprint {
                index: step.index,
                fingerprint: step.fingerprint,
                text: step.text,
            })
            .collect(),
    }
}

pub async fn cmd_fingerprint(path: &Path, id: Option<&str>) -> Result<()> {
    let test = load_test(path, id).await?;
    let report = fingerprint_report(&test);
    println!("key: {}", report.key);
    for step in &report.steps {
        println!("{:>3}  {}  {}", step.index, step.fingerprint, step.text);
    }
    Ok(())
}

pub async fn inspect(config: &Config, test: &TestCase) -> Result<SnapshotInspection> {
    let store = SnapshotStoreBuilder::new(config.snapshot_policy()).build();
    let inspection = store
        .inspect(&test.snapshot_key(), &test.steps(), config.troubleshoot)
        .await
        .context("Failed to inspect snapshot")?;
    Ok(inspection)
}

pub async fn cmd_inspect(config: &Config, path: &Path, id: Option<&str>, json: bool) -> Result<()> {
    let test = load_test(path, id).await?;
    let inspection = inspect(config, &test).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    println!("key: {}", inspection.key);
    if !inspection.exists {
        println!("snapshot: none (every step will be generated)");
    } else {
        if let Some(path) = &inspection.path {
            println!("snapshot: {}", path.display());
        }
        println!("would replay: {}", inspection.would_replay);
        println!("force regenerate: {}", inspection.force_regenerate);
        if let Some(at) = inspection.last_passed_at {
            println!("last passed: {}", at.to_rfc3339());
        }
        if let Some(at) = inspection.last_failed_at {
            println!(
                "last failed: {} ({})",
                at.to_rfc3339(),
                inspection.last_failure_reason.as_deref().unwrap_or("no reason")
            );
        }
        if inspection.stale_entries > 0 {
            println!("stale entries: {}", inspection.stale_entries);
        }
    }
    for step in &inspection.steps {
        println!(
            "{:>3}  {:<10}  {}",
            step.index,
            if step.cached { "cached" } else { "regenerate" },
            step.text
        );
    }
    Ok(())
}

pub async fn invalidate(config: &Config, test: &TestCase) -> Result<()> {
    let store = SnapshotStoreBuilder::new(config.snapshot_policy()).build();
    let key = test.snapshot_key();
    match store
        .set_flags(
            &key,
            FlagUpdate {
                force_regenerate: Some(true),
                ..FlagUpdate::default()
            },
        )
        .await
    {
        Ok(_) => {
            info!(key = %key, "snapshot flagged for regeneration");
            Ok(())
        }
        Err(err) if err.kind() == &SnapErrKind::NotFound => {
            bail!("No snapshot for {} ({})", test.label(), key)
        }
        Err(err) => Err(err).context("Failed to update snapshot flags"),
    }
}

pub async fn cmd_invalidate(config: &Config, path: &Path, id: Option<&str>) -> Result<()> {
    let test = load_test(path, id).await?;
    invalidate(config, &test).await?;
    println!("{}: will regenerate on next run", test.snapshot_key());
    Ok(())
}
