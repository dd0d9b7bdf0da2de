use std::collections::{BTreeMap, HashSet};

use action_locator::{SerializedTarget, TargetReference};
use action_primitives::{ActionKind, ActionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepreplay_core_types::{Fingerprint, Step};

/// Current on-disk format.
pub const SNAPSHOT_VERSION: u32 = 2;

/// One action taken before the final action of a step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAction {
    pub action_record: ActionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reference: Option<SerializedTarget>,
}

/// Cached execution of one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStep {
    /// Empty only in legacy files; filled from `step_text` on load.
    #[serde(default = "empty_fingerprint")]
    pub step_fingerprint: Fingerprint,
    pub step_index: usize,
    pub step_text: String,
    pub action_kind: ActionKind,
    pub action_record: ActionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reference: Option<SerializedTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preceding_actions: Vec<StoredAction>,
    pub executed_at: DateTime<Utc>,
}

fn empty_fingerprint() -> Fingerprint {
    Fingerprint(String::new())
}

impl SnapshotStep {
    /// Every stored action in execution order, final action last.
    pub fn actions(&self) -> Vec<StoredAction> {
        let mut out = self.preceding_actions.clone();
        out.push(StoredAction {
            action_record: self.action_record.clone(),
            target_reference: self.target_reference.clone(),
        });
        out
    }

    pub fn action_count(&self) -> usize {
        self.preceding_actions.len() + 1
    }
}

/// Lifecycle timestamps and operational switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFlags {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_passed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_reason: Option<String>,
    #[serde(default)]
    pub troubleshooting_enabled: bool,
    #[serde(default)]
    pub force_regenerate: bool,
}

/// Persisted state for one test, keyed by its fingerprint.
///
/// `steps_by_fingerprint` is authoritative. `steps` is the ordered legacy
/// view: written on every save so older readers keep working, and used to
/// rebuild the map when a file predates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,
    pub test_fingerprint: Fingerprint,
    #[serde(default)]
    pub test_text: String,
    #[serde(default)]
    pub steps_by_fingerprint: BTreeMap<Fingerprint, SnapshotStep>,
    #[serde(default)]
    pub steps: Vec<SnapshotStep>,
    #[serde(default)]
    pub flags: SnapshotFlags,
}

impl Snapshot {
    pub fn new(test_fingerprint: Fingerprint, test_text: impl Into<String>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            test_fingerprint,
            test_text: test_text.into(),
            steps_by_fingerprint: BTreeMap::new(),
            steps: Vec::new(),
            flags: SnapshotFlags::default(),
        }
    }

    /// Parse a stored file, upgrading legacy layouts.
    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        let mut snapshot: Snapshot = serde_json::from_slice(data)?;
        snapshot.upgrade();
        Ok(snapshot)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<Vec<u8>> {
        let mut out = self.clone();
        out.version = SNAPSHOT_VERSION;
        out.steps = out.ordered_steps().into_iter().cloned().collect();
        if pretty {
            serde_json::to_vec_pretty(&out)
        } else {
            serde_json::to_vec(&out)
        }
    }

    fn upgrade(&mut self) {
        for step in &mut self.steps {
            if step.step_fingerprint.as_str().is_empty() {
                step.step_fingerprint = Fingerprint::of_step(&step.step_text);
            }
        }
        if self.steps_by_fingerprint.is_empty() {
            for step in &self.steps {
                self.steps_by_fingerprint
                    .insert(step.step_fingerprint.clone(), step.clone());
            }
        }
        self.steps.clear();
        if self.version == 0 {
            self.version = 1;
        }
    }

    pub fn step(&self, fingerprint: &Fingerprint) -> Option<&SnapshotStep> {
        self.steps_by_fingerprint.get(fingerprint)
    }

    pub fn step_count(&self) -> usize {
        self.steps_by_fingerprint.len()
    }

    /// Stored steps ordered by their last known position.
    pub fn ordered_steps(&self) -> Vec<&SnapshotStep> {
        let mut steps: Vec<&SnapshotStep> = self.steps_by_fingerprint.values().collect();
        steps.sort_by(|a, b| {
            a.step_index
                .cmp(&b.step_index)
                .then_with(|| a.executed_at.cmp(&b.executed_at))
        });
        steps
    }

    /// Whether every current step has a cached entry.
    pub fn covers(&self, steps: &[Step]) -> bool {
        steps
            .iter()
            .all(|step| self.steps_by_fingerprint.contains_key(&step.fingerprint))
    }

    /// Current steps without a cached entry.
    pub fn missing<'a>(&self, steps: &'a [Step]) -> Vec<&'a Step> {
        steps
            .iter()
            .filter(|step| !self.steps_by_fingerprint.contains_key(&step.fingerprint))
            .collect()
    }
}

/// One action as it was performed during a run.
#[derive(Clone, Debug)]
pub struct RecordedAction {
    pub record: ActionRecord,
    pub target: Option<TargetReference>,
}

impl RecordedAction {
    pub fn new(record: ActionRecord, target: Option<TargetReference>) -> Self {
        Self { record, target }
    }

    fn stored(&self) -> StoredAction {
        StoredAction {
            action_record: self.record.clone(),
            target_reference: self
                .target
                .as_ref()
                .filter(|target| !target.is_empty())
                .map(TargetReference::to_serialized),
        }
    }
}

/// A step that completed during a run, with the actions it took.
#[derive(Clone, Debug)]
pub struct ExecutedStep {
    pub step: Step,
    pub actions: Vec<RecordedAction>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutedStep {
    pub fn new(step: Step, actions: Vec<RecordedAction>) -> Self {
        Self {
            step,
            actions,
            executed_at: Utc::now(),
        }
    }

    /// Rebuild an executed step from a cached entry that was replayed.
    pub fn from_cached(step: Step, cached: &SnapshotStep) -> Self {
        Self {
            step,
            actions: Vec::new(),
            executed_at: cached.executed_at,
        }
        .with_cached_actions(cached)
    }

    fn with_cached_actions(mut self, cached: &SnapshotStep) -> Self {
        self.actions = cached
            .actions()
            .into_iter()
            .filter_map(|stored| {
                let target = match &stored.target_reference {
                    Some(serialized) => Some(TargetReference::from_serialized(serialized).ok()?),
                    None => None,
                };
                Some(RecordedAction::new(stored.action_record, target))
            })
            .collect();
        self
    }

    /// Stored form; `None` when no action was taken.
    pub fn to_snapshot_step(&self) -> Option<SnapshotStep> {
        let (last, preceding) = self.actions.split_last()?;
        let last = last.stored();
        Some(SnapshotStep {
            step_fingerprint: self.step.fingerprint.clone(),
            step_index: self.step.index,
            step_text: self.step.text.clone(),
            action_kind: last.action_record.kind(),
            action_record: last.action_record,
            target_reference: last.target_reference,
            preceding_actions: preceding.iter().map(RecordedAction::stored).collect(),
            executed_at: self.executed_at,
        })
    }
}

/// Unique fingerprints among `executed` that belong to `expected` and took
/// at least one action.
pub fn executed_coverage(expected: &[Step], executed: &[ExecutedStep]) -> (usize, usize) {
    let wanted: HashSet<&Fingerprint> = expected.iter().map(|step| &step.fingerprint).collect();
    let done: HashSet<&Fingerprint> = executed
        .iter()
        .filter(|step| !step.actions.is_empty())
        .map(|step| &step.step.fingerprint)
        .filter(|fp| wanted.contains(fp))
        .collect();
    (done.len(), wanted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::SelectorDescriptor;
    use serde_json::json;

    fn executed(index: usize, text: &str) -> ExecutedStep {
        ExecutedStep::new(
            Step::new(index, text),
            vec![RecordedAction::new(
                ActionRecord::click(),
                Some(TargetReference::new(
                    Some(SelectorDescriptor::test_id("submit")),
                    Some("4".into()),
                )),
            )],
        )
    }

    #[test]
    fn test_legacy_steps_array_is_upgraded() {
        let legacy = json!({
            "testFingerprint": "tf_abc",
            "testText": "navigate to /login",
            "steps": [{
                "stepIndex": 0,
                "stepText": "navigate to /login",
                "actionKind": "navigation",
                "actionRecord": { "kind": "navigate", "url": "/login" },
                "executedAt": "2024-05-01T10:00:00Z"
            }],
            "flags": { "createdAt": "2024-05-01T10:00:00Z" }
        });
        let snapshot = Snapshot::from_json(legacy.to_string().as_bytes()).unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.step_count(), 1);
        let fp = Fingerprint::of_step("navigate to /login");
        assert_eq!(snapshot.step(&fp).unwrap().step_index, 0);
        assert!(snapshot.flags.last_failed_at.is_none());
    }

    #[test]
    fn test_written_form_carries_derived_steps() {
        let mut snapshot = Snapshot::new(Fingerprint("tf_x".into()), "a\nb");
        for step in [executed(1, "b"), executed(0, "a")] {
            let stored = step.to_snapshot_step().unwrap();
            snapshot
                .steps_by_fingerprint
                .insert(stored.step_fingerprint.clone(), stored);
        }
        let value: serde_json::Value =
            serde_json::from_slice(&snapshot.to_json(false).unwrap()).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["steps"][0]["stepText"], "a");
        assert_eq!(value["steps"][1]["stepText"], "b");
        assert_eq!(value["flags"]["lastFailedAt"], serde_json::Value::Null);
        assert_eq!(
            value["steps"][0]["targetReference"]["selector"],
            json!({ "type": "test-id", "attribute": "data-testid", "id": "submit" })
        );
    }

    #[test]
    fn test_multi_action_step_keeps_order() {
        let mut step = executed(0, "fill in the form");
        step.actions.insert(
            0,
            RecordedAction::new(
                ActionRecord::Navigate {
                    url: "/form".into(),
                },
                None,
            ),
        );
        let stored = step.to_snapshot_step().unwrap();
        assert_eq!(stored.action_kind, ActionKind::Click);
        assert_eq!(stored.preceding_actions.len(), 1);
        let kinds: Vec<ActionKind> = stored
            .actions()
            .iter()
            .map(|a| a.action_record.kind())
            .collect();
        assert_eq!(kinds, vec![ActionKind::Navigation, ActionKind::Click]);

        let empty = ExecutedStep::new(Step::new(0, "noop"), Vec::new());
        assert!(empty.to_snapshot_step().is_none());
    }

    #[test]
    fn test_coverage_counts_unique_expected_steps() {
        let expected = vec![Step::new(0, "a"), Step::new(1, "b"), Step::new(2, "a")];
        let mut runs = vec![executed(0, "a"), executed(2, "a")];
        assert_eq!(executed_coverage(&expected, &runs), (1, 2));
        runs.push(ExecutedStep::new(Step::new(1, "b"), Vec::new()));
        assert_eq!(executed_coverage(&expected, &runs), (1, 2));
        runs.push(executed(1, "b"));
        assert_eq!(executed_coverage(&expected, &runs), (2, 2));
    }
}
