use std::fmt;

use uuid::Uuid;

const STEP_PREFIX: &str = "st";
const TEST_PREFIX: &str = "tf";

/// Deterministic content hash used as a cache key.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(transparent))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Fingerprint of a single step line. Surrounding whitespace is ignored.
    pub fn of_step(text: &str) -> Self {
        hash_prefixed(STEP_PREFIX, text.trim().as_bytes())
    }

    /// Fingerprint of a whole test text, normalised line by line.
    pub fn of_test_text(text: &str) -> Self {
        hash_prefixed(TEST_PREFIX, normalize_test_text(text).as_bytes())
    }

    /// Fingerprint of a caller supplied test identity (file + name, etc).
    pub fn of_test_id(id: &str) -> Self {
        hash_prefixed(TEST_PREFIX, id.trim().as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_prefixed(prefix: &str, bytes: &[u8]) -> Fingerprint {
    let hash = blake3::hash(bytes);
    Fingerprint(format!("{}_{}", prefix, hash.to_hex()))
}

fn normalize_test_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// One ordinal line of natural-language instruction.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Step {
    pub index: usize,
    pub text: String,
    pub fingerprint: Fingerprint,
}

impl Step {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_string();
        let fingerprint = Fingerprint::of_step(&text);
        Self {
            index,
            text,
            fingerprint,
        }
    }
}

/// Split test text into steps: one per non-empty trimmed line.
pub fn parse_steps(text: &str) -> Vec<Step> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Step::new(index, line))
        .collect()
}

/// A test as handed to the executor.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestCase {
    /// Stable identity. When present the snapshot key survives edits of
    /// individual steps, which is what makes per-step regeneration useful.
    pub id: Option<String>,
    pub text: String,
}

impl TestCase {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn steps(&self) -> Vec<Step> {
        parse_steps(&self.text)
    }

    /// Key under which the snapshot for this test is stored.
    pub fn snapshot_key(&self) -> Fingerprint {
        match &self.id {
            Some(id) => Fingerprint::of_test_id(id),
            None => Fingerprint::of_test_text(&self.text),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self
                .text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_fingerprint_ignores_surrounding_whitespace() {
        assert_eq!(
            Fingerprint::of_step("click Submit"),
            Fingerprint::of_step("   click Submit \t")
        );
        assert_ne!(
            Fingerprint::of_step("click Submit"),
            Fingerprint::of_step("click submit")
        );
        assert!(Fingerprint::of_step("x").as_str().starts_with("st_"));
    }

    #[test]
    fn parse_steps_skips_blank_lines() {
        let steps = parse_steps("navigate to /login\n\n   click Submit  \n");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[1].index, 1);
        assert_eq!(steps[1].text, "click Submit");
        assert_eq!(steps[1].fingerprint, Fingerprint::of_step("click Submit"));
    }

    #[test]
    fn snapshot_key_prefers_id() {
        let a = TestCase::new("step one\nstep two").with_id("login.test::signs in");
        let b = TestCase::new("step one\nstep 2").with_id("login.test::signs in");
        assert_eq!(a.snapshot_key(), b.snapshot_key());

        let c = TestCase::new("step one\nstep two");
        let d = TestCase::new("  step one\n\nstep two  ");
        assert_eq!(c.snapshot_key(), d.snapshot_key());
        assert_ne!(c.snapshot_key(), TestCase::new("step one").snapshot_key());
        assert!(c.snapshot_key().as_str().starts_with("tf_"));
    }

    #[test]
    fn label_falls_back_to_first_line() {
        assert_eq!(TestCase::new("\n open home \n").label(), "open home");
        assert_eq!(TestCase::new("x").with_id("suite::a").label(), "suite::a");
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn fingerprint_serializes_as_plain_string() {
        let fp = Fingerprint::of_step("a");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
    }
}
