//! Core types for locator system

use action_primitives::SelectorDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locator strategy enumeration, in priority order
///
/// Earlier strategies are more stable and more specific; when two
/// strategies both yield a unique match the earlier one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorStrategy {
    /// Stable test id attribute
    TestId,

    /// ARIA role with accessible name
    Role,

    Placeholder,

    AltText,

    Title,

    /// Associated label text
    Label,

    /// Visible text content
    Text,

    /// `tag:nth-of-type(n)`, last resort
    Css,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::TestId => "test-id",
            LocatorStrategy::Role => "role",
            LocatorStrategy::Placeholder => "placeholder",
            LocatorStrategy::AltText => "alt-text",
            LocatorStrategy::Title => "title",
            LocatorStrategy::Label => "label",
            LocatorStrategy::Text => "text",
            LocatorStrategy::Css => "css",
        }
    }

    /// Get all strategies in fallback order
    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::TestId,
            LocatorStrategy::Role,
            LocatorStrategy::Placeholder,
            LocatorStrategy::AltText,
            LocatorStrategy::Title,
            LocatorStrategy::Label,
            LocatorStrategy::Text,
            LocatorStrategy::Css,
        ]
    }

    /// Position in the fallback chain (0 = highest priority)
    pub fn rank(&self) -> usize {
        Self::fallback_chain()
            .iter()
            .position(|s| s == self)
            .unwrap_or(usize::MAX)
    }

    /// Base confidence of a match produced by this strategy
    pub fn weight(&self) -> f64 {
        match self {
            LocatorStrategy::TestId => 1.0,
            LocatorStrategy::Role => 0.9,
            LocatorStrategy::Placeholder => 0.8,
            LocatorStrategy::AltText => 0.75,
            LocatorStrategy::Title => 0.7,
            LocatorStrategy::Label => 0.65,
            LocatorStrategy::Text => 0.5,
            LocatorStrategy::Css => 0.3,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptor produced by one strategy together with how well it matched
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub descriptor: SelectorDescriptor,

    /// Strategy used to find this candidate
    pub strategy: LocatorStrategy,

    /// Live elements the descriptor matched before `nth` was applied
    pub match_count: usize,

    /// Confidence score (0.0-1.0): strategy weight over match count
    pub confidence: f64,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(descriptor: SelectorDescriptor, strategy: LocatorStrategy, match_count: usize) -> Self {
        let confidence = if match_count == 0 {
            0.0
        } else {
            strategy.weight() / match_count as f64
        };
        Self {
            descriptor,
            strategy,
            match_count,
            confidence,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.match_count == 1
    }
}

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionKind {
    /// One strategy matched exactly one element
    Unique,

    /// Unique after scoping the descriptor to the element's container
    Scoped,

    /// Best non-unique candidate, pinned with `nth`
    FallbackNth,

    /// Nothing matched; `tag:nth-of-type(n)` emitted blind
    CssLastResort,
}

/// Element resolution result
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub descriptor: SelectorDescriptor,

    /// Strategy used for resolution
    pub strategy: LocatorStrategy,

    pub kind: ResolutionKind,

    /// Confidence score
    pub confidence: f64,
}

impl ResolutionResult {
    pub fn from_candidate(candidate: Candidate, kind: ResolutionKind) -> Self {
        Self {
            descriptor: candidate.descriptor,
            strategy: candidate.strategy,
            kind,
            confidence: candidate.confidence,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, ResolutionKind::Unique | ResolutionKind::Scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order_and_weights() {
        let chain = LocatorStrategy::fallback_chain();
        assert_eq!(chain.first(), Some(&LocatorStrategy::TestId));
        assert_eq!(chain.last(), Some(&LocatorStrategy::Css));
        for pair in chain.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0].weight() > pair[1].weight());
        }
    }

    #[test]
    fn test_candidate_confidence() {
        let c = Candidate::new(
            SelectorDescriptor::css("li"),
            LocatorStrategy::Role,
            3,
        );
        assert!((c.confidence - 0.3).abs() < 1e-9);
        assert!(!c.is_unique());
        assert_eq!(Candidate::new(SelectorDescriptor::css("li"), LocatorStrategy::Css, 0).confidence, 0.0);
    }
}
