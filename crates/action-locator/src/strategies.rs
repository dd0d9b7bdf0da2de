//! Element selector strategies
//!
//! Eight strategies in fallback order:
//! 1. test-id - stable test id attribute
//! 2. role - ARIA role with accessible name
//! 3. placeholder
//! 4. alt-text
//! 5. title
//! 6. label - associated label text
//! 7. text - visible text, long texts become an anchored prefix pattern
//! 8. css - `tag:nth-of-type(n)`, always defined when the tag is known
//!
//! Strategies only synthesize descriptors from element attributes; counting
//! live matches is the resolver's job.

use action_primitives::{
    normalize_whitespace, ElementAttributes, SelectorDescriptor, SelectorKind, TextMatch,
    DEFAULT_TEST_ID_ATTRIBUTE,
};
use std::sync::Arc;

use crate::types::LocatorStrategy;

/// Visible texts longer than this are matched by prefix
pub const LONG_TEXT_THRESHOLD: usize = 80;

/// Characters kept in a long-text prefix pattern
pub const TEXT_PREFIX_LEN: usize = 48;

/// Strategy trait for descriptor synthesis
pub trait Strategy: Send + Sync {
    /// Get strategy type
    fn strategy_type(&self) -> LocatorStrategy;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }

    /// Descriptor for the element, `None` when the attribute this strategy
    /// reads is absent
    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor>;

    /// Stricter variant tried when `build` matched several elements
    fn exact_variant(&self, _attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        None
    }
}

/// Stable test id attribute
pub struct TestIdStrategy {
    attribute: String,
}

impl TestIdStrategy {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }
}

impl Default for TestIdStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_ID_ATTRIBUTE)
    }
}

impl Strategy for TestIdStrategy {
    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::TestId
    }

    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        let id = non_empty(attrs.test_id.as_deref())?;
        Some(SelectorDescriptor::new(SelectorKind::TestId {
            attribute: self.attribute.clone(),
            id: id.to_string(),
        }))
    }
}

/// ARIA role, narrowed by accessible name when one is known
pub struct RoleStrategy;

impl RoleStrategy {
    fn descriptor(attrs: &ElementAttributes, exact: bool) -> Option<SelectorDescriptor> {
        let role = non_empty(attrs.role.as_deref())?;
        let name = non_empty(attrs.accessible_name.as_deref()).map(TextMatch::literal);
        Some(SelectorDescriptor::role(role, name, exact))
    }
}

impl Strategy for RoleStrategy {
    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Role
    }

    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        Self::descriptor(attrs, false)
    }

    fn exact_variant(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        non_empty(attrs.accessible_name.as_deref())?;
        Self::descriptor(attrs, true)
    }
}

/// Placeholder, alt text, title and label: one text attribute each
pub struct AttributeTextStrategy {
    strategy: LocatorStrategy,
}

impl AttributeTextStrategy {
    pub fn placeholder() -> Self {
        Self {
            strategy: LocatorStrategy::Placeholder,
        }
    }

    pub fn alt_text() -> Self {
        Self {
            strategy: LocatorStrategy::AltText,
        }
    }

    pub fn title() -> Self {
        Self {
            strategy: LocatorStrategy::Title,
        }
    }

    pub fn label() -> Self {
        Self {
            strategy: LocatorStrategy::Label,
        }
    }

    fn value<'a>(&self, attrs: &'a ElementAttributes) -> Option<&'a str> {
        let raw = match self.strategy {
            LocatorStrategy::Placeholder => attrs.placeholder.as_deref(),
            LocatorStrategy::AltText => attrs.alt.as_deref(),
            LocatorStrategy::Title => attrs.title.as_deref(),
            LocatorStrategy::Label => attrs.label.as_deref(),
            _ => None,
        };
        non_empty(raw)
    }

    fn descriptor(&self, attrs: &ElementAttributes, exact: bool) -> Option<SelectorDescriptor> {
        let text = TextMatch::literal(normalize_whitespace(self.value(attrs)?));
        let kind = match self.strategy {
            LocatorStrategy::Placeholder => SelectorKind::Placeholder { text, exact },
            LocatorStrategy::AltText => SelectorKind::AltText { text, exact },
            LocatorStrategy::Title => SelectorKind::Title { text, exact },
            LocatorStrategy::Label => SelectorKind::Label { text, exact },
            _ => return None,
        };
        Some(SelectorDescriptor::new(kind))
    }
}

impl Strategy for AttributeTextStrategy {
    fn strategy_type(&self) -> LocatorStrategy {
        self.strategy
    }

    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        self.descriptor(attrs, false)
    }

    fn exact_variant(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        self.descriptor(attrs, true)
    }
}

/// Visible text content
pub struct VisibleTextStrategy;

impl VisibleTextStrategy {
    fn text_match(attrs: &ElementAttributes) -> Option<TextMatch> {
        let text = normalize_whitespace(non_empty(attrs.text.as_deref())?);
        if text.chars().count() <= LONG_TEXT_THRESHOLD {
            return Some(TextMatch::literal(text));
        }
        let prefix: String = text.chars().take(TEXT_PREFIX_LEN).collect();
        TextMatch::pattern(format!("^{}", regex::escape(&prefix)), "i").ok()
    }
}

impl Strategy for VisibleTextStrategy {
    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Text
    }

    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        Some(SelectorDescriptor::text(Self::text_match(attrs)?, false))
    }

    fn exact_variant(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        match Self::text_match(attrs)? {
            text @ TextMatch::Literal(_) => Some(SelectorDescriptor::text(text, true)),
            TextMatch::Pattern(_) => None,
        }
    }
}

/// Last resort: tag plus position among same-tag siblings
pub struct CssFallbackStrategy;

impl Strategy for CssFallbackStrategy {
    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Css
    }

    fn build(&self, attrs: &ElementAttributes) -> Option<SelectorDescriptor> {
        let tag = non_empty(Some(attrs.tag.as_str()))?.to_ascii_lowercase();
        let selector = match attrs.nth_of_type {
            Some(nth) => format!("{}:nth-of-type({})", tag, nth),
            None => tag,
        };
        Some(SelectorDescriptor::css(selector))
    }
}

/// The full chain in priority order
pub fn default_strategies(test_id_attribute: &str) -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(TestIdStrategy::new(test_id_attribute)),
        Arc::new(RoleStrategy),
        Arc::new(AttributeTextStrategy::placeholder()),
        Arc::new(AttributeTextStrategy::alt_text()),
        Arc::new(AttributeTextStrategy::title()),
        Arc::new(AttributeTextStrategy::label()),
        Arc::new(VisibleTextStrategy),
        Arc::new(CssFallbackStrategy),
    ]
}

/// Descriptor for an element's container, used to scope ambiguous matches
pub fn container_descriptor(container: &ElementAttributes) -> Option<SelectorDescriptor> {
    TestIdStrategy::default()
        .build(container)
        .or_else(|| RoleStrategy.exact_variant(container))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_matches_locator_order() {
        let names: Vec<LocatorStrategy> = default_strategies(DEFAULT_TEST_ID_ATTRIBUTE)
            .iter()
            .map(|s| s.strategy_type())
            .collect();
        assert_eq!(names, LocatorStrategy::fallback_chain());
    }

    #[test]
    fn test_preconditions_skip() {
        let attrs = ElementAttributes::new("button");
        assert!(TestIdStrategy::default().build(&attrs).is_none());
        assert!(RoleStrategy.build(&attrs).is_none());
        assert!(AttributeTextStrategy::label().build(&attrs).is_none());
        assert!(VisibleTextStrategy.build(&attrs.clone().with_text("   ")).is_none());
        assert!(CssFallbackStrategy.build(&attrs).is_some());
    }

    #[test]
    fn test_role_without_name_has_no_exact_variant() {
        let attrs = ElementAttributes::new("nav").with_role("navigation", None);
        assert_eq!(
            RoleStrategy.build(&attrs).unwrap().kind,
            SelectorKind::Role {
                role: "navigation".into(),
                name: None,
                exact: false
            }
        );
        assert!(RoleStrategy.exact_variant(&attrs).is_none());
    }

    #[test]
    fn test_long_text_becomes_prefix_pattern() {
        let long = format!("Terms (v2) apply. {}", "x".repeat(100));
        let attrs = ElementAttributes::new("p").with_text(long.clone());
        let descriptor = VisibleTextStrategy.build(&attrs).unwrap();
        match &descriptor.kind {
            SelectorKind::Text {
                text: TextMatch::Pattern(pattern),
                ..
            } => {
                assert!(pattern.source().starts_with("^Terms \\(v2\\) apply\\."));
                assert_eq!(pattern.flags(), "i");
                assert!(pattern.is_match(&long.to_uppercase()));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(VisibleTextStrategy.exact_variant(&attrs).is_none());
    }

    #[test]
    fn test_css_fallback_uses_nth_of_type() {
        let attrs = ElementAttributes::new("LI").with_nth_of_type(3);
        assert_eq!(
            CssFallbackStrategy.build(&attrs).unwrap(),
            SelectorDescriptor::css("li:nth-of-type(3)")
        );
    }

    #[test]
    fn test_container_descriptor() {
        let form = ElementAttributes::new("form").with_role("form", Some("Sign up"));
        let descriptor = container_descriptor(&form).unwrap();
        assert_eq!(descriptor.kind.name(), "role");
        assert!(container_descriptor(&ElementAttributes::new("div")).is_none());
    }
}
