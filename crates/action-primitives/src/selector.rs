//! Selector descriptors: durable descriptions of how to find an element
//!
//! A descriptor is a strategy-specific `SelectorKind` wrapped in a shared
//! envelope carrying an optional `nth` disambiguation index and an optional
//! `child` descriptor evaluated inside the subtree of the resolved parent.

use regex::{Regex, RegexBuilder};
use std::fmt;

/// Attribute read by the stable test-id strategy unless configured otherwise
pub const DEFAULT_TEST_ID_ATTRIBUTE: &str = "data-testid";

/// Compiled pattern that remembers its source and JS-style flags
#[derive(Debug, Clone)]
pub struct TextPattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl TextPattern {
    /// Compile a pattern. `i`, `m` and `s` flags are honoured; other flags
    /// (`g`, `u`, `y`, ...) carry no meaning for matching and are kept verbatim.
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let flags = flags.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()?;
        Ok(Self {
            source,
            flags,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for TextPattern {}

/// Literal string or pattern used by the text-bearing strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Literal(String),
    Pattern(TextPattern),
}

impl TextMatch {
    pub fn literal(value: impl Into<String>) -> Self {
        TextMatch::Literal(value.into())
    }

    pub fn pattern(source: impl Into<String>, flags: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(TextMatch::Pattern(TextPattern::new(source, flags)?))
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, TextMatch::Pattern(_))
    }

    /// Literal comparison normalises whitespace. `exact` requires full,
    /// case-sensitive equality; otherwise a case-insensitive substring is
    /// enough. Patterns ignore `exact`.
    pub fn matches(&self, candidate: &str, exact: bool) -> bool {
        match self {
            TextMatch::Literal(expected) => {
                let expected = normalize_whitespace(expected);
                let candidate = normalize_whitespace(candidate);
                if exact {
                    candidate == expected
                } else {
                    candidate
                        .to_lowercase()
                        .contains(&expected.to_lowercase())
                }
            }
            TextMatch::Pattern(pattern) => pattern.is_match(candidate),
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Literal(value) => write!(f, "\"{}\"", value),
            TextMatch::Pattern(pattern) => write!(f, "/{}/{}", pattern.source, pattern.flags),
        }
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strategy-specific part of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorKind {
    /// Stable test id attribute (`data-testid` by default)
    TestId { attribute: String, id: String },

    /// ARIA role with optional accessible name
    Role {
        role: String,
        name: Option<TextMatch>,
        exact: bool,
    },

    /// Form control by associated label text
    Label { text: TextMatch, exact: bool },

    /// Input/textarea by placeholder
    Placeholder { text: TextMatch, exact: bool },

    /// Image by alt text
    AltText { text: TextMatch, exact: bool },

    /// Element by title attribute
    Title { text: TextMatch, exact: bool },

    /// Element by visible text
    Text { text: TextMatch, exact: bool },

    /// Raw CSS, emitted by the last-resort strategy as `tag:nth-of-type(n)`
    Css { selector: String },
}

impl SelectorKind {
    /// Strategy name as used in logs and serialized form
    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::TestId { .. } => "test-id",
            SelectorKind::Role { .. } => "role",
            SelectorKind::Label { .. } => "label",
            SelectorKind::Placeholder { .. } => "placeholder",
            SelectorKind::AltText { .. } => "alt-text",
            SelectorKind::Title { .. } => "title",
            SelectorKind::Text { .. } => "text",
            SelectorKind::Css { .. } => "css",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exact_suffix = |exact: &bool| if *exact { "s" } else { "i" };
        match self {
            SelectorKind::TestId { attribute, id } => write!(f, "[{}=\"{}\"]", attribute, id),
            SelectorKind::Role { role, name, exact } => match name {
                Some(name) => write!(f, "role={}[name={}{}]", role, name, exact_suffix(exact)),
                None => write!(f, "role={}", role),
            },
            SelectorKind::Label { text, exact } => write!(f, "label={}{}", text, exact_suffix(exact)),
            SelectorKind::Placeholder { text, exact } => {
                write!(f, "placeholder={}{}", text, exact_suffix(exact))
            }
            SelectorKind::AltText { text, exact } => write!(f, "alt={}{}", text, exact_suffix(exact)),
            SelectorKind::Title { text, exact } => write!(f, "title={}{}", text, exact_suffix(exact)),
            SelectorKind::Text { text, exact } => write!(f, "text={}{}", text, exact_suffix(exact)),
            SelectorKind::Css { selector } => write!(f, "css={}", selector),
        }
    }
}

/// Recursive selector descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorDescriptor {
    pub kind: SelectorKind,

    /// 0-based occurrence among the matches of `kind`
    pub nth: Option<usize>,

    /// Evaluated inside the subtree of the node this descriptor resolves to
    pub child: Option<Box<SelectorDescriptor>>,
}

impl SelectorDescriptor {
    pub fn new(kind: SelectorKind) -> Self {
        Self {
            kind,
            nth: None,
            child: None,
        }
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(SelectorKind::TestId {
            attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
            id: id.into(),
        })
    }

    pub fn role(role: impl Into<String>, name: Option<TextMatch>, exact: bool) -> Self {
        Self::new(SelectorKind::Role {
            role: role.into(),
            name,
            exact,
        })
    }

    pub fn text(text: TextMatch, exact: bool) -> Self {
        Self::new(SelectorKind::Text { text, exact })
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(SelectorKind::Css {
            selector: selector.into(),
        })
    }

    pub fn with_nth(mut self, nth: usize) -> Self {
        self.nth = Some(nth);
        self
    }

    /// Append `child` at the end of the chain
    pub fn with_child(mut self, child: SelectorDescriptor) -> Self {
        match self.child.take() {
            Some(existing) => self.child = Some(Box::new(existing.with_child(child))),
            None => self.child = Some(Box::new(child)),
        }
        self
    }

    /// Number of links in the chain (1 for a plain descriptor)
    pub fn depth(&self) -> usize {
        1 + self.child.as_ref().map(|child| child.depth()).unwrap_or(0)
    }

    /// Innermost descriptor of the chain
    pub fn leaf(&self) -> &SelectorDescriptor {
        match &self.child {
            Some(child) => child.leaf(),
            None => self,
        }
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(nth) = self.nth {
            write!(f, " >> nth={}", nth)?;
        }
        if let Some(child) = &self.child {
            write!(f, " >> {}", child)?;
        }
        Ok(())
    }
}
