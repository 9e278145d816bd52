//! Selector strategies: ordered matcher lists describing one logical control.
//!
//! A strategy is data, not code. Supporting a new locale or UI revision means
//! adding a matcher to the list; the evaluator in the engine stays the same.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrategyError {
    #[error("a selector strategy needs at least one matcher")]
    Empty,

    #[error("text matcher for `{selector}` has no text variants")]
    NoVariants { selector: String },
}

/// How rendered text is compared against a configured label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Trimmed rendered text equals the label.
    #[default]
    Exact,
    /// Rendered text contains the label anywhere.
    Substring,
}

impl TextMode {
    pub fn matches(self, rendered: &str, label: &str) -> bool {
        match self {
            TextMode::Exact => rendered.trim() == label,
            TextMode::Substring => rendered.contains(label),
        }
    }
}

impl fmt::Display for TextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMode::Exact => write!(f, "exact"),
            TextMode::Substring => write!(f, "substring"),
        }
    }
}

/// One localized wording of a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextVariant {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl TextVariant {
    pub fn new(text: impl Into<String>, lang: Option<&str>) -> Self {
        Self {
            text: text.into(),
            lang: lang.map(str::to_string),
        }
    }
}

/// A single rule identifying a candidate element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    /// Tag and attribute constraints expressed as a CSS selector.
    Structural {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    /// Candidates selected by `selector`, kept only if their rendered text
    /// matches one of `variants` under `mode`.
    Text {
        selector: String,
        #[serde(default)]
        mode: TextMode,
        variants: Vec<TextVariant>,
    },
}

impl Matcher {
    pub fn css(selector: impl Into<String>) -> Self {
        Matcher::Structural {
            selector: selector.into(),
            lang: None,
        }
    }

    pub fn css_lang(selector: impl Into<String>, lang: &str) -> Self {
        Matcher::Structural {
            selector: selector.into(),
            lang: Some(lang.to_string()),
        }
    }

    pub fn text(selector: impl Into<String>, mode: TextMode, variants: Vec<TextVariant>) -> Self {
        Matcher::Text {
            selector: selector.into(),
            mode,
            variants,
        }
    }

    /// The CSS selector used to pick candidates.
    pub fn selector(&self) -> &str {
        match self {
            Matcher::Structural { selector, .. } | Matcher::Text { selector, .. } => selector,
        }
    }

    /// Whether `rendered` satisfies the text constraint. Structural matchers
    /// have none and always accept.
    pub fn accepts_text(&self, rendered: &str) -> bool {
        match self {
            Matcher::Structural { .. } => true,
            Matcher::Text { mode, variants, .. } => {
                variants.iter().any(|v| mode.matches(rendered, &v.text))
            }
        }
    }

    pub fn needs_text(&self) -> bool {
        matches!(self, Matcher::Text { .. })
    }

    fn validate(&self) -> Result<(), StrategyError> {
        match self {
            Matcher::Text {
                selector, variants, ..
            } if variants.is_empty() => Err(StrategyError::NoVariants {
                selector: selector.clone(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Structural { selector, .. } => write!(f, "{}", selector),
            Matcher::Text {
                selector,
                mode,
                variants,
            } => {
                let labels: Vec<&str> = variants.iter().map(|v| v.text.as_str()).collect();
                write!(f, "{} ({} text: {})", selector, mode, labels.join(" | "))
            }
        }
    }
}

/// A flattened, enumerable view of one matcher rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatcherEntry {
    pub kind: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TextMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Non-empty, ordered matcher list. Earlier matchers take priority; only one
/// matcher's result is ever used per evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Matcher>", into = "Vec<Matcher>")]
pub struct SelectorStrategy {
    matchers: Vec<Matcher>,
}

impl SelectorStrategy {
    pub fn new(matchers: Vec<Matcher>) -> Result<Self, StrategyError> {
        if matchers.is_empty() {
            return Err(StrategyError::Empty);
        }
        for matcher in &matchers {
            matcher.validate()?;
        }
        Ok(Self { matchers })
    }

    /// Append a lower-priority matcher. Unchecked: only used with the
    /// literal matchers in [`builtin`].
    pub(crate) fn then(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Rows of `{kind, value, mode, lang}`; text matchers yield one row per variant.
    pub fn entries(&self) -> Vec<MatcherEntry> {
        let mut rows = Vec::new();
        for matcher in &self.matchers {
            match matcher {
                Matcher::Structural { selector, lang } => rows.push(MatcherEntry {
                    kind: "structural",
                    value: selector.clone(),
                    mode: None,
                    lang: lang.clone(),
                }),
                Matcher::Text { mode, variants, .. } => {
                    rows.extend(variants.iter().map(|v| MatcherEntry {
                        kind: "text",
                        value: v.text.clone(),
                        mode: Some(*mode),
                        lang: v.lang.clone(),
                    }));
                }
            }
        }
        rows
    }
}

impl TryFrom<Vec<Matcher>> for SelectorStrategy {
    type Error = StrategyError;

    fn try_from(matchers: Vec<Matcher>) -> Result<Self, Self::Error> {
        Self::new(matchers)
    }
}

impl From<SelectorStrategy> for Vec<Matcher> {
    fn from(strategy: SelectorStrategy) -> Self {
        strategy.matchers
    }
}

impl TryFrom<Matcher> for SelectorStrategy {
    type Error = StrategyError;

    fn try_from(matcher: Matcher) -> Result<Self, Self::Error> {
        Self::new(vec![matcher])
    }
}

/// Strategies for the notebook controls on the path to the URL input,
/// ordered from most to least specific.
pub mod builtin {
    use super::{Matcher, SelectorStrategy, TextMode, TextVariant};

    fn first(matcher: Matcher) -> SelectorStrategy {
        SelectorStrategy {
            matchers: vec![matcher],
        }
    }

    pub fn target_input() -> SelectorStrategy {
        first(Matcher::css(r#"textarea[formcontrolname="website"]"#))
            .then(Matcher::css(r#"textarea[formcontrolname="newUrl"]"#))
            .then(Matcher::css(r#"input[formcontrolname="newUrl"]"#))
            .then(Matcher::css_lang(
                r#"textarea[placeholder*="リンクを貼り付ける"]"#,
                "ja",
            ))
            .then(Matcher::css_lang(r#"textarea[placeholder*="Paste link"]"#, "en"))
            .then(Matcher::css(r#"textarea[placeholder*="http"]"#))
            .then(Matcher::css_lang(
                r#"input[placeholder*="リンクを貼り付ける"]"#,
                "ja",
            ))
    }

    pub fn menu_trigger() -> SelectorStrategy {
        first(Matcher::text(
            r#"button, div[role="button"]"#,
            TextMode::Substring,
            vec![
                TextVariant::new("ソースを追加", Some("ja")),
                TextVariant::new("Add source", Some("en")),
            ],
        ))
    }

    pub fn option() -> SelectorStrategy {
        // The dialog behind this option covers both websites and YouTube.
        first(Matcher::text(
            "div, span, button",
            TextMode::Exact,
            vec![
                TextVariant::new("ウェブサイト", Some("ja")),
                TextVariant::new("YouTube", None),
                TextVariant::new("Website", Some("en")),
            ],
        ))
    }
}
