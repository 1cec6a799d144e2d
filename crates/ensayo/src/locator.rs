//! Locator resolver: maps a declarative selector kind + value pair to
//! a driver-native lookup.
//!
//! The driver-native form is a JavaScript DOM query expression that
//! evaluates to the first matching element or `null`. All seven
//! selector kinds resolve to single-element lookups; multi-match kinds
//! (class, name, tag) take the first match, matching the behaviour of
//! the classic WebDriver `find_element` family.

use serde::{Deserialize, Serialize};

use crate::plan::{SelectorKind, SelectorSpec};

/// A resolved lookup descriptor for one DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    kind: SelectorKind,
    value: String,
}

impl Locator {
    /// Resolve a selector kind + value pair.
    #[must_use]
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Resolve an authored selector spec.
    #[must_use]
    pub fn from_spec(spec: &SelectorSpec) -> Self {
        Self::new(spec.kind, spec.value.clone())
    }

    /// Selector kind this locator was resolved from
    #[must_use]
    pub const fn kind(&self) -> SelectorKind {
        self.kind
    }

    /// Selector value this locator was resolved from
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// JavaScript expression evaluating to the element or `null`.
    #[must_use]
    pub fn to_query(&self) -> String {
        let v = &self.value;
        match self.kind {
            SelectorKind::ById => format!("document.getElementById({v:?})"),
            SelectorKind::ByCss => format!("document.querySelector({v:?})"),
            SelectorKind::ByXPath => format!(
                "document.evaluate({v:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
            ),
            SelectorKind::ByClass => format!("(document.getElementsByClassName({v:?})[0] || null)"),
            SelectorKind::ByName => format!("(document.getElementsByName({v:?})[0] || null)"),
            SelectorKind::ByTag => format!("(document.getElementsByTagName({v:?})[0] || null)"),
            SelectorKind::ByLinkText => format!(
                "(Array.from(document.querySelectorAll('a')).find(a => a.textContent.trim() === {v:?}) || null)"
            ),
        }
    }

    /// Human-readable `kind=value` form used in run narration and
    /// error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}={}", self.kind, self.value)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_query() {
        let loc = Locator::new(SelectorKind::ById, "login");
        assert_eq!(loc.to_query(), "document.getElementById(\"login\")");
    }

    #[test]
    fn test_css_query() {
        let loc = Locator::new(SelectorKind::ByCss, "button.primary");
        assert_eq!(loc.to_query(), "document.querySelector(\"button.primary\")");
    }

    #[test]
    fn test_xpath_query_uses_first_ordered_node() {
        let loc = Locator::new(SelectorKind::ByXPath, "//div[@id='x']");
        assert!(loc.to_query().contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_multi_match_kinds_take_first() {
        for kind in [SelectorKind::ByClass, SelectorKind::ByName, SelectorKind::ByTag] {
            let loc = Locator::new(kind, "menu");
            assert!(loc.to_query().contains("[0]"), "kind {kind} should take the first match");
        }
    }

    #[test]
    fn test_link_text_matches_exact_trimmed_text() {
        let loc = Locator::new(SelectorKind::ByLinkText, "Sign out");
        let query = loc.to_query();
        assert!(query.contains("querySelectorAll('a')"));
        assert!(query.contains("textContent.trim() === \"Sign out\""));
    }

    #[test]
    fn test_query_escapes_embedded_quotes() {
        let loc = Locator::new(SelectorKind::ByCss, "a[title=\"x\"]");
        assert!(loc.to_query().contains("\\\""));
    }

    #[test]
    fn test_describe_is_kind_value() {
        let loc = Locator::from_spec(&SelectorSpec::new(SelectorKind::ByName, "q"));
        assert_eq!(loc.describe(), "byname=q");
    }
}
