//! Stage configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ConfigError;
use crate::html::DEFAULT_TITLE;

/// Tags that are always treated as a whole: double-clicking them never
/// starts text editing.
const DEFAULT_WHOLE_TAGS: &[&str] = &[
    "html", "head", "body", "div", "section", "article", "main", "header", "footer", "nav",
    "aside", "ul", "ol", "table", "thead", "tbody", "tfoot", "tr", "form", "br", "hr", "img",
    "input", "meta", "link", "iframe", "script", "style", "svg", "video", "audio", "canvas",
    "picture", "source", "embed", "object",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Title reported when a document has no `<title>` text.
    pub fallback_title: SmolStr,
    pub whole_tags: Vec<SmolStr>,
    /// Tags that open as an embedded sub-document. Any custom element name
    /// (one containing `-`) also counts.
    pub web_component_tags: Vec<SmolStr>,
    pub select_all_delay_ms: u64,
    pub auto_expand_delay_ms: u64,
    pub reselect_after_switch_ms: u64,
    /// Save the current file's unsaved edits before a file tree click
    /// opens another.
    pub auto_save: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            fallback_title: SmolStr::new_static(DEFAULT_TITLE),
            whole_tags: DEFAULT_WHOLE_TAGS
                .iter()
                .copied()
                .map(SmolStr::new_static)
                .collect(),
            web_component_tags: Vec::new(),
            select_all_delay_ms: 50,
            auto_expand_delay_ms: 1000,
            reselect_after_switch_ms: 100,
            auto_save: false,
        }
    }
}

impl StageConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_whole_tag(&self, tag: &str) -> bool {
        self.whole_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_web_component(&self, tag: &str) -> bool {
        tag.contains('-')
            || self
                .web_component_tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn select_all_delay(&self) -> Duration {
        Duration::from_millis(self.select_all_delay_ms)
    }

    pub fn auto_expand_delay(&self) -> Duration {
        Duration::from_millis(self.auto_expand_delay_ms)
    }

    pub fn reselect_after_switch(&self) -> Duration {
        Duration::from_millis(self.reselect_after_switch_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StageConfig::from_json(
            r#"{ "select_all_delay_ms": 10, "web_component_tags": ["widget"], "auto_save": true }"#,
        )
        .unwrap();
        assert!(config.auto_save);
        assert_eq!(config.select_all_delay(), Duration::from_millis(10));
        assert_eq!(config.auto_expand_delay_ms, 1000);
        assert_eq!(config.fallback_title, "Rainbow");
        assert!(config.is_web_component("widget"));
        assert!(config.is_web_component("my-card"));
        assert!(!config.is_web_component("div"));
    }

    #[test]
    fn test_whole_tags() {
        let config = StageConfig::default();
        assert!(!config.auto_save);
        assert!(config.is_whole_tag("body"));
        assert!(config.is_whole_tag("IMG"));
        assert!(!config.is_whole_tag("p"));
    }

    #[test]
    fn test_invalid_json() {
        let err = StageConfig::from_json("{ \"select_all_delay_ms\": \"soon\" }").unwrap_err();
        assert!(err.to_string().starts_with("invalid stage configuration"));
    }
}
