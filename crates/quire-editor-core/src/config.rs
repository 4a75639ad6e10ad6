//! Editor configuration.
//!
//! Every field has a default, so a partial JSON object (or `{}`) is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::Result;

/// Undo depth used when none is configured.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// Selector identifying decoration-only markup when none is configured.
pub const DEFAULT_DECORATION_SELECTOR: &str = "[data-decoration]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub history: HistoryConfig,
    /// Collapse whitespace runs when extracting content from the DOM.
    pub collapse_whitespace: bool,
    pub decoration_selector: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            collapse_whitespace: true,
            decoration_selector: DEFAULT_DECORATION_SELECTOR.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Maximum number of undo entries kept. Oldest entries are dropped first.
    pub max_undo: usize,
    /// When set, edits further apart than this never coalesce.
    pub coalesce_timeout_ms: Option<u64>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
            coalesce_timeout_ms: None,
        }
    }
}

impl HistoryConfig {
    pub fn coalesce_timeout(&self) -> Option<Duration> {
        self.coalesce_timeout_ms.map(Duration::from_millis)
    }
}
