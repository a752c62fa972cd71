use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current completion record schema version.
pub const COMPLETION_VERSION: u32 = 1;

/// Durable marker that a screen was resolved.
///
/// Presence means resolved; `was_skipped` tells an answer apart from an
/// explicit skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub version: u32,
    pub completed: bool,
    pub was_skipped: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

impl CompletionRecord {
    #[must_use]
    pub fn new(was_skipped: bool, data: Value) -> Self {
        Self {
            version: COMPLETION_VERSION,
            completed: true,
            was_skipped,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Marker that a screen was visited but not resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InProgressRecord {
    pub started_at: DateTime<Utc>,
}

impl InProgressRecord {
    #[must_use]
    pub fn now() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }
}
