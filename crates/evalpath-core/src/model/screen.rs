use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::EvaluationPlan;

/// Cached navigation state format version. A cached state with any other
/// version is treated as a cache miss.
pub const NAVIGATION_STATE_VERSION: u32 = 1;

/// Kind of screen in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    /// Prerequisite screen whose completion generates the plan.
    Selection,
    Instructions,
    Assessment,
    Comparison,
    /// Terminal screen.
    Completion,
}

/// Status resolved from a screen's stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl ScreenStatus {
    /// Completed or skipped.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Status as shown on a navigation item. Exactly one item is `Current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavStatus {
    Pending,
    InProgress,
    Current,
    Completed,
    Skipped,
}

impl NavStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Current => "current",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

impl From<ScreenStatus> for NavStatus {
    fn from(status: ScreenStatus) -> Self {
        match status {
            ScreenStatus::Pending => Self::Pending,
            ScreenStatus::InProgress => Self::InProgress,
            ScreenStatus::Completed => Self::Completed,
            ScreenStatus::Skipped => Self::Skipped,
        }
    }
}

impl fmt::Display for NavStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One annotated screen of a derived navigation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: String,
    pub screen_type: ScreenType,
    pub display_text: String,
    pub status: NavStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Derived view of a user's progress through one flow.
///
/// Never authoritative: always reproducible from screen records plus the
/// plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    #[serde(default)]
    pub version: u32,
    pub navigation_items: Vec<NavigationItem>,
    pub current_screen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<EvaluationPlan>,
    /// Screen the user explicitly navigated to, when different from the
    /// derived current screen. Never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_screen: Option<String>,
}

impl NavigationState {
    /// Look up an item by screen id.
    #[must_use]
    pub fn item(&self, screen_id: &str) -> Option<&NavigationItem> {
        self.navigation_items.iter().find(|item| item.id == screen_id)
    }

    /// Screen the user should be looking at: the focused screen if set,
    /// otherwise the current one.
    #[must_use]
    pub fn active_screen(&self) -> &str {
        self.focused_screen.as_deref().unwrap_or(&self.current_screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_value(NavStatus::InProgress).expect("serialize"),
            "in-progress"
        );
        assert_eq!(
            serde_json::to_value(ScreenStatus::Skipped).expect("serialize"),
            "skipped"
        );
        assert_eq!(NavStatus::Current.to_string(), "current");
    }

    #[test]
    fn resolved_statuses() {
        assert!(ScreenStatus::Completed.is_resolved());
        assert!(ScreenStatus::Skipped.is_resolved());
        assert!(!ScreenStatus::InProgress.is_resolved());
        assert!(!ScreenStatus::Pending.is_resolved());
    }
}
