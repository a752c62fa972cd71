//! Persisted key layout.
//!
//! Every key is scoped to one user and one flow:
//!
//! ```text
//! user:<userId>:<namespace>:plan
//! user:<userId>:<namespace>:completed:<screenId>
//! user:<userId>:<namespace>:in-progress:<screenId>
//! user:<userId>:<namespace>:navigation-state
//! ```
//!
//! The namespace is `level2` for the fixed flow and `level3:<target>` for
//! the per-target flow.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// An independent evaluation track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "lowercase")]
pub enum Flow {
    /// Fixed flow over a shared item pool.
    Level2,
    /// Per-target flow over the dependencies of one target entity.
    Level3 { target: String },
}

impl Flow {
    /// Key namespace for this flow.
    #[must_use]
    pub fn namespace(&self) -> String {
        match self {
            Self::Level2 => "level2".to_string(),
            Self::Level3 { target } => format!("level3:{target}"),
        }
    }

    /// Build a flow from an optional target identifier.
    #[must_use]
    pub fn from_target(target: Option<&str>) -> Self {
        match target {
            Some(target) => Self::Level3 {
                target: target.to_string(),
            },
            None => Self::Level2,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace())
    }
}

/// Key builder for one `(user, flow)` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowKeys {
    prefix: String,
}

impl FlowKeys {
    /// Scope keys to `user_id` within `flow`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for an empty user id or an empty
    /// level-3 target.
    pub fn new(user_id: &str, flow: &Flow) -> Result<Self, FlowError> {
        if user_id.trim().is_empty() {
            return Err(FlowError::InvalidInput("user id must not be empty".into()));
        }
        if matches!(flow, Flow::Level3 { target } if target.trim().is_empty()) {
            return Err(FlowError::InvalidInput(
                "level3 target must not be empty".into(),
            ));
        }
        Ok(Self {
            prefix: format!("user:{user_id}:{}", flow.namespace()),
        })
    }

    #[must_use]
    pub fn plan(&self) -> String {
        format!("{}:plan", self.prefix)
    }

    /// Where an unreadable plan is preserved before being replaced.
    #[must_use]
    pub fn plan_backup(&self) -> String {
        format!("{}:plan-backup", self.prefix)
    }

    #[must_use]
    pub fn completed(&self, screen_id: &str) -> String {
        format!("{}:completed:{screen_id}", self.prefix)
    }

    #[must_use]
    pub fn in_progress(&self, screen_id: &str) -> String {
        format!("{}:in-progress:{screen_id}", self.prefix)
    }

    #[must_use]
    pub fn navigation_state(&self) -> String {
        format!("{}:navigation-state", self.prefix)
    }

    /// Common prefix of every key in this scope.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level2_layout() {
        let keys = FlowKeys::new("0xabc", &Flow::Level2).expect("keys");
        assert_eq!(keys.plan(), "user:0xabc:level2:plan");
        assert_eq!(
            keys.completed("comparison_3"),
            "user:0xabc:level2:completed:comparison_3"
        );
        assert_eq!(
            keys.in_progress("intro"),
            "user:0xabc:level2:in-progress:intro"
        );
        assert_eq!(
            keys.navigation_state(),
            "user:0xabc:level2:navigation-state"
        );
        assert_eq!(keys.plan_backup(), "user:0xabc:level2:plan-backup");
    }

    #[test]
    fn level3_encodes_target() {
        let flow = Flow::from_target(Some("ethereum/go-ethereum"));
        let keys = FlowKeys::new("u1", &flow).expect("keys");
        assert_eq!(keys.plan(), "user:u1:level3:ethereum/go-ethereum:plan");
    }

    #[test]
    fn distinct_targets_do_not_share_keys() {
        let a = FlowKeys::new("u1", &Flow::from_target(Some("a"))).expect("keys");
        let b = FlowKeys::new("u1", &Flow::from_target(Some("b"))).expect("keys");
        assert_ne!(a.navigation_state(), b.navigation_state());
    }

    #[test]
    fn empty_ids_rejected() {
        assert!(FlowKeys::new("  ", &Flow::Level2).is_err());
        assert!(FlowKeys::new("u1", &Flow::from_target(Some(""))).is_err());
    }
}
