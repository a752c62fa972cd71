use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current plan schema version. Older records are upgraded by
/// [`crate::migrate`] on read.
pub const PLAN_VERSION: u32 = 1;

/// One entry of a ranked, weighted item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    pub id: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl WeightedItem {
    #[must_use]
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            label: None,
        }
    }

    /// Label if present, otherwise the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// "`item_a` is `multiplier` times `item_b`". The heavier item is always
/// `item_a`, so `multiplier >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonPair {
    pub item_a: String,
    pub item_b: String,
    /// Records written before multipliers existed read as `1.0` (equal).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_multiplier() -> f64 {
    1.0
}

impl ComparisonPair {
    /// Order-independent identity of this pair.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        pair_key(&self.item_a, &self.item_b)
    }
}

/// Canonical unordered key for a pair of item ids.
#[must_use]
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Per-item assessment screen added in plan version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub item_id: String,
}

/// A user's evaluation plan for one flow.
///
/// Created once, then append-only: `comparisons` may grow but existing
/// entries never move, so `comparison_<i>` always names `comparisons[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPlan {
    pub version: u32,
    pub selected_items: Vec<WeightedItem>,
    #[serde(default)]
    pub comparisons: Vec<ComparisonPair>,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    /// Denormalized; recomputed from screen records on every derivation.
    #[serde(default)]
    pub completed_count: usize,
    /// Denormalized; recomputed from screen records on every derivation.
    #[serde(default)]
    pub skipped_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EvaluationPlan {
    /// Fresh plan at the current schema version.
    #[must_use]
    pub fn new(
        selected_items: Vec<WeightedItem>,
        comparisons: Vec<ComparisonPair>,
        assessments: Vec<Assessment>,
    ) -> Self {
        Self {
            version: PLAN_VERSION,
            selected_items,
            comparisons,
            assessments,
            completed_count: 0,
            skipped_count: 0,
            created_at: Some(Utc::now()),
        }
    }

    /// Append newly generated pairs after the existing ones.
    ///
    /// Pairs already present (in either orientation) are dropped. Returns
    /// the number of pairs actually appended.
    pub fn append_comparisons(&mut self, pairs: impl IntoIterator<Item = ComparisonPair>) -> usize {
        let mut seen: std::collections::HashSet<(String, String)> =
            self.comparisons.iter().map(ComparisonPair::key).collect();
        let before = self.comparisons.len();
        for pair in pairs {
            if seen.insert(pair.key()) {
                self.comparisons.push(pair);
            }
        }
        self.comparisons.len() - before
    }
}
