//! Static weighted item tables.
//!
//! Read-only lookup data keyed by identifier: the shared level-2 item pool
//! and, per level-3 target, the target's weighted dependency list. Loaded
//! once per process and never mutated afterwards.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::keys::Flow;
use crate::model::WeightedItem;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Level-2 item pool.
    #[serde(default)]
    pub items: Vec<WeightedItem>,
    /// Level-3 dependency lists keyed by target id.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<WeightedItem>>,
}

impl Dataset {
    /// Load a dataset from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Candidate items for `flow`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for a level-3 target the dataset
    /// does not know.
    pub fn items_for(&self, flow: &Flow) -> Result<&[WeightedItem], FlowError> {
        match flow {
            Flow::Level2 => Ok(&self.items),
            Flow::Level3 { target } => self
                .dependencies
                .get(target)
                .map(Vec::as_slice)
                .ok_or_else(|| FlowError::InvalidInput(format!("unknown target {target}"))),
        }
    }

    /// Resolve selected ids to weighted items, ranked by descending weight.
    ///
    /// An empty selection means "all candidates". Duplicate ids collapse.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] if any id is not a candidate of
    /// `flow`.
    pub fn select(&self, flow: &Flow, ids: &[String]) -> Result<Vec<WeightedItem>, FlowError> {
        let candidates = self.items_for(flow)?;
        let mut selected: Vec<WeightedItem> = if ids.is_empty() {
            candidates.to_vec()
        } else {
            let mut seen = HashSet::new();
            let mut picked = Vec::with_capacity(ids.len());
            for id in ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                let item = candidates
                    .iter()
                    .find(|candidate| &candidate.id == id)
                    .ok_or_else(|| {
                        FlowError::InvalidInput(format!("item {id} is not available in {flow}"))
                    })?;
                picked.push(item.clone());
            }
            picked
        };
        rank_by_weight(&mut selected);
        Ok(selected)
    }

    /// Fill non-positive or non-finite weights in `items` from the
    /// candidates of `flow`. Returns how many items were updated.
    ///
    /// Items the dataset does not know keep their weight. An unknown
    /// level-3 target updates nothing.
    pub fn backfill_weights(&self, flow: &Flow, items: &mut [WeightedItem]) -> usize {
        let Ok(candidates) = self.items_for(flow) else {
            return 0;
        };
        let mut filled = 0;
        for item in items
            .iter_mut()
            .filter(|item| !(item.weight.is_finite() && item.weight > 0.0))
        {
            if let Some(known) = candidates.iter().find(|c| c.id == item.id) {
                item.weight = known.weight;
                filled += 1;
            }
        }
        filled
    }
}

/// Sort by descending weight; ties keep their input order.
pub fn rank_by_weight(items: &mut [WeightedItem]) {
    items.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}
