//! Screen catalog: the ordered list of screens a plan implies.
//!
//! Order is fixed prefix, then `assessment_<i>`, then `comparison_<i>`,
//! then the terminal `completion` screen. Identifiers depend only on the
//! position of an entry in its plan collection, and plan collections are
//! append-only, so identifiers persisted as record keys stay valid for the
//! lifetime of the plan.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::keys::Flow;
use crate::model::{EvaluationPlan, ScreenType};

pub const COMPLETION_SCREEN: &str = "completion";
pub const INSTRUCTIONS_SCREEN: &str = "instructions";

const COMPARISON_PREFIX: &str = "comparison_";
const ASSESSMENT_PREFIX: &str = "assessment_";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpec {
    pub id: String,
    pub screen_type: ScreenType,
    pub display_text: String,
    pub data: Option<Value>,
}

impl ScreenSpec {
    fn fixed(id: &str, screen_type: ScreenType, display_text: &str) -> Self {
        Self {
            id: id.to_string(),
            screen_type,
            display_text: display_text.to_string(),
            data: None,
        }
    }

    /// Terminal screen of every flow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.screen_type == ScreenType::Completion
    }
}

/// Screen whose completion generates the plan.
#[must_use]
pub fn prerequisite_screen(flow: &Flow) -> &'static str {
    match flow {
        Flow::Level2 => "selection",
        Flow::Level3 { .. } => "dependency_selection",
    }
}

#[must_use]
pub fn comparison_id(index: usize) -> String {
    format!("{COMPARISON_PREFIX}{index}")
}

#[must_use]
pub fn assessment_id(index: usize) -> String {
    format!("{ASSESSMENT_PREFIX}{index}")
}

/// Index `i` of a `comparison_<i>` identifier.
#[must_use]
pub fn parse_comparison_index(screen_id: &str) -> Option<usize> {
    screen_id.strip_prefix(COMPARISON_PREFIX)?.parse().ok()
}

fn prefix_screens(flow: &Flow) -> Vec<ScreenSpec> {
    let selection = match flow {
        Flow::Level2 => ScreenSpec::fixed(
            prerequisite_screen(flow),
            ScreenType::Selection,
            "Select the projects you want to evaluate",
        ),
        Flow::Level3 { target } => ScreenSpec {
            data: Some(json!({ "target": target })),
            ..ScreenSpec::fixed(
                prerequisite_screen(flow),
                ScreenType::Selection,
                &format!("Select the dependencies of {target} you know"),
            )
        },
    };
    vec![
        selection,
        ScreenSpec::fixed(INSTRUCTIONS_SCREEN, ScreenType::Instructions, "How comparisons work"),
    ]
}

/// Catalog shown before any plan exists: just the prerequisite screen.
#[must_use]
pub fn pre_plan_catalog(flow: &Flow) -> Vec<ScreenSpec> {
    prefix_screens(flow).into_iter().take(1).collect()
}

/// Ordered screen list for `plan` within `flow`.
#[must_use]
pub fn build_catalog(flow: &Flow, plan: &EvaluationPlan) -> Vec<ScreenSpec> {
    let names: HashMap<&str, &str> = plan
        .selected_items
        .iter()
        .map(|item| (item.id.as_str(), item.display_name()))
        .collect();
    let name = |id: &str| names.get(id).copied().unwrap_or(id).to_string();

    let mut screens = prefix_screens(flow);
    screens.reserve(plan.assessments.len() + plan.comparisons.len() + 1);

    for (index, assessment) in plan.assessments.iter().enumerate() {
        screens.push(ScreenSpec {
            id: assessment_id(index),
            screen_type: ScreenType::Assessment,
            display_text: format!("Assess {}", name(&assessment.item_id)),
            data: Some(json!({ "itemId": assessment.item_id })),
        });
    }

    for (index, pair) in plan.comparisons.iter().enumerate() {
        screens.push(ScreenSpec {
            id: comparison_id(index),
            screen_type: ScreenType::Comparison,
            display_text: format!("Compare {} with {}", name(&pair.item_a), name(&pair.item_b)),
            data: Some(json!({
                "itemA": pair.item_a,
                "itemB": pair.item_b,
                "multiplier": pair.multiplier,
            })),
        });
    }

    screens.push(ScreenSpec::fixed(
        COMPLETION_SCREEN,
        ScreenType::Completion,
        "All done",
    ));
    screens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assessment, ComparisonPair, WeightedItem};

    fn pair(a: &str, b: &str) -> ComparisonPair {
        ComparisonPair {
            item_a: a.into(),
            item_b: b.into(),
            multiplier: 1.5,
        }
    }

    fn plan(comparisons: usize) -> EvaluationPlan {
        let items: Vec<WeightedItem> = (0..=comparisons)
            .map(|i| WeightedItem::new(format!("item{i}"), 10.0 - i as f64))
            .collect();
        let pairs = (0..comparisons)
            .map(|i| pair(&format!("item{i}"), &format!("item{}", i + 1)))
            .collect();
        EvaluationPlan::new(
            items,
            pairs,
            vec![Assessment {
                item_id: "item0".into(),
            }],
        )
    }

    fn ids(catalog: &[ScreenSpec]) -> Vec<String> {
        catalog.iter().map(|screen| screen.id.clone()).collect()
    }

    #[test]
    fn level2_catalog_order() {
        let catalog = build_catalog(&Flow::Level2, &plan(2));
        assert_eq!(
            ids(&catalog),
            [
                "selection",
                "instructions",
                "assessment_0",
                "comparison_0",
                "comparison_1",
                "completion"
            ]
        );
        assert!(catalog.last().is_some_and(ScreenSpec::is_terminal));
        assert_eq!(catalog.iter().filter(|s| s.is_terminal()).count(), 1);
    }

    #[test]
    fn level3_prefix_names_target() {
        let flow = Flow::from_target(Some("org/app"));
        let catalog = build_catalog(&flow, &plan(1));
        assert_eq!(catalog[0].id, "dependency_selection");
        assert!(catalog[0].display_text.contains("org/app"));
        assert_eq!(catalog[0].data, Some(json!({"target": "org/app"})));
    }

    #[test]
    fn rebuilding_is_identical() {
        let p = plan(4);
        assert_eq!(build_catalog(&Flow::Level2, &p), build_catalog(&Flow::Level2, &p));
    }

    #[test]
    fn appending_only_adds_trailing_comparisons() {
        let mut p = plan(3);
        let before = ids(&build_catalog(&Flow::Level2, &p));
        p.append_comparisons([pair("item0", "item3"), pair("item1", "item3")]);
        let after = ids(&build_catalog(&Flow::Level2, &p));

        let old_comparisons: Vec<_> = before.iter().filter(|id| id.starts_with("comparison_")).collect();
        let new_comparisons: Vec<_> = after.iter().filter(|id| id.starts_with("comparison_")).collect();
        assert_eq!(&new_comparisons[..old_comparisons.len()], &old_comparisons[..]);
        assert_eq!(new_comparisons[3..], ["comparison_3", "comparison_4"]);
    }

    #[test]
    fn comparison_data_describes_pair() {
        let catalog = build_catalog(&Flow::Level2, &plan(1));
        let screen = catalog
            .iter()
            .find(|s| s.id == "comparison_0")
            .expect("comparison screen");
        assert_eq!(screen.screen_type, ScreenType::Comparison);
        assert_eq!(
            screen.data,
            Some(json!({"itemA": "item0", "itemB": "item1", "multiplier": 1.5}))
        );
    }

    #[test]
    fn labels_are_used_in_display_text() {
        let mut p = plan(1);
        p.selected_items[0].label = Some("Item Zero".into());
        let catalog = build_catalog(&Flow::Level2, &p);
        assert!(catalog.iter().any(|s| s.display_text == "Compare Item Zero with item1"));
    }

    #[test]
    fn pre_plan_catalog_is_single_screen() {
        let catalog = pre_plan_catalog(&Flow::Level2);
        assert_eq!(ids(&catalog), ["selection"]);
    }

    #[test]
    fn comparison_index_parsing() {
        assert_eq!(parse_comparison_index("comparison_12"), Some(12));
        assert_eq!(parse_comparison_index("comparison_x"), None);
        assert_eq!(parse_comparison_index("assessment_1"), None);
        assert_eq!(comparison_id(7), "comparison_7");
        assert_eq!(assessment_id(0), "assessment_0");
    }
}
