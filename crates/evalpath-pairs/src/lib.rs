#![forbid(unsafe_code)]
//! Weighted pairwise comparison generation.
//!
//! Given items ranked by descending weight, draws non-duplicate comparison
//! pairs biased toward items of similar rank. The first item of each pair
//! is drawn proportionally to weight; the second is drawn with weight
//! `1 / (rank distance + adjacency_offset)`, so neighbours in the ranking
//! are compared most often. Each pair names the heavier item first and
//! carries the rounded weight ratio as its multiplier.
//!
//! Output is deterministic only up to the random source: seed a
//! [`rand::rngs::StdRng`] for reproducible runs.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use evalpath_core::config::GeneratorConfig;
use evalpath_core::model::{ComparisonPair, WeightedItem, pair_key};
use evalpath_core::PairGenerator;

/// Rank cutoff above which the requested count is used as-is.
pub const SMALL_SET_LIMIT: usize = 10;

/// Effective pair count for `len` items.
///
/// Small sets (at most [`SMALL_SET_LIMIT`] items) cap the target at
/// `len - 1`; larger sets use `target` unchanged. Fewer than two items
/// cannot form a pair.
#[must_use]
pub fn clamp_target(len: usize, target: usize) -> usize {
    if len < 2 {
        0
    } else if len <= SMALL_SET_LIMIT {
        target.min(len - 1)
    } else {
        target
    }
}

/// Round `value` to `precision` decimal places.
#[must_use]
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10_f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    if scale.is_finite() {
        (value * scale).round() / scale
    } else {
        value
    }
}

/// Cumulative-weight draw: index `i` is chosen with probability
/// `weights[i] / sum(weights)`.
///
/// Returns `None` when no weight is positive.
pub fn weighted_index(weights: &[f64], rng: &mut impl Rng) -> Option<usize> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let mut remainder = rng.gen_range(0.0..total);
    let mut last_positive = None;
    for (index, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        remainder -= weight;
        if remainder <= 0.0 {
            return Some(index);
        }
        last_positive = Some(index);
    }
    // Rounding can leave a sliver of remainder after the last item.
    last_positive
}

/// Second-draw weights relative to `first`. `first` itself gets zero.
#[must_use]
pub fn adjacency_weights(len: usize, first: usize, offset: f64) -> Vec<f64> {
    (0..len)
        .map(|index| {
            if index == first {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let distance = index.abs_diff(first) as f64;
                1.0 / (distance + offset)
            }
        })
        .collect()
}

/// Orient `a`/`b` so the heavier item comes first.
#[must_use]
pub fn oriented_pair(a: &WeightedItem, b: &WeightedItem, precision: u32) -> ComparisonPair {
    let ratio = a.weight / b.weight;
    if ratio >= 1.0 {
        ComparisonPair {
            item_a: a.id.clone(),
            item_b: b.id.clone(),
            multiplier: round_to(ratio, precision),
        }
    } else {
        ComparisonPair {
            item_a: b.id.clone(),
            item_b: a.id.clone(),
            multiplier: round_to(1.0 / ratio, precision),
        }
    }
}

/// Draw up to `target` new pairs from `items`.
///
/// `items` must be ranked by descending weight. Pairs already in
/// `existing` (either orientation) are never produced again. Items with a
/// non-finite or non-positive weight are ignored. The result may be shorter
/// than the clamped target when the attempt budget runs out.
pub fn generate_pairs(
    items: &[WeightedItem],
    target: usize,
    existing: &[ComparisonPair],
    config: &GeneratorConfig,
    rng: &mut impl Rng,
) -> Vec<ComparisonPair> {
    let usable: Vec<&WeightedItem> = items
        .iter()
        .filter(|item| item.weight.is_finite() && item.weight > 0.0)
        .collect();
    if usable.len() < items.len() {
        warn!(
            dropped = items.len() - usable.len(),
            "ignoring items without a positive weight"
        );
    }

    let target = clamp_target(usable.len(), target);
    if target == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = usable.iter().map(|item| item.weight).collect();
    let mut seen: HashSet<(String, String)> = existing.iter().map(ComparisonPair::key).collect();
    let mut pairs = Vec::with_capacity(target);
    let budget = config.attempt_factor.saturating_mul(target);

    let mut attempts = 0;
    while pairs.len() < target && attempts < budget {
        attempts += 1;
        let Some(first) = weighted_index(&weights, rng) else {
            break;
        };
        let second_weights = adjacency_weights(usable.len(), first, config.adjacency_offset);
        let Some(second) = weighted_index(&second_weights, rng) else {
            break;
        };

        let (a, b) = (usable[first], usable[second]);
        if !seen.insert(pair_key(&a.id, &b.id)) {
            continue;
        }
        pairs.push(oriented_pair(a, b, config.multiplier_precision));
    }

    debug!(
        requested = target,
        produced = pairs.len(),
        attempts,
        "generated comparison pairs"
    );
    pairs
}

/// [`PairGenerator`] backed by [`generate_pairs`] and an owned RNG.
pub struct WeightedPairGenerator<R: Rng = StdRng> {
    config: GeneratorConfig,
    rng: R,
}

impl WeightedPairGenerator<StdRng> {
    #[must_use]
    pub fn from_entropy(config: GeneratorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Reproducible generator for tests and replays.
    #[must_use]
    pub fn seeded(config: GeneratorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> WeightedPairGenerator<R> {
    pub const fn with_rng(config: GeneratorConfig, rng: R) -> Self {
        Self { config, rng }
    }

    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl<R: Rng> PairGenerator for WeightedPairGenerator<R> {
    fn generate(
        &mut self,
        items: &[WeightedItem],
        target_count: usize,
        existing: &[ComparisonPair],
    ) -> Vec<ComparisonPair> {
        generate_pairs(items, target_count, existing, &self.config, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(weights: &[f64]) -> Vec<WeightedItem> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightedItem::new(format!("item{i}"), *w))
            .collect()
    }

    #[test]
    fn clamp_rule() {
        assert_eq!(clamp_target(0, 5), 0);
        assert_eq!(clamp_target(1, 5), 0);
        assert_eq!(clamp_target(2, 10), 1);
        assert_eq!(clamp_target(3, 10), 2);
        assert_eq!(clamp_target(7, 3), 3);
        assert_eq!(clamp_target(7, 30), 6);
        assert_eq!(clamp_target(10, 30), 9);
        assert_eq!(clamp_target(11, 30), 30);
    }

    #[test]
    fn rounding() {
        assert!((round_to(2.0 / 3.0, 1) - 0.7).abs() < 1e-12);
        assert!((round_to(10.0 / 3.0, 2) - 3.33).abs() < 1e-12);
        assert!((round_to(4.44, 0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let index = weighted_index(&[0.0, 3.0, 0.0, 1.0], &mut rng).expect("draw");
            assert!(index == 1 || index == 3);
        }
        assert_eq!(weighted_index(&[0.0, 0.0], &mut rng), None);
        assert_eq!(weighted_index(&[], &mut rng), None);
    }

    #[test]
    fn adjacency_prefers_neighbours() {
        let weights = adjacency_weights(5, 2, 0.5);
        assert!(weights[2].abs() < f64::EPSILON);
        assert!(weights[1] > weights[0]);
        assert!((weights[1] - weights[3]).abs() < f64::EPSILON);
    }

    #[test]
    fn orientation_puts_heavier_first() {
        let light = WeightedItem::new("light", 2.0);
        let heavy = WeightedItem::new("heavy", 5.0);
        let pair = oriented_pair(&light, &heavy, 1);
        assert_eq!(pair.item_a, "heavy");
        assert_eq!(pair.item_b, "light");
        assert!((pair.multiplier - 2.5).abs() < 1e-12);
    }

    #[test]
    fn two_items_give_one_pair() {
        let mut rng = StdRng::seed_from_u64(1);
        let pairs = generate_pairs(&items(&[3.0, 1.0]), 10, &[], &GeneratorConfig::default(), &mut rng);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].item_a, "item0");
        assert!((pairs[0].multiplier - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unusable_weights_are_dropped() {
        let mut rng = StdRng::seed_from_u64(3);
        let pairs = generate_pairs(
            &items(&[4.0, 0.0, f64::NAN, 2.0]),
            5,
            &[],
            &GeneratorConfig::default(),
            &mut rng,
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key(), pair_key("item0", "item3"));
    }

    #[test]
    fn zero_attempt_factor_returns_empty() {
        let config = GeneratorConfig {
            attempt_factor: 0,
            ..GeneratorConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert!(generate_pairs(&items(&[3.0, 2.0, 1.0]), 2, &[], &config, &mut rng).is_empty());
    }

    #[test]
    fn seeded_generators_agree() {
        let input = items(&[50.0, 30.0, 20.0, 10.0, 8.0, 5.0, 3.0, 1.0]);
        let mut a = WeightedPairGenerator::seeded(GeneratorConfig::default(), 42);
        let mut b = WeightedPairGenerator::seeded(GeneratorConfig::default(), 42);
        assert_eq!(a.generate(&input, 5, &[]), b.generate(&input, 5, &[]));
    }
}
