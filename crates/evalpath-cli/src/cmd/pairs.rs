//! `ep pairs`: run the comparison generator over a weighted item file.
//!
//! Touches no store; useful for tuning `[generator]` settings.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use evalpath_core::PairGenerator;
use evalpath_core::dataset::rank_by_weight;
use evalpath_core::model::{ComparisonPair, WeightedItem};
use evalpath_pairs::WeightedPairGenerator;

use super::CommandContext;
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct PairsArgs {
    /// JSON array of `{"id": ..., "weight": ...}` items.
    #[arg(long)]
    pub items: PathBuf,

    /// Pairs to request. Defaults to `generator.comparisons_per_plan`.
    #[arg(long, short)]
    pub count: Option<usize>,

    /// Seed for a reproducible draw.
    #[arg(long)]
    pub seed: Option<u64>,
}

fn load_items(path: &Path) -> Result<Vec<WeightedItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut items: Vec<WeightedItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    rank_by_weight(&mut items);
    Ok(items)
}

pub fn run_pairs(args: &PairsArgs, ctx: &CommandContext) -> Result<()> {
    let items = load_items(&args.items)?;
    let config = ctx.config.project.generator.clone();
    let count = args.count.unwrap_or(config.comparisons_per_plan);
    let pairs = match args.seed {
        Some(seed) => WeightedPairGenerator::seeded(config, seed).generate(&items, count, &[]),
        None => WeightedPairGenerator::from_entropy(config).generate(&items, count, &[]),
    };
    render_mode(ctx.output, &pairs, write_text, write_pretty)
}

fn write_text(pairs: &Vec<ComparisonPair>, w: &mut dyn Write) -> io::Result<()> {
    for pair in pairs {
        writeln!(w, "{}\t{}\t{}", pair.item_a, pair.item_b, pair.multiplier)?;
    }
    Ok(())
}

fn write_pretty(pairs: &Vec<ComparisonPair>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} comparison pairs", pairs.len()))?;
    for pair in pairs {
        writeln!(w, "{} is {}x {}", pair.item_a, pair.multiplier, pair.item_b)?;
    }
    Ok(())
}
