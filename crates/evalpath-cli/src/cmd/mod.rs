pub mod complete;
pub mod completions;
pub mod more;
pub mod navigate;
pub mod pairs;
pub mod state;

use anyhow::{Context, Result};
use clap::Args;
use evalpath_core::config::{EffectiveConfig, resolve_config};
use evalpath_core::dataset::Dataset;
use evalpath_core::store::SqliteStore;
use evalpath_core::{Flow, FlowService};
use evalpath_pairs::WeightedPairGenerator;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::{OutputMode, resolve_output_mode};

/// Service wired to the on-disk store and dataset.
pub type Service = FlowService<SqliteStore, WeightedPairGenerator>;

/// User and flow selection shared by every flow command.
#[derive(Args, Debug, Clone)]
pub struct FlowArgs {
    /// User whose progress to read or update.
    #[arg(long, short)]
    pub user: String,

    /// Level-3 target id. Omit for the level-2 flow.
    #[arg(long, short)]
    pub target: Option<String>,
}

impl FlowArgs {
    pub fn flow(&self) -> Flow {
        Flow::from_target(self.target.as_deref())
    }
}

/// Everything a command needs besides its own arguments.
pub struct CommandContext {
    pub output: OutputMode,
    pub config: EffectiveConfig,
    pub store_path: PathBuf,
    pub dataset_path: PathBuf,
}

impl CommandContext {
    /// Resolve config files, environment and global flags.
    pub fn resolve(
        project_root: &Path,
        format: Option<OutputMode>,
        json: bool,
        db: Option<PathBuf>,
        dataset: Option<PathBuf>,
    ) -> Result<Self> {
        let config = resolve_config(project_root, json)?;
        let output = resolve_output_mode(format, json, &config.resolved_output);
        let store_path = db.unwrap_or_else(|| config.store_path.clone());
        let dataset_path = dataset
            .or_else(|| config.user.dataset_path.clone())
            .unwrap_or_else(|| project_root.join(".evalpath/dataset.json"));
        Ok(Self {
            output,
            config,
            store_path,
            dataset_path,
        })
    }

    /// Load the dataset, or an empty one when the file is absent.
    pub fn dataset(&self) -> Result<Dataset> {
        if self.dataset_path.exists() {
            Dataset::load(&self.dataset_path)
        } else {
            debug!(path = %self.dataset_path.display(), "no dataset file; using empty dataset");
            Ok(Dataset::default())
        }
    }

    pub fn service(&self) -> Result<Service> {
        let store = SqliteStore::open(&self.store_path).with_context(|| {
            format!("Failed to open record store {}", self.store_path.display())
        })?;
        let generator = WeightedPairGenerator::from_entropy(self.config.project.generator.clone());
        Ok(FlowService::new(
            store,
            generator,
            self.dataset()?,
            self.config.project.clone(),
        ))
    }
}
