use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Project-level settings from `.evalpath/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub assessments: AssessmentConfig,
}

/// Tuning for the weighted comparison generator.
///
/// The adjacency offset and multiplier precision are product choices, not
/// invariants, so they live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Pairs requested when a plan is first generated.
    #[serde(default = "default_comparisons_per_plan")]
    pub comparisons_per_plan: usize,
    /// Attempt budget is `attempt_factor * target_count`.
    #[serde(default = "default_attempt_factor")]
    pub attempt_factor: usize,
    /// Second-draw weight is `1 / (rank distance + adjacency_offset)`.
    #[serde(default = "default_adjacency_offset")]
    pub adjacency_offset: f64,
    /// Decimal places kept on multipliers.
    #[serde(default = "default_multiplier_precision")]
    pub multiplier_precision: u32,
}

impl GeneratorConfig {
    /// Reject settings the generator cannot draw with.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive or non-finite
    /// `adjacency_offset`, or a zero `attempt_factor`.
    pub fn validate(&self) -> Result<()> {
        if !(self.adjacency_offset.is_finite() && self.adjacency_offset > 0.0) {
            bail!(
                "generator.adjacency_offset must be a positive number, got {}",
                self.adjacency_offset
            );
        }
        if self.attempt_factor == 0 {
            bail!("generator.attempt_factor must be at least 1");
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            comparisons_per_plan: default_comparisons_per_plan(),
            attempt_factor: default_attempt_factor(),
            adjacency_offset: default_adjacency_offset(),
            multiplier_precision: default_multiplier_precision(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Upper bound on assessment screens per plan.
    #[serde(default = "default_assessments_per_plan")]
    pub per_plan: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            per_plan: default_assessments_per_plan(),
        }
    }
}

/// Per-user settings from the platform config directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: EvalConfig,
    pub user: UserConfig,
    pub resolved_output: String,
    pub store_path: PathBuf,
}

/// Load `.evalpath/config.toml` under `project_root`, or defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or
/// validated.
pub fn load_project_config(project_root: &Path) -> Result<EvalConfig> {
    let path = project_root.join(".evalpath/config.toml");
    if !path.exists() {
        return Ok(EvalConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<EvalConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .generator
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(config)
}

/// Load `<config_dir>/evalpath/config.toml`, or defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("evalpath/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Default location of the SQLite record store.
#[must_use]
pub fn default_store_path(project_root: &Path) -> PathBuf {
    dirs::data_dir().map_or_else(
        || project_root.join(".evalpath/records.sqlite3"),
        |dir| dir.join("evalpath/records.sqlite3"),
    )
}

/// Merge project config, user config, environment and CLI flags.
///
/// # Errors
///
/// Returns an error if either config file is unreadable.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);
    let store_path = env::var_os("EVALPATH_DB")
        .map(PathBuf::from)
        .or_else(|| user.store_path.clone())
        .unwrap_or_else(|| default_store_path(project_root));

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
        store_path,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_comparisons_per_plan() -> usize {
    10
}

const fn default_attempt_factor() -> usize {
    10
}

const fn default_adjacency_offset() -> f64 {
    0.5
}

const fn default_multiplier_precision() -> u32 {
    1
}

const fn default_assessments_per_plan() -> usize {
    3
}
