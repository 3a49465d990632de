//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/clustree/clustree.toml`
//! 3. Local config: `.clustree.toml` in the directory of the input table
//! 4. Environment variables: `CLUSTREE_*` prefix
//!
//! Command line flags are applied on top by the CLI layer.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::export::{AestheticSpec, Aesthetics, ExportFormat, Layout, RenderOptions};
use crate::application::ApplicationError;
use crate::domain::{
    AggregateRequest, ColumnSelection, DomainResult, EdgeFilter, MissingValues, TreeOptions,
};
use crate::util::path::expand_path;

pub const LOCAL_CONFIG_FILE: &str = ".clustree.toml";
const ENV_PREFIX: &str = "CLUSTREE";

/// Which columns hold the clusterings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SelectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Explicit columns in resolution order, wins over `prefix`
    pub columns: Vec<String>,
}

/// Edge thresholds. Zero keeps every edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: ExportFormat,
    /// Export destination, stdout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Raw selection for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSelectionConfig {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawFilterConfig {
    pub count: Option<usize>,
    pub proportion: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawOutputConfig {
    pub format: Option<ExportFormat>,
    pub path: Option<PathBuf>,
}

/// Raw settings for intermediate parsing (arrays are Option to detect "not specified").
///
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub missing_values: Option<Vec<String>>,
    pub aggregations: Option<Vec<String>>,
    pub layout: Option<Layout>,
    pub selection: RawSelectionConfig,
    pub filters: RawFilterConfig,
    pub aesthetics: Aesthetics,
    pub output: RawOutputConfig,
}

/// Unified configuration for clustree.
///
/// Scalars and arrays come before tables so the struct serializes to valid TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Cell tokens read as missing
    pub missing_values: Vec<String>,
    /// Node aggregations as `attribute:function`
    pub aggregations: Vec<String>,
    pub layout: Layout,
    pub selection: SelectionConfig,
    pub filters: FilterConfig,
    pub aesthetics: Aesthetics,
    pub output: OutputConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            missing_values: MissingValues::DEFAULT_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            aggregations: vec![],
            layout: Layout::default(),
            selection: SelectionConfig::default(),
            filters: FilterConfig::default(),
            aesthetics: Aesthetics::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Get the XDG config directory for clustree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "clustree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("clustree.toml"))
}

/// Get the path to the local config file next to the input table.
pub fn local_config_path(input_dir: &Path) -> PathBuf {
    input_dir.join(LOCAL_CONFIG_FILE)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Merge arrays with union semantics and negation support.
///
/// - Items from overlay are appended to base, keeping first-seen order
/// - Items prefixed with `!` remove the corresponding item from the result
/// - Duplicates are dropped
///
/// # Examples
/// ```ignore
/// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
/// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
/// ```
pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(base.len() + overlay.len());
    for item in base {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    for pattern in overlay {
        if let Some(negated) = pattern.strip_prefix('!') {
            result.retain(|item| item != negated);
        } else if !result.contains(pattern) {
            result.push(pattern.clone());
        }
    }
    result
}

fn overlay_aesthetic(
    base: &Option<AestheticSpec>,
    overlay: &Option<AestheticSpec>,
) -> Option<AestheticSpec> {
    overlay.clone().or_else(|| base.clone())
}

impl Aesthetics {
    /// Field-wise overlay: a specified aesthetic replaces the inherited one.
    fn overlay(&self, other: &Aesthetics) -> Aesthetics {
        Aesthetics {
            node_colour: overlay_aesthetic(&self.node_colour, &other.node_colour),
            node_size: overlay_aesthetic(&self.node_size, &other.node_size),
            node_alpha: overlay_aesthetic(&self.node_alpha, &other.node_alpha),
            node_text: overlay_aesthetic(&self.node_text, &other.node_text),
        }
    }
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.output.path = self.output.path.as_deref().map(expand_path);
    }

    /// Merge overlay config onto self (base) with union semantics for arrays.
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - `missing_values`, `aggregations`: union merge with negation support
    /// - `selection.columns`: replaced, since its order is the resolution order
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            missing_values: overlay
                .missing_values
                .as_ref()
                .map(|o| merge_array(&self.missing_values, o))
                .unwrap_or_else(|| self.missing_values.clone()),
            aggregations: overlay
                .aggregations
                .as_ref()
                .map(|o| merge_array(&self.aggregations, o))
                .unwrap_or_else(|| self.aggregations.clone()),
            ..self.apply_global(overlay)
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    ///
    /// Defaults are only a starting point; the global file defines the baseline.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            missing_values: global
                .missing_values
                .clone()
                .unwrap_or_else(|| self.missing_values.clone()),
            aggregations: global
                .aggregations
                .clone()
                .unwrap_or_else(|| self.aggregations.clone()),
            layout: global.layout.unwrap_or(self.layout),
            selection: SelectionConfig {
                prefix: global
                    .selection
                    .prefix
                    .clone()
                    .or_else(|| self.selection.prefix.clone()),
                suffix: global
                    .selection
                    .suffix
                    .clone()
                    .or_else(|| self.selection.suffix.clone()),
                columns: global
                    .selection
                    .columns
                    .clone()
                    .unwrap_or_else(|| self.selection.columns.clone()),
            },
            filters: FilterConfig {
                count: global.filters.count.unwrap_or(self.filters.count),
                proportion: global.filters.proportion.unwrap_or(self.filters.proportion),
            },
            aesthetics: self.aesthetics.overlay(&global.aesthetics),
            output: OutputConfig {
                format: global.output.format.unwrap_or(self.output.format),
                path: global
                    .output
                    .path
                    .clone()
                    .or_else(|| self.output.path.clone()),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `input_dir` - Directory of the input table, searched for `.clustree.toml`
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE (global defines the real baseline)
    /// - Global → Local: UNION with negation support
    /// - Any → Env vars: REPLACE (explicit user override)
    pub fn load(input_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path();
        let local = input_dir.map(local_config_path);
        Self::load_from(global.as_deref(), local.as_deref(), Self::environment())
    }

    /// Load from explicit config file locations and environment source.
    ///
    /// Missing files are skipped.
    pub fn load_from(
        global_path: Option<&Path>,
        local_path: Option<&Path>,
        env: Environment,
    ) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config (REPLACES defaults)
        if let Some(path) = global_path.filter(|p| p.exists()) {
            debug!("Loading global config: {}", path.display());
            current = current.apply_global(&load_raw_settings(path)?);
        }

        // 3. Local config (UNION with global)
        if let Some(path) = local_path.filter(|p| p.exists()) {
            debug!("Loading local config: {}", path.display());
            current = current.merge_with(&load_raw_settings(path)?);
        }

        // 4. Environment variables (REPLACE)
        current = current.apply_env_overrides(env)?;

        current.expand_paths();
        Ok(current)
    }

    /// `CLUSTREE_*` variables, `__` separating nested keys, `,` separating list items.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("missing_values")
            .with_list_parse_key("aggregations")
            .with_list_parse_key("selection.columns")
    }

    /// Apply environment variables as explicit overrides.
    fn apply_env_overrides(mut self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get::<Vec<String>>("missing_values") {
            self.missing_values = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("aggregations") {
            self.aggregations = val;
        }
        if let Ok(val) = config.get_string("layout") {
            self.layout = val.parse().map_err(config_message)?;
        }
        if let Ok(val) = config.get_string("selection.prefix") {
            self.selection.prefix = Some(val);
        }
        if let Ok(val) = config.get_string("selection.suffix") {
            self.selection.suffix = Some(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("selection.columns") {
            self.selection.columns = val;
        }
        if let Ok(raw) = config.get_string("filters.count") {
            self.filters.count = raw.trim().parse().map_err(|e| ApplicationError::Config {
                message: format!("filters.count: invalid value '{}': {}", raw, e),
            })?;
        }
        if let Ok(raw) = config.get_string("filters.proportion") {
            self.filters.proportion = raw.trim().parse().map_err(|e| ApplicationError::Config {
                message: format!("filters.proportion: invalid value '{}': {}", raw, e),
            })?;
        }
        if let Ok(val) = config.get_string("output.format") {
            self.output.format = val.parse().map_err(config_message)?;
        }
        if let Ok(val) = config.get_string("output.path") {
            self.output.path = Some(PathBuf::from(val));
        }

        Ok(self)
    }

    pub fn missing_values(&self) -> MissingValues {
        MissingValues::new(&self.missing_values)
    }

    /// Builder options, including aggregations needed by data-driven aesthetics.
    pub fn tree_options(&self) -> DomainResult<TreeOptions> {
        let selection = ColumnSelection {
            prefix: self.selection.prefix.clone(),
            suffix: self.selection.suffix.clone(),
            columns: self.selection.columns.clone(),
        };
        let filter = EdgeFilter {
            min_count: self.filters.count,
            min_proportion: self.filters.proportion,
        };

        let mut options = TreeOptions::new(selection).with_filter(filter);
        for raw in &self.aggregations {
            options = options.with_aggregation(raw.parse::<AggregateRequest>()?);
        }
        for request in self.aesthetics.requests() {
            options = options.with_aggregation(request);
        }
        Ok(options)
    }

    /// Render options, `format` overriding `output.format` when given.
    pub fn render_options(&self, format: Option<ExportFormat>) -> RenderOptions {
        RenderOptions {
            format: format.unwrap_or(self.output.format),
            layout: self.layout,
            aesthetics: self.aesthetics.clone(),
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# clustree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/clustree/clustree.toml  (defines your baseline)
#   Local:  .clustree.toml next to the input  (dataset-specific additions)
#   Env:    CLUSTREE_* environment variables   (explicit overrides)
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Local config UNIONS with global for missing_values and aggregations.
#   Use "!item" in local config to REMOVE an inherited item:
#     aggregations = ["age:median", "!age:mean"]

# Cell values read as missing
# missing_values = ["", "NA", "NaN", "null"]

# Per-node aggregations as "attribute:function"
# functions: mean, median, mode, min, max, sum, count, distinct
# aggregations = ["age:mean", "tissue:mode"]

# Layout hint for downstream renderers: tree or sugiyama
# layout = "tree"

[selection]
# Columns named <prefix><resolution><suffix> hold the clusterings
# prefix = "K"
# suffix = ""
# Explicit columns in resolution order (wins over prefix)
# columns = ["res.0.2", "res.0.4", "res.0.8"]

[filters]
# Drop edges below these thresholds (0 keeps every edge)
# count = 0
# proportion = 0.0

[aesthetics]
# Static value or data-driven { attribute, function }
# node_colour = { attribute = "age", function = "mean" }
# node_size = { value = "size" }

[output]
# json, dot or text
# format = "json"
# path = "~/clustree.json"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

fn config_message(message: String) -> ApplicationError {
    ApplicationError::Config { message }
}
