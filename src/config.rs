//! Docblog configuration module.
//!
//! Handles loading, validating, and merging `docblog.toml`. Stock defaults are
//! the base layer; the user file is merged on top table by table, then
//! command-line flags override individual values.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! folder_id = ""              # Folder holding the documents and the index
//!
//! [output]
//! posts = "posts"             # Directory for rewritten posts
//! assets = "assets"           # Directory for images
//! assets_prefix = ""          # Prefix of image URLs inside posts
//! skip_unpublished = true     # Leave hidden documents out of the site
//!
//! [frontmatter]
//! format = "yaml"             # yaml | toml | json
//! # layout = "post"           # Optional layout directive
//!
//! [index]
//! name = "index"              # Grid document name
//! sheet_title = "Docblog configuration"
//!
//! [rewrite]
//! parallel_depth = 4          # Tree depth below which traversal is sequential
//! redirect_prefix = "https://www.google.com/url?"
//!
//! [source]
//! page_size = 100             # Documents per listing page
//!
//! [description]
//! mode = "excerpt"            # excerpt | none
//! max_chars = 300
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::frontmatter::FrontmatterFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "docblog.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `docblog.toml`.
///
/// All fields have defaults; a user file only lists what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocblogConfig {
    /// Folder holding the source documents and the index grid.
    pub folder_id: String,
    pub output: OutputConfig,
    pub frontmatter: FrontmatterConfig,
    pub index: IndexConfig,
    pub rewrite: RewriteConfig,
    pub source: SourceConfig,
    pub description: DescriptionConfig,
    pub processing: ProcessingConfig,
}

impl DocblogConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.posts.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.posts must not be empty".into(),
            ));
        }
        if self.output.assets.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.assets must not be empty".into(),
            ));
        }
        let prefix = &self.output.assets_prefix;
        if prefix.starts_with('/') || prefix.split('/').any(|part| part == "..") {
            return Err(ConfigError::Validation(format!(
                "output.assets_prefix must be a relative path inside output.assets, got '{prefix}'"
            )));
        }
        if self.index.name.trim().is_empty() {
            return Err(ConfigError::Validation("index.name must not be empty".into()));
        }
        if self.source.page_size == 0 {
            return Err(ConfigError::Validation(
                "source.page_size must be at least 1".into(),
            ));
        }
        if self.description.mode == DescriptionMode::Excerpt && self.description.max_chars == 0 {
            return Err(ConfigError::Validation(
                "description.max_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The folder to work on, or an error naming both ways to set it.
    pub fn require_folder(&self) -> Result<&str, ConfigError> {
        let folder = self.folder_id.trim();
        if folder.is_empty() {
            return Err(ConfigError::Validation(
                "no folder: set folder_id in docblog.toml or pass --folder".into(),
            ));
        }
        Ok(folder)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub posts: String,
    pub assets: String,
    /// Prefix of image URLs inside posts, e.g. `img` for `/img/...`. Assets
    /// are written to the same relative path under `assets`.
    pub assets_prefix: String,
    pub skip_unpublished: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            posts: "posts".to_string(),
            assets: "assets".to_string(),
            assets_prefix: String::new(),
            skip_unpublished: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontmatterConfig {
    pub format: FrontmatterFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub name: String,
    pub sheet_title: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "index".to_string(),
            sheet_title: "Docblog configuration".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    pub parallel_depth: usize,
    /// Links starting with this are unwrapped. Empty disables unwrapping.
    pub redirect_prefix: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            parallel_depth: 4,
            redirect_prefix: "https://www.google.com/url?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionMode {
    /// First paragraph of the document.
    #[default]
    Excerpt,
    /// Leave empty descriptions empty.
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescriptionConfig {
    pub mode: DescriptionMode,
    pub max_chars: usize,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            mode: DescriptionMode::Excerpt,
            max_chars: 300,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of rewrite workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(DocblogConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it exists but is
/// not valid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<DocblogConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: DocblogConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<DocblogConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `docblog.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Docblog Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Folder holding the exported documents and the index grid.
# Can also be given with --folder.
folder_id = ""

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Directory for rewritten posts, named YYYY-MM-DD-title.html.
posts = "posts"

# Directory for images, named {document id}-{file name}.
assets = "assets"

# Prefix of image URLs inside posts: "img" gives /img/{id}-{file}, and the
# file is written to {assets}/img/{id}-{file}.
assets_prefix = ""

# Leave documents marked unpublished in the index out of the site.
skip_unpublished = true

# ---------------------------------------------------------------------------
# Frontmatter
# ---------------------------------------------------------------------------
[frontmatter]
# Header format: "yaml" (--- delimited), "toml" (+++ delimited) or "json".
format = "yaml"

# Layout directive written as the first header field.
# layout = "post"

# ---------------------------------------------------------------------------
# Metadata index
# ---------------------------------------------------------------------------
[index]
# Name of the grid document kept in the folder.
name = "index"

# Title of the grid's sheet.
sheet_title = "Docblog configuration"

# ---------------------------------------------------------------------------
# Markup rewriting
# ---------------------------------------------------------------------------
[rewrite]
# Element depth below which children are rewritten sequentially.
parallel_depth = 4

# Links starting with this prefix are replaced by their q= target.
redirect_prefix = "https://www.google.com/url?"

# ---------------------------------------------------------------------------
# Document listing
# ---------------------------------------------------------------------------
[source]
# Documents fetched per listing page.
page_size = 100

# ---------------------------------------------------------------------------
# Descriptions
# ---------------------------------------------------------------------------
[description]
# How to fill an empty description: "excerpt" (first paragraph) or "none".
mode = "excerpt"

# Maximum excerpt length in characters.
max_chars = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel rewrite workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = DocblogConfig::default();
        assert_eq!(config.folder_id, "");
        assert_eq!(config.output.posts, "posts");
        assert_eq!(config.output.assets, "assets");
        assert!(config.output.skip_unpublished);
        assert_eq!(config.frontmatter.format, FrontmatterFormat::Yaml);
        assert_eq!(config.frontmatter.layout, None);
        assert_eq!(config.index.name, "index");
        assert_eq!(config.rewrite.parallel_depth, 4);
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.description.mode, DescriptionMode::Excerpt);
        assert_eq!(config.description.max_chars, 300);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
folder_id = "drafts"

[frontmatter]
format = "toml"
layout = "post"
"##;
        let config: DocblogConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.folder_id, "drafts");
        assert_eq!(config.frontmatter.format, FrontmatterFormat::Toml);
        assert_eq!(config.frontmatter.layout.as_deref(), Some("post"));
        // Defaults preserved
        assert_eq!(config.output.posts, "posts");
    }

    #[test]
    fn parse_description_none() {
        let config: DocblogConfig = toml::from_str("[description]\nmode = \"none\"").unwrap();
        assert_eq!(config.description.mode, DescriptionMode::Disabled);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.index.sheet_title, "Docblog configuration");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r##"
[output]
posts = "_posts"

[processing]
max_processes = 2
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output.posts, "_posts");
        assert_eq!(config.processing.max_processes, Some(2));
        // Unspecified values should be defaults
        assert_eq!(config.output.assets, "assets");
        assert!(config.output.skip_unpublished);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<DocblogConfig, _> = toml::from_str("[output]\npost = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<DocblogConfig, _> = toml::from_str("[themes]\nx = 1");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_frontmatter_format_rejected() {
        let result: Result<DocblogConfig, _> = toml::from_str("[frontmatter]\nformat = \"xml\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(DocblogConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_page_size_zero() {
        let mut config = DocblogConfig::default();
        config.source.page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_posts_dir() {
        let mut config = DocblogConfig::default();
        config.output.posts = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_assets_prefix_stays_relative() {
        let mut config = DocblogConfig::default();
        config.output.assets_prefix = "img/posts".into();
        assert!(config.validate().is_ok());
        config.output.assets_prefix = "/img".into();
        assert!(config.validate().is_err());
        config.output.assets_prefix = "img/../..".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_max_chars_only_matters_for_excerpts() {
        let mut config = DocblogConfig::default();
        config.description.max_chars = 0;
        assert!(config.validate().is_err());
        config.description.mode = DescriptionMode::Disabled;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[index]\nname = \"\"").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn require_folder() {
        let mut config = DocblogConfig::default();
        assert!(config.require_folder().is_err());
        config.folder_id = " drafts ".into();
        assert_eq!(config.require_folder().unwrap(), "drafts");
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[output]\nposts = \"a\"\nassets = \"b\"").unwrap();
        let overlay: toml::Value = toml::from_str("[output]\nassets = \"c\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["output"]["posts"].as_str(), Some("a"));
        assert_eq!(merged["output"]["assets"].as_str(), Some("c"));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let merged = merge_toml(toml::Value::Integer(1), toml::Value::Integer(2));
        assert_eq!(merged.as_integer(), Some(2));
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str("[source]\npage_size = 10").unwrap();
        let config = resolve_config(stock_defaults_value().unwrap(), Some(overlay)).unwrap();
        assert_eq!(config.source.page_size, 10);
        assert_eq!(config.index.name, "index");
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: DocblogConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = DocblogConfig::default();
        assert_eq!(config.output.posts, defaults.output.posts);
        assert_eq!(config.output.assets_prefix, defaults.output.assets_prefix);
        assert_eq!(config.frontmatter.format, defaults.frontmatter.format);
        assert_eq!(config.rewrite.redirect_prefix, defaults.rewrite.redirect_prefix);
        assert_eq!(config.source.page_size, defaults.source.page_size);
        assert_eq!(config.description.max_chars, defaults.description.max_chars);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for section in [
            "output",
            "frontmatter",
            "index",
            "rewrite",
            "source",
            "description",
            "processing",
        ] {
            assert!(table.contains_key(section), "missing section {section}");
        }
    }
}
