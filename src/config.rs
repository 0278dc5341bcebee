//! Configuration for the `shapes` tool
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (shapes.toml)
//! - Environment variables (SHAPES__*)
//!
//! ## Example config file (shapes.toml):
//! ```toml
//! [encoding]
//! target_version = "v4"
//! output_format = "compact"
//!
//! [compatibility]
//! strict = false
//! fail_on_breaking = true
//!
//! [history]
//! extension = "json"
//! ```

use clap::ValueEnum;
use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::version::WireVersion;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapesConfig {
    /// Wire encoding settings
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Compatibility checking settings
    #[serde(default)]
    pub compatibility: CompatibilityConfig,

    /// Settings for walking a directory of schema versions
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Wire encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Version written by commands that emit schemas
    #[serde(default)]
    pub target_version: WireVersion,

    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    pub fn render<T: Serialize>(self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

/// Compatibility configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    /// Treat every change as breaking
    #[serde(default)]
    pub strict: bool,

    /// Exit with an error status when breaking changes are found
    #[serde(default = "default_true")]
    pub fail_on_breaking: bool,
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Extension of schema files inside a history directory
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            target_version: WireVersion::LATEST,
            output_format: OutputFormat::Pretty,
        }
    }
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            strict: false,
            fail_on_breaking: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

impl ShapesConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["shapes.toml", ".shapes.toml", "config/shapes.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "shapes", "shapes") {
            let xdg_config = config_dir.config_dir().join("shapes.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (SHAPES__SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix("SHAPES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
