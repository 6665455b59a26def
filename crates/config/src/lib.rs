//! Pipeline configuration for Chatloom.
//!
//! Loads `chatloom.toml` from the working directory (or an explicit path)
//! with environment variable overrides, and turns it into a ready-to-run
//! [`Pipeline`]. Every kind specifier and strategy name is checked up front.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatloom_core::{MessageKind, parse_kinds};
use chatloom_transform::{
    CharEstimateCounter, FilterOptions, MessageFilter, Pipeline, RunMerger, Strategy,
    TokenCounter, TrimOptions, Trimmer,
};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "chatloom.toml";

/// The root configuration structure.
///
/// Stages run in a fixed order: filter, merge, trim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Filter stage; skipped when no set is configured
    #[serde(default)]
    pub filter: FilterConfig,

    /// Run-merge stage
    #[serde(default)]
    pub merge: MergeConfig,

    /// Trim stage; skipped when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimConfig>,

    /// Token estimator used by the trim stage
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_ids: Option<Vec<String>>,
}

impl FilterConfig {
    /// True when at least one include or exclude set is configured.
    pub fn is_active(&self) -> bool {
        self.include_names.is_some()
            || self.exclude_names.is_some()
            || self.include_types.is_some()
            || self.exclude_types.is_some()
            || self.include_ids.is_some()
            || self.exclude_ids.is_some()
    }

    pub fn to_options(&self) -> Result<FilterOptions, ConfigError> {
        Ok(FilterOptions {
            include_names: self.include_names.clone(),
            exclude_names: self.exclude_names.clone(),
            include_types: kinds(&self.include_types)?,
            exclude_types: kinds(&self.exclude_types)?,
            include_ids: self.include_ids.clone(),
            exclude_ids: self.exclude_ids.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimConfig {
    pub max_tokens: usize,

    /// `first` or `last`
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub allow_partial: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_on: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_on: Option<Vec<String>>,

    #[serde(default)]
    pub include_system: bool,
}

fn default_strategy() -> String {
    "last".into()
}

impl TrimConfig {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            strategy: default_strategy(),
            allow_partial: false,
            end_on: None,
            start_on: None,
            include_system: false,
        }
    }

    pub fn to_options(&self, counter: Arc<dyn TokenCounter>) -> Result<TrimOptions, ConfigError> {
        let strategy: Strategy = self.strategy.parse()?;
        let options = TrimOptions {
            strategy,
            allow_partial: self.allow_partial,
            end_on: kinds(&self.end_on)?,
            start_on: kinds(&self.start_on)?,
            include_system: self.include_system,
            ..TrimOptions::new(self.max_tokens, counter)
        };
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    #[serde(default = "default_message_overhead")]
    pub message_overhead: usize,
}

fn default_chars_per_token() -> usize {
    4
}
fn default_message_overhead() -> usize {
    4
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            message_overhead: default_message_overhead(),
        }
    }
}

impl EstimatorConfig {
    pub fn counter(&self) -> CharEstimateCounter {
        CharEstimateCounter::new(self.chars_per_token, self.message_overhead)
    }
}

fn kinds(specifiers: &Option<Vec<String>>) -> Result<Option<Vec<MessageKind>>, ConfigError> {
    specifiers
        .as_ref()
        .map(parse_kinds)
        .transpose()
        .map_err(ConfigError::from)
}

impl PipelineConfig {
    /// Load `./chatloom.toml`, then apply environment overrides:
    /// - `CHATLOOM_MAX_TOKENS` (enables the trim stage if absent)
    /// - `CHATLOOM_STRATEGY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(Path::new(CONFIG_FILE))
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CHATLOOM_MAX_TOKENS") {
            let max_tokens: usize = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CHATLOOM_MAX_TOKENS must be a non-negative integer, got '{raw}'"
                ))
            })?;
            match &mut self.trim {
                Some(trim) => trim.max_tokens = max_tokens,
                None => self.trim = Some(TrimConfig::new(max_tokens)),
            }
        }

        if let Some(strategy) = lookup("CHATLOOM_STRATEGY") {
            match &mut self.trim {
                Some(trim) => trim.strategy = strategy,
                None => {
                    return Err(ConfigError::ValidationError(
                        "CHATLOOM_STRATEGY is set but no max_tokens is configured".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validate every specifier, the strategy and the option combination.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.to_options()?;

        if self.estimator.chars_per_token == 0 {
            return Err(ConfigError::ValidationError(
                "estimator.chars_per_token must be > 0".into(),
            ));
        }

        if let Some(trim) = &self.trim {
            trim.to_options(Arc::new(self.estimator.counter()))?;
        }
        Ok(())
    }

    /// Build the configured stages.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigError> {
        let mut pipeline = Pipeline::new();

        if self.filter.is_active() {
            pipeline = pipeline.then(MessageFilter::new(self.filter.to_options()?));
        }

        if self.merge.enabled {
            pipeline = pipeline.then(RunMerger);
        }

        if let Some(trim) = &self.trim {
            let options = trim.to_options(Arc::new(self.estimator.counter()))?;
            pipeline = pipeline.then(Trimmer::new(options)?);
        }

        tracing::debug!(stages = ?pipeline.stage_names(), "Built pipeline");
        Ok(pipeline)
    }

    /// Generate a starter config TOML string (merge on, trim to 4096 tokens).
    pub fn default_toml() -> String {
        let config = Self {
            merge: MergeConfig { enabled: true },
            trim: Some(TrimConfig::new(4096)),
            ..Self::default()
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<chatloom_core::Error> for ConfigError {
    fn from(err: chatloom_core::Error) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}
