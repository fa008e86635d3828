//! Configuration management for the promotion pipeline

use crate::error::{PipelineError, Result};
use crate::workflow::approval_types::is_path_safe;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `PROMOTION__APPROVAL__POLL_INTERVAL_SECS`
pub const ENV_PREFIX: &str = "PROMOTION";

/// Main configuration structure
///
/// Every component receives the values it needs at construction, so two
/// runs with different settings can live in the same process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Metric used for the automated accept/reject decision
    #[serde(default = "default_primary_metric")]
    pub primary_metric: String,

    /// Candidate must meet or exceed this value
    #[serde(alias = "min_auc", default = "default_min_metric")]
    pub min_metric: f64,

    /// Retraining is required when the drift score exceeds this
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,

    #[serde(default = "default_model_package_group")]
    pub model_package_group: String,

    /// Where candidate reports are written, `<output_prefix><training_job>/candidate_report.json`
    pub output_prefix: String,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default = "default_approval_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_approval_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

// Default functions
fn default_primary_metric() -> String {
    "auc".to_string()
}

fn default_min_metric() -> f64 {
    0.78
}

fn default_drift_threshold() -> f64 {
    0.1
}

fn default_model_package_group() -> String {
    "loan-fraud-models".to_string()
}

fn default_approval_timeout_secs() -> u64 {
    60 * 60 * 24
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl PipelineConfig {
    /// Configuration with defaults for everything except the output prefix
    pub fn with_output_prefix(output_prefix: impl Into<String>) -> Self {
        Self {
            primary_metric: default_primary_metric(),
            min_metric: default_min_metric(),
            drift_threshold: default_drift_threshold(),
            model_package_group: default_model_package_group(),
            output_prefix: output_prefix.into(),
            approval: ApprovalConfig::default(),
            telegram: None,
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file and apply `PROMOTION__*` environment overrides on top
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Json,
            ))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.primary_metric.trim().is_empty() {
            return Err(PipelineError::Config("Primary metric name is required".to_string()));
        }

        if !self.min_metric.is_finite() {
            return Err(PipelineError::Config("Metric threshold must be a finite number".to_string()));
        }

        if !self.drift_threshold.is_finite() {
            return Err(PipelineError::Config("Drift threshold must be a finite number".to_string()));
        }

        if self.output_prefix.trim().is_empty() {
            return Err(PipelineError::Config("Output prefix is required".to_string()));
        }

        if self.model_package_group.trim().is_empty() {
            return Err(PipelineError::Config("Model package group is required".to_string()));
        }

        // The group names a registry directory and prefixes every ticket ref
        if !is_path_safe(&self.model_package_group) {
            return Err(PipelineError::Config(format!(
                "Model package group '{}' must be a plain name without path separators or a leading dot",
                self.model_package_group
            )));
        }

        if self.approval.poll_interval_secs == 0 {
            return Err(PipelineError::Config("Approval poll interval must be greater than zero".to_string()));
        }

        if self.approval.poll_interval_secs >= self.approval.timeout_secs {
            return Err(PipelineError::Config(format!(
                "Approval poll interval ({}s) must be shorter than the timeout ({}s)",
                self.approval.poll_interval_secs, self.approval.timeout_secs
            )));
        }

        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.is_empty() || telegram.chat_id.is_empty() {
                return Err(PipelineError::Config(
                    "Telegram bot token and chat id are required when telegram is configured".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Report location for a training job
    pub fn report_location(&self, training_job: &str) -> String {
        format!("{}{}/candidate_report.json", self.output_prefix, training_job)
    }
}
