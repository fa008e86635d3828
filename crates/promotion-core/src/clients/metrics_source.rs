//! Loads evaluation metrics written by a training job

use crate::error::{PipelineError, Result};
use crate::paths;
use crate::workflow::traits::MetricsSource;
use async_trait::async_trait;
use promotion_types::CandidateMetrics;

/// Reads `evaluation.json` from the local filesystem,
/// e.g. `{"auc": 0.81, "precision": 0.75, "recall": 0.60}`
#[derive(Debug, Default, Clone)]
pub struct FileMetricsSource;

impl FileMetricsSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsSource for FileMetricsSource {
    async fn load_metrics(&self, evaluation_ref: &str) -> Result<CandidateMetrics> {
        let path = paths::local_path(evaluation_ref);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::NotFound(format!("Evaluation report {:?}: {}", path, e)))?;

        let value: serde_json::Value = serde_json::from_str(&content)?;
        let metrics = CandidateMetrics::from_json_value(&value);
        log::info!("Loaded evaluation metrics: {:?}", metrics);
        Ok(metrics)
    }
}
