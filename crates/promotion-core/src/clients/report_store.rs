//! File-backed report sink for candidate audit records

use crate::error::{PipelineError, Result};
use crate::paths;
use crate::workflow::approval_types::CandidateReport;
use crate::workflow::traits::ReportSink;
use async_trait::async_trait;
use std::fs;

/// Writes each report as pretty JSON at its location.
/// Locations are local paths, optionally with a `file://` scheme.
#[derive(Debug, Default, Clone)]
pub struct FileReportStore;

impl FileReportStore {
    pub fn new() -> Self {
        Self
    }

    /// Read a stored report back, e.g. for a reviewer
    pub fn load(&self, location: &str) -> Result<CandidateReport> {
        let content = fs::read_to_string(paths::local_path(location))
            .map_err(|e| PipelineError::NotFound(format!("Report {} unavailable: {}", location, e)))?;

        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Deserialization(format!("Failed to parse report {}: {}", location, e)))
    }
}

#[async_trait]
impl ReportSink for FileReportStore {
    async fn store(&self, report: &CandidateReport, location: &str) -> Result<()> {
        let path = paths::local_path(location);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::unavailable("report sink", format!("{:?}: {}", parent, e)))?;
        }

        let json = serde_json::to_string_pretty(report)
            .map_err(|e| PipelineError::Serialization(format!("Failed to serialize report: {}", e)))?;
        fs::write(&path, json)
            .map_err(|e| PipelineError::unavailable("report sink", format!("{:?}: {}", path, e)))?;

        log::info!("Uploaded JSON to {}", location);
        Ok(())
    }
}
