//! File-backed model registry
//! One JSON record per ticket, grouped by model package group

use crate::error::{PipelineError, Result};
use crate::workflow::approval_types::TicketRef;
use crate::workflow::traits::ModelRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promotion_types::{ApprovalStatus, CandidateMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const GROUP_FILE_NAME: &str = "group.json";
const COLLABORATOR: &str = "registry";

/// Registry entry for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub ticket_ref: TicketRef,
    pub group: String,
    pub artifact_ref: String,
    /// Evaluation metrics, stringified like resource tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Raw registry value, e.g. `PendingManualApproval`
    pub approval_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistryRecord {
    pub fn status(&self) -> ApprovalStatus {
        ApprovalStatus::from_registry_value(&self.approval_status)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

/// Model registry stored under a root directory:
/// `<root>/<group>/group.json` and `<root>/<group>/<ticket>.json`
pub struct FileRegistry {
    root_path: PathBuf,
}

impl FileRegistry {
    /// Create new FileRegistry with specified root path
    pub fn new<P: AsRef<Path>>(root_path: P) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root_path)?;
        Ok(Self { root_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        self.root_path.join(group)
    }

    fn record_path(&self, group: &str, ticket_ref: &TicketRef) -> PathBuf {
        self.group_dir(group).join(format!("{}.json", ticket_ref))
    }

    /// Find a ticket in any group
    fn find_record_path(&self, ticket_ref: &TicketRef) -> Result<PathBuf> {
        let entries = fs::read_dir(&self.root_path).map_err(|e| unavailable("read registry", e))?;

        for entry in entries.flatten() {
            let path = entry.path().join(format!("{}.json", ticket_ref));
            if path.is_file() {
                log::debug!("Found ticket {} at {:?}", ticket_ref, path);
                return Ok(path);
            }
        }

        Err(PipelineError::NotFound(format!("Ticket {} not found in registry", ticket_ref)))
    }

    fn read_record(&self, path: &Path) -> Result<RegistryRecord> {
        let json = fs::read_to_string(path).map_err(|e| unavailable("read ticket", e))?;
        serde_json::from_str(&json)
            .map_err(|e| PipelineError::Deserialization(format!("Failed to deserialize ticket {:?}: {}", path, e)))
    }

    /// Write through a temporary file so a concurrent poll never sees a
    /// half-written record.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| PipelineError::Serialization(format!("Failed to serialize registry record: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| unavailable("write ticket", e))?;
        fs::rename(&tmp_path, path).map_err(|e| unavailable("write ticket", e))?;
        Ok(())
    }

    pub fn get_record(&self, ticket_ref: &TicketRef) -> Result<RegistryRecord> {
        let path = self.find_record_path(ticket_ref)?;
        self.read_record(&path)
    }

    /// Record a reviewer's decision. Only pending tickets can be decided.
    pub fn set_status(&self, ticket_ref: &TicketRef, status: ApprovalStatus) -> Result<RegistryRecord> {
        let path = self.find_record_path(ticket_ref)?;
        let mut record = self.read_record(&path)?;

        let current = record.status();
        if current.is_terminal() {
            return Err(PipelineError::Validation(format!(
                "Ticket {} is already {}",
                ticket_ref, current
            )));
        }

        record.approval_status = status.as_registry_value().to_string();
        record.updated_at = Utc::now();
        self.write_json(&path, &record)?;

        log::info!("Ticket {} status set to {}", ticket_ref, status);
        Ok(record)
    }

    /// All tickets across groups, oldest first
    pub fn list_tickets(&self) -> Result<Vec<RegistryRecord>> {
        let mut records = Vec::new();
        let groups = fs::read_dir(&self.root_path).map_err(|e| unavailable("read registry", e))?;

        for group in groups.flatten() {
            let group_path = group.path();
            if !group_path.is_dir() {
                continue;
            }

            let entries = fs::read_dir(&group_path).map_err(|e| unavailable("read group", e))?;
            for entry in entries.flatten() {
                let path = entry.path();
                let is_ticket = path.extension().and_then(|s| s.to_str()) == Some("json")
                    && path.file_name().and_then(|s| s.to_str()) != Some(GROUP_FILE_NAME);

                if is_ticket {
                    match self.read_record(&path) {
                        Ok(record) => records.push(record),
                        Err(e) => log::warn!("Skipping unreadable ticket {:?}: {}", path, e),
                    }
                }
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

fn unavailable(action: &str, e: std::io::Error) -> PipelineError {
    PipelineError::unavailable(COLLABORATOR, format!("{} failed: {}", action, e))
}

#[async_trait]
impl ModelRegistry for FileRegistry {
    async fn ensure_group(&self, group: &str) -> Result<()> {
        let group_file = self.group_dir(group).join(GROUP_FILE_NAME);
        if group_file.exists() {
            log::info!("Model package group already exists: {}", group);
            return Ok(());
        }

        fs::create_dir_all(self.group_dir(group)).map_err(|e| unavailable("create group", e))?;
        let record = GroupRecord {
            name: group.to_string(),
            description: format!("Candidate models for {}", group),
            created_at: Utc::now(),
        };
        self.write_json(&group_file, &record)?;

        log::info!("Created model package group: {}", group);
        Ok(())
    }

    async fn create_ticket(&self, group: &str, artifact_ref: &str, metrics: &CandidateMetrics) -> Result<TicketRef> {
        if !self.group_dir(group).join(GROUP_FILE_NAME).exists() {
            return Err(PipelineError::NotFound(format!("Model package group {} does not exist", group)));
        }

        let ticket_ref = TicketRef::generate(group);
        let now = Utc::now();
        let record = RegistryRecord {
            ticket_ref: ticket_ref.clone(),
            group: group.to_string(),
            artifact_ref: artifact_ref.to_string(),
            tags: metrics.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            approval_status: ApprovalStatus::Pending.as_registry_value().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.write_json(&self.record_path(group, &ticket_ref), &record)?;
        log::info!("Created model package: {}", ticket_ref);
        Ok(ticket_ref)
    }

    async fn get_status(&self, ticket_ref: &TicketRef) -> Result<ApprovalStatus> {
        Ok(self.get_record(ticket_ref)?.status())
    }
}
