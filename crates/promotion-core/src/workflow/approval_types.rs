//! Strongly typed approval tickets and pipeline results

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use promotion_types::{ApprovalStatus, CandidateMetrics, Decision, PromotionResult, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact UTC timestamp used in generated names, e.g. `20250101T120000Z`
pub fn timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// True when `name` can be used as a single file or directory name:
/// no path separators, no leading dot, no surrounding whitespace.
pub fn is_path_safe(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.')
}

/// Opaque registry identifier for one candidate under review
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketRef(String);

impl TicketRef {
    /// New reference inside a model package group
    pub fn generate(group: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}-{}", group, timestamp(), &suffix[..8]))
    }

    pub fn from_string(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PipelineError::Validation("Ticket reference must not be empty".to_string()));
        }
        if !is_path_safe(s) {
            return Err(PipelineError::Validation(format!("Invalid ticket reference: {}", s)));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One candidate waiting for a human decision.
///
/// The status only ever moves out of `Pending`; the registry owns the real
/// value and this copy records what was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub ticket_ref: TicketRef,
    pub created_at: DateTime<Utc>,
    pub metrics: CandidateMetrics,
    status: ApprovalStatus,
}

impl ApprovalTicket {
    pub fn new(ticket_ref: TicketRef, metrics: CandidateMetrics) -> Self {
        Self {
            ticket_ref,
            created_at: Utc::now(),
            metrics,
            status: ApprovalStatus::Pending,
        }
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }

    /// Decision already observed for this ticket, if any
    pub fn decision(&self) -> Option<Decision> {
        Decision::from_status(self.status)
    }

    /// Record an observed registry status. A resolved ticket keeps its status;
    /// observing a different one afterwards is an error.
    pub fn record_status(&mut self, status: ApprovalStatus) -> Result<()> {
        if self.status.is_terminal() && status != self.status {
            return Err(PipelineError::Validation(format!(
                "Ticket {} already resolved as {}, cannot record {}",
                self.ticket_ref, self.status, status
            )));
        }
        self.status = status;
        Ok(())
    }
}

/// Audit record stored before the reviewer is notified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub training_job: String,
    pub artifact: String,
    pub evaluation: CandidateMetrics,
    pub ticket_ref: TicketRef,
    pub timestamp: String,
}

/// How a pipeline run ended
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Failed validation, nothing was registered
    RejectedByThreshold { verdict: ValidationVerdict },
    Approved {
        ticket: ApprovalTicket,
        promotion: PromotionResult,
    },
    Rejected { ticket: ApprovalTicket },
    TimedOut { ticket: ApprovalTicket },
}

impl PipelineOutcome {
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Self::RejectedByThreshold { .. } => None,
            Self::Approved { .. } => Some(Decision::Approved),
            Self::Rejected { .. } => Some(Decision::Rejected),
            Self::TimedOut { .. } => Some(Decision::TimedOut),
        }
    }

    pub fn ticket(&self) -> Option<&ApprovalTicket> {
        match self {
            Self::RejectedByThreshold { .. } => None,
            Self::Approved { ticket, .. } | Self::Rejected { ticket } | Self::TimedOut { ticket } => Some(ticket),
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectedByThreshold { verdict } => write!(f, "Rejected by threshold: {}", verdict),
            Self::Approved { ticket, promotion } => match promotion {
                PromotionResult::Promoted { detail } => {
                    write!(f, "Ticket {} approved and promoted: {}", ticket.ticket_ref, detail)
                }
                PromotionResult::Deferred { reason } => {
                    write!(f, "Ticket {} approved, promotion deferred: {}", ticket.ticket_ref, reason)
                }
            },
            Self::Rejected { ticket } => write!(f, "Ticket {} rejected by reviewer", ticket.ticket_ref),
            Self::TimedOut { ticket } => write!(f, "Ticket {} timed out waiting for approval", ticket.ticket_ref),
        }
    }
}
