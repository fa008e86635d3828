//! Collaborator traits for the promotion workflow
//!
//! Each external system the pipeline talks to sits behind one of these, so
//! the orchestrator can be driven by real adapters or by test doubles.

use async_trait::async_trait;
use crate::error::Result;
use super::approval_types::{CandidateReport, TicketRef};
use promotion_types::{ApprovalStatus, CandidateMetrics, PromotionResult};

/// Source of the evaluation metrics a training job wrote
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn load_metrics(&self, evaluation_ref: &str) -> Result<CandidateMetrics>;
}

/// System of record for candidate approval status
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Make sure the model package group exists. Existing groups are fine.
    async fn ensure_group(&self, group: &str) -> Result<()>;

    /// Register a candidate as pending manual approval
    async fn create_ticket(&self, group: &str, artifact_ref: &str, metrics: &CandidateMetrics) -> Result<TicketRef>;

    /// Current status. Read-only.
    async fn get_status(&self, ticket_ref: &TicketRef) -> Result<ApprovalStatus>;
}

/// Tells a human reviewer that a candidate is waiting
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ticket_ref: &TicketRef, metrics: &CandidateMetrics, report_ref: &str) -> Result<()>;
}

/// Persists the audit report for reviewers
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn store(&self, report: &CandidateReport, location: &str) -> Result<()>;
}

/// Production promotion of an approved candidate, supplied by the caller
#[async_trait]
pub trait Promoter: Send + Sync {
    async fn promote(&self, ticket_ref: &TicketRef) -> Result<PromotionResult>;
}

/// Promoter that leaves the rollout to an operator
#[derive(Debug, Default, Clone)]
pub struct DeferredPromoter;

#[async_trait]
impl Promoter for DeferredPromoter {
    async fn promote(&self, ticket_ref: &TicketRef) -> Result<PromotionResult> {
        log::info!("Ticket {} approved; promotion left to the operator", ticket_ref);
        Ok(PromotionResult::Deferred {
            reason: "no promotion strategy configured; deploy the approved package manually".to_string(),
        })
    }
}
