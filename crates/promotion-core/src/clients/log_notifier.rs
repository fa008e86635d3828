//! Notifier that only writes the approval request to the log

use crate::error::Result;
use crate::workflow::approval_types::TicketRef;
use crate::workflow::traits::Notifier;
use async_trait::async_trait;
use promotion_types::CandidateMetrics;

/// Used when no chat integration is configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, ticket_ref: &TicketRef, metrics: &CandidateMetrics, report_ref: &str) -> Result<()> {
        let metrics = metrics
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");

        log::info!(
            "Model approval request: {} is ready for review (metrics: {}; report: {})",
            ticket_ref,
            metrics,
            report_ref
        );
        Ok(())
    }
}
