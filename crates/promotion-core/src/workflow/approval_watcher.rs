//! Bounded polling of the model registry for a human approval decision
//!
//! There is no push notification for a reviewer's decision, so the watcher
//! reads the registry once per tick and sleeps in between. A decision is
//! seen at most one poll interval after it is made.

use crate::config::ApprovalConfig;
use crate::error::{PipelineError, Result};
use crate::workflow::approval_types::{ApprovalTicket, TicketRef};
use crate::workflow::traits::ModelRegistry;
use promotion_types::{ApprovalStatus, Decision};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use log::{debug, info, warn};

/// Waits for the registry to report a terminal status for a ticket
pub struct ApprovalWatcher {
    registry: Arc<dyn ModelRegistry>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ApprovalWatcher {
    pub fn new(registry: Arc<dyn ModelRegistry>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            registry,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(registry: Arc<dyn ModelRegistry>, config: &ApprovalConfig) -> Self {
        Self::new(registry, config.timeout(), config.poll_interval())
    }

    pub async fn await_decision(&self, ticket_ref: &TicketRef) -> Result<Decision> {
        await_decision(self.registry.as_ref(), ticket_ref, self.timeout, self.poll_interval).await
    }

    /// Wait on a ticket and record what was observed on it.
    ///
    /// A ticket that is already resolved is answered from its recorded
    /// status without touching the registry. A timeout leaves the ticket
    /// pending, since `TimedOut` is never stored.
    pub async fn resolve(&self, ticket: &mut ApprovalTicket) -> Result<Decision> {
        if let Some(decision) = ticket.decision() {
            debug!("Ticket {} already resolved as {}, not polling", ticket.ticket_ref, decision);
            return Ok(decision);
        }

        let decision = self.await_decision(&ticket.ticket_ref).await?;
        match decision {
            Decision::Approved => ticket.record_status(ApprovalStatus::Approved)?,
            Decision::Rejected => ticket.record_status(ApprovalStatus::Rejected)?,
            Decision::TimedOut => {}
        }
        Ok(decision)
    }
}

/// Poll `registry` until the ticket is approved or rejected, or until
/// `timeout` has elapsed.
///
/// The registry is read first, then the loop sleeps for `poll_interval` and
/// checks the deadline before the next read. With a registry that stays
/// pending this makes exactly `ceil(timeout / poll_interval)` reads. A
/// failed read aborts the wait with that error.
pub async fn await_decision(
    registry: &dyn ModelRegistry,
    ticket_ref: &TicketRef,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Decision> {
    if poll_interval.is_zero() {
        return Err(PipelineError::Validation("Poll interval must be greater than zero".to_string()));
    }
    if timeout.is_zero() {
        return Err(PipelineError::Validation("Approval timeout must be greater than zero".to_string()));
    }

    info!(
        "Waiting for approval of {} (timeout {:?}, polling every {:?})",
        ticket_ref, timeout, poll_interval
    );

    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        let status = registry.get_status(ticket_ref).await?;
        polls += 1;
        info!("Current approval status of {}: {} (poll {})", ticket_ref, status, polls);

        if let Some(decision) = Decision::from_status(status) {
            info!("Ticket {} {} after {} polls", ticket_ref, decision, polls);
            return Ok(decision);
        }

        sleep(poll_interval).await;

        if started.elapsed() >= timeout {
            warn!(
                "No decision for {} after {:?} ({} polls), giving up",
                ticket_ref,
                started.elapsed(),
                polls
            );
            return Ok(Decision::TimedOut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::approval_types::ApprovalTicket;
    use async_trait::async_trait;
    use promotion_types::CandidateMetrics;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Registry that replays a fixed status sequence, repeating the last one
    struct ScriptedRegistry {
        script: Mutex<VecDeque<ApprovalStatus>>,
        last: Mutex<ApprovalStatus>,
        fail_on_poll: Option<usize>,
        polls: AtomicUsize,
    }

    impl ScriptedRegistry {
        fn new(script: Vec<ApprovalStatus>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(ApprovalStatus::Pending),
                fail_on_poll: None,
                polls: AtomicUsize::new(0),
            }
        }

        fn always_pending() -> Self {
            Self::new(vec![])
        }

        fn failing_on(mut self, poll: usize) -> Self {
            self.fail_on_poll = Some(poll);
            self
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelRegistry for ScriptedRegistry {
        async fn ensure_group(&self, _group: &str) -> Result<()> {
            Ok(())
        }

        async fn create_ticket(&self, group: &str, _artifact_ref: &str, _metrics: &CandidateMetrics) -> Result<TicketRef> {
            Ok(TicketRef::generate(group))
        }

        async fn get_status(&self, _ticket_ref: &TicketRef) -> Result<ApprovalStatus> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_poll == Some(poll) {
                return Err(PipelineError::unavailable("registry", "connection reset"));
            }

            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(status) = next {
                *last = status;
            }
            Ok(*last)
        }
    }

    fn assert_elapsed(started: Instant, secs: u64) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
            "expected ~{}s, got {:?}",
            secs,
            elapsed
        );
    }

    fn ticket_ref() -> TicketRef {
        TicketRef::from_string("loan-fraud-models-20250101T000000Z-abcd1234").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_approved_after_two_pending_ticks() {
        use ApprovalStatus::*;
        let registry = ScriptedRegistry::new(vec![Pending, Pending, Approved]);

        let started = Instant::now();
        let decision = await_decision(&registry, &ticket_ref(), Duration::from_secs(60), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(decision, Decision::Approved);
        assert_eq!(registry.polls(), 3);
        assert_elapsed(started, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_stops_polling() {
        use ApprovalStatus::*;
        let registry = ScriptedRegistry::new(vec![Pending, Rejected, Approved]);

        let decision = await_decision(&registry, &ticket_ref(), Duration::from_secs(60), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(decision, Decision::Rejected);
        assert_eq!(registry.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_approval_needs_one_poll() {
        let registry = ScriptedRegistry::new(vec![ApprovalStatus::Approved]);

        let started = Instant::now();
        let decision = await_decision(&registry, &ticket_ref(), Duration::from_secs(5), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(decision, Decision::Approved);
        assert_eq!(registry.polls(), 1);
        assert_elapsed(started, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_on_first_tick_past_deadline() {
        let registry = ScriptedRegistry::always_pending();

        let started = Instant::now();
        let decision = await_decision(&registry, &ticket_ref(), Duration::from_secs(5), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(decision, Decision::TimedOut);
        assert_eq!(registry.polls(), 3);
        assert_elapsed(started, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_count_is_ceil_of_timeout_over_interval() {
        let cases = [(5, 2, 3), (6, 2, 3), (1, 2, 1), (10, 1, 10), (7, 3, 3), (86_400, 60, 1_440)];

        for (timeout, interval, expected) in cases {
            let registry = ScriptedRegistry::always_pending();
            let decision = await_decision(
                &registry,
                &ticket_ref(),
                Duration::from_secs(timeout),
                Duration::from_secs(interval),
            )
            .await
            .unwrap();

            assert_eq!(decision, Decision::TimedOut);
            assert_eq!(registry.polls(), expected, "timeout {}s, interval {}s", timeout, interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_error_aborts_wait() {
        let registry = ScriptedRegistry::always_pending().failing_on(2);

        let result = await_decision(&registry, &ticket_ref(), Duration::from_secs(60), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(PipelineError::CollaboratorUnavailable { collaborator: "registry", .. })));
        assert_eq!(registry.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_durations_rejected_before_polling() {
        let registry = ScriptedRegistry::always_pending();

        let zero_interval = await_decision(&registry, &ticket_ref(), Duration::from_secs(5), Duration::ZERO).await;
        assert!(matches!(zero_interval, Err(PipelineError::Validation(_))));

        let zero_timeout = await_decision(&registry, &ticket_ref(), Duration::ZERO, Duration::from_secs(1)).await;
        assert!(matches!(zero_timeout, Err(PipelineError::Validation(_))));

        assert_eq!(registry.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_records_terminal_status() {
        use ApprovalStatus::*;
        let registry = Arc::new(ScriptedRegistry::new(vec![Pending, Approved]));
        let watcher = ApprovalWatcher::new(registry.clone(), Duration::from_secs(60), Duration::from_secs(1));
        let mut ticket = ApprovalTicket::new(ticket_ref(), CandidateMetrics::new());

        assert_eq!(watcher.resolve(&mut ticket).await.unwrap(), Decision::Approved);
        assert_eq!(ticket.status(), Approved);
        assert_eq!(registry.polls(), 2);

        // Resolved tickets are answered without polling again
        assert_eq!(watcher.resolve(&mut ticket).await.unwrap(), Decision::Approved);
        assert_eq!(registry.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_timeout_leaves_ticket_pending() {
        let registry = Arc::new(ScriptedRegistry::always_pending());
        let watcher = ApprovalWatcher::new(registry.clone(), Duration::from_secs(3), Duration::from_secs(1));
        let mut ticket = ApprovalTicket::new(ticket_ref(), CandidateMetrics::new());

        assert_eq!(watcher.resolve(&mut ticket).await.unwrap(), Decision::TimedOut);
        assert_eq!(ticket.status(), ApprovalStatus::Pending);
        assert_eq!(registry.polls(), 3);
    }
}
