//! Pipeline orchestrator: evaluate, register, notify, wait, promote

use super::approval_types::{timestamp, ApprovalTicket, CandidateReport, PipelineOutcome};
use super::approval_watcher::ApprovalWatcher;
use super::traits::{MetricsSource, ModelRegistry, Notifier, Promoter, ReportSink};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluator::CandidateEvaluator;
use promotion_types::{CandidateMetrics, Decision, TrainingRun, ValidationVerdict};
use std::sync::Arc;

/// External systems a pipeline run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub metrics_source: Arc<dyn MetricsSource>,
    pub registry: Arc<dyn ModelRegistry>,
    pub report_sink: Arc<dyn ReportSink>,
    pub notifier: Arc<dyn Notifier>,
    pub promoter: Arc<dyn Promoter>,
}

/// Drives one candidate from evaluation metrics to a terminal outcome.
///
/// Registration, report storage and notification each happen once. Any of
/// them failing aborts the run with the underlying error; nothing is retried
/// here because re-notifying a reviewer is not known to be safe.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    evaluator: CandidateEvaluator,
    collaborators: Collaborators,
    watcher: ApprovalWatcher,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let evaluator = CandidateEvaluator::from_config(&config);
        let watcher = ApprovalWatcher::from_config(collaborators.registry.clone(), &config.approval);

        Self {
            config,
            evaluator,
            collaborators,
            watcher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for a single trained candidate
    pub async fn run(&self, run: &TrainingRun) -> Result<PipelineOutcome> {
        log::info!("Processing training job {} (artifact {})", run.training_job, run.artifact_ref);

        let metrics = self.load_candidate_metrics(run).await;
        let verdict = self.evaluator.evaluate(&metrics, self.config.min_metric);

        if !verdict.passed() {
            log::info!("Candidate {} failed validation. Aborting registration.", run.training_job);
            return Ok(PipelineOutcome::RejectedByThreshold { verdict });
        }

        self.register_and_await(run, metrics).await
    }

    /// Evaluate several trained alternatives and take the best passing one
    /// through registration and approval.
    pub async fn run_best(&self, runs: &[TrainingRun]) -> Result<PipelineOutcome> {
        let mut candidates = Vec::with_capacity(runs.len());
        for run in runs {
            let metrics = self.load_candidate_metrics(run).await;
            candidates.push((run.training_job.clone(), metrics));
        }

        let Some((index, _)) = self.evaluator.select_best(&candidates, self.config.min_metric) else {
            let verdict = self.closest_miss(&candidates);
            log::info!("No candidate out of {} passed validation", runs.len());
            return Ok(PipelineOutcome::RejectedByThreshold { verdict });
        };

        let run = &runs[index];
        log::info!("Selected {} ({}) as best candidate", run.training_job, run.artifact_ref);
        let (_, metrics) = candidates.swap_remove(index);

        self.register_and_await(run, metrics).await
    }

    /// Verdict of the highest scoring failed candidate, for reporting
    fn closest_miss(&self, candidates: &[(String, CandidateMetrics)]) -> ValidationVerdict {
        candidates
            .iter()
            .map(|(_, metrics)| self.evaluator.evaluate(metrics, self.config.min_metric))
            .filter(|verdict| verdict.value().is_finite())
            .max_by(|a, b| a.value().total_cmp(&b.value()))
            .unwrap_or_else(|| {
                ValidationVerdict::new(false, self.evaluator.primary_metric(), 0.0, self.config.min_metric)
            })
    }

    /// A missing or unreadable evaluation report becomes empty metrics,
    /// which then fail validation.
    async fn load_candidate_metrics(&self, run: &TrainingRun) -> CandidateMetrics {
        let evaluation_ref = run.evaluation_ref();
        match self.collaborators.metrics_source.load_metrics(&evaluation_ref).await {
            Ok(metrics) => {
                log::info!("Loaded {} evaluation metrics from {}", metrics.len(), evaluation_ref);
                metrics
            }
            Err(e) => {
                log::warn!("Could not load evaluation metrics from {}: {}", evaluation_ref, e);
                CandidateMetrics::new()
            }
        }
    }

    async fn register_and_await(&self, run: &TrainingRun, metrics: CandidateMetrics) -> Result<PipelineOutcome> {
        let group = &self.config.model_package_group;
        let registry = &self.collaborators.registry;

        registry.ensure_group(group).await?;
        let ticket_ref = registry.create_ticket(group, &run.artifact_ref, &metrics).await?;
        log::info!("Registered candidate as {}", ticket_ref);

        let mut ticket = ApprovalTicket::new(ticket_ref, metrics);

        let report = CandidateReport {
            training_job: run.training_job.clone(),
            artifact: run.artifact_ref.clone(),
            evaluation: ticket.metrics.clone(),
            ticket_ref: ticket.ticket_ref.clone(),
            timestamp: timestamp(),
        };
        let report_location = self.config.report_location(&run.training_job);
        self.collaborators.report_sink.store(&report, &report_location).await?;
        log::info!("Stored candidate report at {}", report_location);

        self.collaborators
            .notifier
            .notify(&ticket.ticket_ref, &ticket.metrics, &report_location)
            .await?;

        let decision = self.watcher.resolve(&mut ticket).await?;

        let outcome = match decision {
            Decision::Approved => {
                let promotion = self.collaborators.promoter.promote(&ticket.ticket_ref).await?;
                PipelineOutcome::Approved { ticket, promotion }
            }
            Decision::Rejected => PipelineOutcome::Rejected { ticket },
            Decision::TimedOut => PipelineOutcome::TimedOut { ticket },
        };

        log::info!("{}", outcome);
        Ok(outcome)
    }
}
