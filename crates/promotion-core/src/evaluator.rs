//! Candidate evaluation against the primary metric threshold

use crate::config::PipelineConfig;
use promotion_types::{CandidateMetrics, DriftReport, ValidationVerdict};

pub const DEFAULT_PRIMARY_METRIC: &str = "auc";

/// Decides pass/fail for a candidate from its evaluation metrics.
///
/// A missing or non-finite primary metric counts as a failure, never as an
/// error.
#[derive(Debug, Clone)]
pub struct CandidateEvaluator {
    primary_metric: String,
}

impl Default for CandidateEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY_METRIC)
    }
}

impl CandidateEvaluator {
    pub fn new(primary_metric: impl Into<String>) -> Self {
        Self {
            primary_metric: primary_metric.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.primary_metric.clone())
    }

    pub fn primary_metric(&self) -> &str {
        &self.primary_metric
    }

    /// Pass iff the primary metric is >= threshold (inclusive)
    pub fn evaluate(&self, metrics: &CandidateMetrics, threshold: f64) -> ValidationVerdict {
        let value = match metrics.get_ignore_case(&self.primary_metric) {
            Some(v) => v,
            None => {
                log::warn!("Metric '{}' missing from evaluation, using 0", self.primary_metric);
                0.0
            }
        };

        let passed = value.is_finite() && value >= threshold;
        let verdict = ValidationVerdict::new(passed, self.primary_metric.clone(), value, threshold);
        log::info!("Candidate {}", verdict);
        verdict
    }

    /// Pick the best passing candidate out of several trained alternatives.
    ///
    /// Highest primary metric wins; ties go to the lexicographically smaller
    /// name, then to the earlier position. Returns the winner's index into
    /// `candidates`, or `None` when nothing passes.
    pub fn select_best(
        &self,
        candidates: &[(String, CandidateMetrics)],
        threshold: f64,
    ) -> Option<(usize, ValidationVerdict)> {
        let mut best: Option<(usize, ValidationVerdict)> = None;

        for (index, (name, metrics)) in candidates.iter().enumerate() {
            let verdict = self.evaluate(metrics, threshold);
            if !verdict.passed() {
                continue;
            }

            let replace = match &best {
                None => true,
                Some((best_index, best_verdict)) => {
                    verdict.value() > best_verdict.value()
                        || (verdict.value() == best_verdict.value() && *name < candidates[*best_index].0)
                }
            };

            if replace {
                best = Some((index, verdict));
            }
        }

        best
    }
}

/// Convenience wrapper using the default primary metric
pub fn evaluate(metrics: &CandidateMetrics, threshold: f64) -> ValidationVerdict {
    CandidateEvaluator::default().evaluate(metrics, threshold)
}

/// Decides whether observed data drift warrants retraining
#[derive(Debug, Clone, Copy)]
pub struct DriftGate {
    threshold: f64,
}

impl DriftGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.drift_threshold)
    }

    /// Strictly greater than the threshold. NaN never triggers.
    pub fn requires_retrain(&self, report: &DriftReport) -> bool {
        let retrain = report.drift_score > self.threshold;
        log::info!(
            "Drift score {} vs threshold {} -> {}",
            report.drift_score,
            self.threshold,
            if retrain { "retrain" } else { "no retrain" }
        );
        retrain
    }
}
