//! Shared types for the candidate promotion pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Evaluation metrics produced by a training job, keyed by metric name.
///
/// Values that are not numbers are dropped when the map is built from JSON,
/// so a garbled entry behaves exactly like a missing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, f64>")]
pub struct CandidateMetrics {
    values: BTreeMap<String, f64>,
}

impl CandidateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metrics from an arbitrary JSON value. Anything that is not an
    /// object yields an empty set.
    pub fn from_json_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<String, Value>>()
                .into(),
            other => {
                log::warn!("Evaluation report is not a JSON object ({}), ignoring it", kind_of(other));
                Self::default()
            }
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Exact-key lookup
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Case-insensitive lookup. An exact key wins over other spellings;
    /// otherwise the first match in key order is used.
    pub fn get_ignore_case(&self, name: &str) -> Option<f64> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<BTreeMap<String, Value>> for CandidateMetrics {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let mut values = BTreeMap::new();
        for (name, value) in raw {
            match value.as_f64() {
                Some(number) => {
                    values.insert(name, number);
                }
                None => {
                    log::warn!("Dropping non-numeric metric '{}' ({})", name, kind_of(&value));
                }
            }
        }
        Self { values }
    }
}

impl From<CandidateMetrics> for BTreeMap<String, f64> {
    fn from(metrics: CandidateMetrics) -> Self {
        metrics.values
    }
}

/// Outcome of checking one candidate against the primary metric threshold.
/// Carries the value and threshold that produced it for auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    passed: bool,
    metric: String,
    value: f64,
    threshold: f64,
}

impl ValidationVerdict {
    pub fn new(passed: bool, metric: impl Into<String>, value: f64, threshold: f64) -> Self {
        Self {
            passed,
            metric: metric.into(),
            value,
            threshold,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "{} {} >= threshold {} -> PASS", self.metric, self.value, self.threshold)
        } else {
            write!(f, "{} {} < threshold {} -> FAIL", self.metric, self.value, self.threshold)
        }
    }
}

/// Approval status as reported by the model registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Map a raw registry value. Only the two terminal values are
    /// recognised; everything else is still pending.
    pub fn from_registry_value(raw: &str) -> Self {
        match raw {
            "Approved" => Self::Approved,
            "Rejected" => Self::Rejected,
            "PendingManualApproval" => Self::Pending,
            other => {
                log::debug!("Unrecognised approval status '{}', treating as pending", other);
                Self::Pending
            }
        }
    }

    pub fn as_registry_value(&self) -> &'static str {
        match self {
            Self::Pending => "PendingManualApproval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_registry_value())
    }
}

/// Terminal result of waiting for a human decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
    /// No decision before the deadline. Not stored in the registry.
    TimedOut,
}

impl Decision {
    /// The decision a registry status resolves to, if it is terminal
    pub fn from_status(status: ApprovalStatus) -> Option<Self> {
        match status {
            ApprovalStatus::Approved => Some(Self::Approved),
            ApprovalStatus::Rejected => Some(Self::Rejected),
            ApprovalStatus::Pending => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::Rejected => f.write_str("rejected"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// A finished training job and the artifact it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub training_job: String,
    pub artifact_ref: String,
}

impl TrainingRun {
    pub fn new(training_job: impl Into<String>, artifact_ref: impl Into<String>) -> Result<Self, TypesError> {
        let training_job = training_job.into();
        let artifact_ref = artifact_ref.into();

        if training_job.trim().is_empty() {
            return Err(TypesError::EmptyField("training_job"));
        }
        if !artifact_ref.contains('/') {
            return Err(TypesError::InvalidArtifactRef(artifact_ref));
        }

        Ok(Self {
            training_job,
            artifact_ref,
        })
    }

    /// Training writes `evaluation.json` next to the model artifact
    pub fn evaluation_ref(&self) -> String {
        let prefix = self
            .artifact_ref
            .rsplit_once('/')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.artifact_ref);
        format!("{}/evaluation.json", prefix)
    }
}

/// Output of a drift detection job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub drift_score: f64,
}

/// What the promoter did with an approved candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionResult {
    Promoted { detail: String },
    Deferred { reason: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Artifact reference '{0}' has no path component")]
    InvalidArtifactRef(String),
}
