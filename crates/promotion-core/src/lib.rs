//! Candidate promotion core library
//!
//! Evaluates trained model candidates, registers the ones that pass, and
//! waits for a human reviewer to approve or reject them.

pub mod config;
pub mod clients;
pub mod evaluator;
pub mod workflow;
pub mod error;
pub mod paths;

// Re-export main types for easy access
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use evaluator::{CandidateEvaluator, DriftGate};

// Re-export client types
pub use clients::{
    FileMetricsSource,
    FileRegistry,
    FileReportStore,
    LogNotifier,
    TelegramNotifier,
};

// Re-export workflow types
pub use workflow::{
    ApprovalTicket,
    ApprovalWatcher,
    CandidateReport,
    Collaborators,
    DeferredPromoter,
    PipelineOrchestrator,
    PipelineOutcome,
    TicketRef,
};

// Shared data types
pub use promotion_types::{
    ApprovalStatus,
    CandidateMetrics,
    Decision,
    DriftReport,
    PromotionResult,
    TrainingRun,
    ValidationVerdict,
};
