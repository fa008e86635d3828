//! Approval workflow module

pub mod approval_types;
pub mod approval_watcher;
pub mod traits;
pub mod orchestrator;

pub use approval_types::*;
pub use approval_watcher::{await_decision, ApprovalWatcher};
pub use traits::{DeferredPromoter, MetricsSource, ModelRegistry, Notifier, Promoter, ReportSink};
pub use orchestrator::{Collaborators, PipelineOrchestrator};
