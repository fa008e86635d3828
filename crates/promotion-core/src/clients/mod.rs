//! Adapters for the external collaborators

pub mod file_registry;
pub mod log_notifier;
pub mod metrics_source;
pub mod report_store;
pub mod telegram;

// Re-export all client types
pub use file_registry::{FileRegistry, RegistryRecord};
pub use log_notifier::LogNotifier;
pub use metrics_source::FileMetricsSource;
pub use report_store::FileReportStore;
pub use telegram::TelegramNotifier;
