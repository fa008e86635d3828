//! Candidate promotion pipeline executable
//!
//! Runs a trained candidate through evaluation, registration and human
//! approval, and gives the reviewer commands to decide pending tickets.

use anyhow::Context;
use clap::{Parser, Subcommand};
use promotion_core::{
    paths, workflow::approval_types::timestamp, ApprovalStatus, CandidateEvaluator, CandidateMetrics,
    Collaborators, DeferredPromoter, DriftGate, DriftReport, FileMetricsSource, FileRegistry, FileReportStore,
    LogNotifier, PipelineConfig, PipelineOrchestrator, TelegramNotifier, TicketRef, TrainingRun,
};
use promotion_core::workflow::traits::{ModelRegistry, Notifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Exit code of `evaluate` when the candidate fails validation
const EXIT_VALIDATION_FAILED: i32 = 2;
/// Exit code of `drift-check` when a retrain is required
const EXIT_RETRAIN_REQUIRED: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "promotion-pipeline", version, about = "Candidate model evaluation and approval pipeline")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE", default_value = "config/pipeline.json")]
    config: PathBuf,

    /// Data directory for the registry and reports
    #[arg(long, global = true, value_name = "DIR", default_value = "/data/promotion", env = "PROMOTION_DATA_DIR")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a trained candidate, register it and wait for approval
    Run {
        /// Model artifact reference; evaluation.json is read next to it
        #[arg(long, value_name = "REF")]
        artifact: String,

        /// Training job name, generated from the current time if omitted
        #[arg(long, value_name = "NAME")]
        training_job: Option<String>,
    },
    /// Check an evaluation metrics file against the threshold
    Evaluate {
        #[arg(long, value_name = "FILE")]
        metrics: PathBuf,
    },
    /// Decide from a drift report whether retraining is needed
    DriftCheck {
        #[arg(long, value_name = "FILE")]
        report: PathBuf,
    },
    /// Approve a pending ticket
    Approve { ticket: String },
    /// Reject a pending ticket
    Reject { ticket: String },
    /// Show the approval status of a ticket
    Status { ticket: String },
    /// List all registered tickets
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli {
        config,
        data_dir,
        command,
    } = Cli::parse();

    if let Err(e) = paths::init_data_root(data_dir.clone()) {
        log::warn!("Data root initialization warning: {}", e);
    }
    log::info!("Using data directory: {}", data_dir);

    let exit_code = match command {
        Commands::Run { artifact, training_job } => run_pipeline(&config, artifact, training_job).await?,
        Commands::Evaluate { metrics } => evaluate(&config, &metrics)?,
        Commands::DriftCheck { report } => drift_check(&config, &report)?,
        Commands::Approve { ticket } => decide(&ticket, ApprovalStatus::Approved)?,
        Commands::Reject { ticket } => decide(&ticket, ApprovalStatus::Rejected)?,
        Commands::Status { ticket } => status(&ticket).await?,
        Commands::List => list()?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    let config = PipelineConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn open_registry() -> anyhow::Result<FileRegistry> {
    let registry_dir = paths::registry_dir();
    let registry = FileRegistry::new(&registry_dir)
        .with_context(|| format!("Failed to open registry at {}", registry_dir.display()))?;
    log::debug!("Opened registry at {}", registry_dir.display());
    Ok(registry)
}

fn build_collaborators(config: &PipelineConfig) -> anyhow::Result<Collaborators> {
    for dir in paths::all_directories() {
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => {
            log::info!("Approval requests go to Telegram chat {}", telegram.chat_id);
            Arc::new(TelegramNotifier::new(telegram.clone())?)
        }
        None => {
            log::info!("No Telegram configuration, approval requests are only logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(Collaborators {
        metrics_source: Arc::new(FileMetricsSource::new()),
        registry: Arc::new(open_registry()?),
        report_sink: Arc::new(FileReportStore::new()),
        notifier,
        promoter: Arc::new(DeferredPromoter),
    })
}

async fn run_pipeline(config_path: &Path, artifact: String, training_job: Option<String>) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let training_job = training_job.unwrap_or_else(|| format!("loan-fraud-train-{}", timestamp()));
    let run = TrainingRun::new(training_job, artifact)?;

    let collaborators = build_collaborators(&config)?;
    let orchestrator = PipelineOrchestrator::new(config, collaborators);

    let outcome = orchestrator.run(&run).await?;
    println!("{}", outcome);
    Ok(0)
}

fn evaluate(config_path: &Path, metrics_path: &Path) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;

    let content = std::fs::read_to_string(metrics_path)
        .with_context(|| format!("Failed to read metrics from {}", metrics_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let metrics = CandidateMetrics::from_json_value(&value);

    let verdict = CandidateEvaluator::from_config(&config).evaluate(&metrics, config.min_metric);
    println!("{}", verdict);

    Ok(if verdict.passed() { 0 } else { EXIT_VALIDATION_FAILED })
}

fn drift_check(config_path: &Path, report_path: &Path) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;

    let content = std::fs::read_to_string(report_path)
        .with_context(|| format!("Failed to read drift report from {}", report_path.display()))?;
    let report: DriftReport = serde_json::from_str(&content)?;

    if DriftGate::from_config(&config).requires_retrain(&report) {
        println!(
            "Drift {} exceeds threshold {}: retrain required",
            report.drift_score, config.drift_threshold
        );
        Ok(EXIT_RETRAIN_REQUIRED)
    } else {
        println!(
            "Drift {} within threshold {}: no retrain",
            report.drift_score, config.drift_threshold
        );
        Ok(0)
    }
}

fn decide(ticket: &str, status: ApprovalStatus) -> anyhow::Result<i32> {
    let ticket_ref = TicketRef::from_string(ticket)?;
    let record = open_registry()?.set_status(&ticket_ref, status)?;
    println!("{} {}", record.ticket_ref, record.approval_status);
    Ok(0)
}

async fn status(ticket: &str) -> anyhow::Result<i32> {
    let ticket_ref = TicketRef::from_string(ticket)?;
    let status = open_registry()?.get_status(&ticket_ref).await?;
    println!("{} {}", ticket_ref, status);
    Ok(0)
}

fn list() -> anyhow::Result<i32> {
    let tickets = open_registry()?.list_tickets()?;
    if tickets.is_empty() {
        println!("No tickets registered");
    }

    for record in tickets {
        println!(
            "{}\t{}\t{}\t{}",
            record.ticket_ref,
            record.approval_status,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.artifact_ref
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["promotion-pipeline", "run", "--artifact", "s3://b/job/model.tar.gz"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("config/pipeline.json"));
        match cli.command {
            Commands::Run { artifact, training_job } => {
                assert_eq!(artifact, "s3://b/job/model.tar.gz");
                assert!(training_job.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "promotion-pipeline",
            "approve",
            "loan-fraud-models-20250101T000000Z-abcd1234",
            "--config",
            "/etc/pipeline.json",
            "--data-dir",
            "/tmp/promotion",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/pipeline.json"));
        assert_eq!(cli.data_dir, "/tmp/promotion");
        assert!(matches!(cli.command, Commands::Approve { ticket } if ticket.ends_with("abcd1234")));
    }

    #[test]
    fn test_run_requires_artifact() {
        assert!(Cli::try_parse_from(["promotion-pipeline", "run"]).is_err());
    }

    #[test]
    fn test_evaluate_exit_codes() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("pipeline.json");
        std::fs::write(&config, r#"{ "output_prefix": "/tmp/out/" }"#).unwrap();

        let passing = dir.path().join("pass.json");
        std::fs::write(&passing, r#"{ "auc": 0.78 }"#).unwrap();
        assert_eq!(evaluate(&config, &passing).unwrap(), 0);

        let failing = dir.path().join("fail.json");
        std::fs::write(&failing, r#"{ "precision": 0.99 }"#).unwrap();
        assert_eq!(evaluate(&config, &failing).unwrap(), EXIT_VALIDATION_FAILED);
    }

    #[test]
    fn test_drift_check_exit_codes() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("pipeline.json");
        std::fs::write(&config, r#"{ "output_prefix": "/tmp/out/" }"#).unwrap();

        let at_threshold = dir.path().join("drift-ok.json");
        std::fs::write(&at_threshold, r#"{ "drift_score": 0.1 }"#).unwrap();
        assert_eq!(drift_check(&config, &at_threshold).unwrap(), 0);

        let drifted = dir.path().join("drift.json");
        std::fs::write(&drifted, r#"{ "drift_score": 0.11 }"#).unwrap();
        assert_eq!(drift_check(&config, &drifted).unwrap(), EXIT_RETRAIN_REQUIRED);
    }
}
