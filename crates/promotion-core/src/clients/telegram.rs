//! Telegram client for sending approval notifications

use crate::config::TelegramConfig;
use crate::error::{PipelineError, Result};
use crate::workflow::approval_types::TicketRef;
use crate::workflow::traits::Notifier;
use async_trait::async_trait;
use promotion_types::CandidateMetrics;
use reqwest::Client as HttpClient;
use serde_json::json;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    http_client: HttpClient,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            bot_token: config.bot_token,
            chat_id: config.chat_id,
            api_base: TELEGRAM_API_BASE.to_string(),
            http_client,
        })
    }

    /// Point the client at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Escape special characters for Telegram HTML parse mode
    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    /// HTML message body for an approval request
    fn approval_message(ticket_ref: &TicketRef, metrics: &CandidateMetrics, report_ref: &str) -> String {
        let metric_lines = if metrics.is_empty() {
            "  (none)".to_string()
        } else {
            metrics
                .iter()
                .map(|(name, value)| format!("  • {}: {}", Self::escape_html(name), value))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "🧪 <b>Model Approval Request</b>\n\n\
            A new candidate model is ready for manual approval.\n\n\
            <b>Model package:</b> {}\n\
            <b>Evaluation metrics:</b>\n{}\n\n\
            <b>Report:</b> {}",
            Self::escape_html(ticket_ref.as_str()),
            metric_lines,
            Self::escape_html(report_ref)
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// Send the approval request. Fire-and-forget from the pipeline's point
    /// of view, but a rejected request is reported as an error.
    async fn notify(&self, ticket_ref: &TicketRef, metrics: &CandidateMetrics, report_ref: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let payload = json!({
            "chat_id": self.chat_id,
            "text": Self::approval_message(ticket_ref, metrics, report_ref),
            "parse_mode": "HTML"
        });

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::unavailable("notifier", format!("Telegram request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::unavailable(
                "notifier",
                format!("Telegram API error: {}", error_text),
            ));
        }

        log::info!("Telegram approval message sent for ticket: {}", ticket_ref);
        Ok(())
    }
}
