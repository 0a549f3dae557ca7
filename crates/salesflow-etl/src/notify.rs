//! Run alerts
//!
//! One alert is sent per run, on success and on failure. Delivery happens on
//! a detached task and its outcome is only logged; it never changes the
//! result of the run.

use crate::config::AlertConfig;
use crate::context::RunContext;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use salesflow_common::EtlError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Success,
    Failure,
}

/// Message delivered to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub subject: String,
    pub body: String,
    pub status: AlertStatus,
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub recipient: Option<String>,
}

impl Alert {
    pub fn new(ctx: &RunContext, status: AlertStatus, body: impl Into<String>) -> Self {
        let outcome = match status {
            AlertStatus::Success => "succeeded",
            AlertStatus::Failure => "FAILED",
        };
        Self {
            subject: format!("Sales ETL {} for {}", outcome, ctx.date_stamp()),
            body: body.into(),
            status,
            run_id: ctx.run_id,
            run_date: ctx.run_date,
            recipient: ctx.config.alert.recipient.clone(),
        }
    }

    /// Failure alert for a run that never got a valid configuration
    pub fn config_failure(run_date: NaiveDate, error: &EtlError) -> Self {
        Self {
            subject: format!("Sales ETL FAILED for {}", run_date.format("%Y-%m-%d")),
            body: error.to_string(),
            status: AlertStatus::Failure,
            run_id: Uuid::new_v4(),
            run_date,
            recipient: None,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Posts alerts as JSON to a mail gateway
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build alert HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        self.client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .with_context(|| format!("Failed to reach alert webhook {}", self.url))?
            .error_for_status()
            .context("Alert webhook rejected the alert")?;
        Ok(())
    }
}

/// Writes alerts to the log only
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        info!(
            subject = %alert.subject,
            status = ?alert.status,
            run_id = %alert.run_id,
            "{}",
            alert.body
        );
        Ok(())
    }
}

/// Webhook notifier when a URL is configured, log notifier otherwise.
///
/// A webhook client that cannot be built is logged and replaced by the log
/// notifier, so a run always has somewhere to report to.
pub fn notifier_from_config(config: &AlertConfig) -> Arc<dyn Notifier> {
    match config.webhook_url {
        Some(ref url) => match WebhookNotifier::new(url.clone()) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                error!(
                    error = %format!("{:#}", e),
                    "Alert webhook unavailable, alerts will only be logged"
                );
                Arc::new(LogNotifier)
            },
        },
        None => Arc::new(LogNotifier),
    }
}

/// Deliver `alert` on a detached task. Failures are logged, not returned.
pub fn dispatch_alert(notifier: Arc<dyn Notifier>, alert: Alert) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.notify(&alert).await {
            Ok(()) => {
                info!(subject = %alert.subject, run_id = %alert.run_id, "Alert delivered");
            },
            Err(e) => {
                error!(
                    error = %format!("{:#}", e),
                    subject = %alert.subject,
                    run_id = %alert.run_id,
                    "Failed to deliver alert"
                );
            },
        }
    })
}

/// Dispatch `alert` and wait at most `grace` for it.
///
/// Returns whether delivery finished in time. A late delivery is abandoned
/// when the runtime shuts down.
pub async fn deliver_within(notifier: Arc<dyn Notifier>, alert: Alert, grace: Duration) -> bool {
    let delivery = dispatch_alert(notifier, alert);
    match tokio::time::timeout(grace, delivery).await {
        Ok(_) => true,
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "Alert still pending, abandoning it");
            false
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::EtlConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> RunContext {
        let mut config = EtlConfig::default();
        config.alert.recipient = Some("ops@example.com".to_string());
        RunContext::new(config, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[test]
    fn test_alert_subject_and_payload() {
        let alert = Alert::new(&ctx(), AlertStatus::Failure, "Merge error: no data to merge");
        assert_eq!(alert.subject, "Sales ETL FAILED for 2024-01-02");

        let payload = serde_json::to_value(&alert).unwrap();
        assert_eq!(payload["status"], "failure");
        assert_eq!(payload["run_date"], "2024-01-02");
        assert_eq!(payload["recipient"], "ops@example.com");
    }

    #[tokio::test]
    async fn test_webhook_posts_json_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(body_partial_json(json!({
                "status": "success",
                "subject": "Sales ETL succeeded for 2024-01-02",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/alerts", server.uri())).unwrap();
        let alert = Alert::new(&ctx(), AlertStatus::Success, "6 rows merged");

        notifier.notify(&alert).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri()).unwrap();
        let alert = Alert::new(&ctx(), AlertStatus::Success, "ok");

        assert!(notifier.notify(&alert).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_swallows_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(server.uri()).unwrap());
        let handle = dispatch_alert(notifier, Alert::new(&ctx(), AlertStatus::Failure, "boom"));

        // The task completes normally even though delivery failed
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_without_webhook_alerts_are_logged() {
        let config = EtlConfig::default();
        let notifier = notifier_from_config(&config.alert);
        let alert = Alert::new(&ctx(), AlertStatus::Success, "ok");
        notifier.notify(&alert).await.unwrap();
    }

    /// Never finishes within any test's grace period
    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn notify(&self, _alert: &Alert) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_delivery_is_abandoned_after_grace() {
        let alert = Alert::new(&ctx(), AlertStatus::Success, "ok");
        let started = tokio::time::Instant::now();

        let delivered =
            deliver_within(Arc::new(StalledNotifier), alert, Duration::from_secs(10)).await;

        assert!(!delivered);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_delivery_finishes_within_grace() {
        let alert = Alert::new(&ctx(), AlertStatus::Success, "ok");
        assert!(deliver_within(Arc::new(LogNotifier), alert, Duration::from_secs(10)).await);
    }

    #[test]
    fn test_config_failure_alert() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = EtlError::Config("ETL_MERGE_SCOPE must be 'run' or 'directory'".to_string());

        let alert = Alert::config_failure(date, &err);

        assert_eq!(alert.status, AlertStatus::Failure);
        assert_eq!(alert.subject, "Sales ETL FAILED for 2024-01-02");
        assert!(alert.body.starts_with("Configuration error: "));
        assert_eq!(alert.recipient, None);
    }
}
