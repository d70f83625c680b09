//! Job summary delivery.
//!
//! Delivery is best effort: failures are logged and returned as a
//! [`ReportOutcome`], never propagated into the job result.

mod summary;
mod telegram;

pub use summary::render_summary;
pub use telegram::TelegramNotifier;

use crate::config::AppConfig;
use crate::models::JobResult;
use crate::utils::NotifyError;
use async_trait::async_trait;
use std::sync::Arc;

/// A channel that can deliver a rendered summary.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The job produced no records
    NothingToReport,
    /// No notification channel is configured
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Sent,
    Skipped(SkipReason),
    Failed(String),
}

pub struct NotificationReporter {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationReporter {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, NotifyError> {
        let notifier = match &config.telegram {
            Some(telegram) => Some(Arc::new(TelegramNotifier::new(telegram)?) as Arc<dyn Notifier>),
            None => None,
        };
        Ok(Self::new(notifier))
    }

    pub async fn report(&self, result: &JobResult) -> ReportOutcome {
        if result.is_empty() {
            return ReportOutcome::Skipped(SkipReason::NothingToReport);
        }
        let Some(notifier) = &self.notifier else {
            tracing::info!("Notification channel not configured, skipping notification");
            return ReportOutcome::Skipped(SkipReason::NotConfigured);
        };

        let text = render_summary(result);
        match notifier.send(&text).await {
            Ok(()) => {
                tracing::info!(job_id = %result.job_id, "Notification sent");
                ReportOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(job_id = %result.job_id, error = %e, "Failed to send notification");
                ReportOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackupRecord, FailureKind, FailureRecord};
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Default)]
    struct CapturingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(NotifyError::Rejected {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
            Ok(())
        }
    }

    fn one_success() -> JobResult {
        let mut result = JobResult::empty(Uuid::new_v4());
        result.attempted = 1;
        result.successes.push(BackupRecord {
            address: "10.0.0.1".into(),
            identity: "r1".into(),
            filename: "r1_20240101_000000.conf".into(),
            size_bytes: 2048,
            duration: Duration::from_millis(1500),
            timestamp: "20240101_000000".into(),
        });
        result
    }

    #[tokio::test]
    async fn test_empty_result_is_not_reported() {
        let notifier = Arc::new(CapturingNotifier::default());
        let reporter = NotificationReporter::new(Some(notifier.clone()));

        let outcome = reporter.report(&JobResult::empty(Uuid::new_v4())).await;

        assert_eq!(outcome, ReportOutcome::Skipped(SkipReason::NothingToReport));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_skipped() {
        let reporter = NotificationReporter::new(None);
        let outcome = reporter.report(&one_success()).await;
        assert_eq!(outcome, ReportOutcome::Skipped(SkipReason::NotConfigured));
    }

    #[tokio::test]
    async fn test_success_is_reported() {
        let notifier = Arc::new(CapturingNotifier::default());
        let reporter = NotificationReporter::new(Some(notifier.clone()));

        assert_eq!(reporter.report(&one_success()).await, ReportOutcome::Sent);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("SUCCESS"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let notifier = Arc::new(CapturingNotifier {
            fail: true,
            ..Default::default()
        });
        let reporter = NotificationReporter::new(Some(notifier.clone()));

        let mut result = one_success();
        result.failures.push(FailureRecord {
            address: "10.0.0.2".into(),
            kind: FailureKind::Transport,
            error: "transport error: timed out".into(),
        });

        let outcome = reporter.report(&result).await;
        assert!(matches!(outcome, ReportOutcome::Failed(ref e) if e.contains("502")));
        assert_eq!(result.record_count(), 2);
    }
}
