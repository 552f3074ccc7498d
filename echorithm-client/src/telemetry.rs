//! Fire-and-forget delivery of engagement reports.
//!
//! Telemetry must never break navigation: every failure is logged and
//! swallowed. By default each report gets exactly one attempt; a deployment
//! that wants at-least-once-ish delivery can raise `telemetry.max_retries`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use echorithm_core::config::TelemetryConfig;
use echorithm_core::models::{SessionReport, ViewReport};
use echorithm_core::{ClientError, NewsBackend};
use tokio::task::JoinHandle;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Clone)]
pub struct Telemetry {
    backend: Arc<dyn NewsBackend>,
    config: TelemetryConfig,
}

impl Telemetry {
    pub fn new(backend: Arc<dyn NewsBackend>, config: TelemetryConfig) -> Self {
        Self { backend, config }
    }

    pub fn spawn_view(&self, report: ViewReport) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            deliver(&config, "article_view", || backend.track_article_view(&report)).await;
        })
    }

    pub fn spawn_session(&self, report: SessionReport) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.deliver_session(&report).await;
        })
    }

    pub fn spawn_search(&self, query: String, results_count: usize) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            deliver(&config, "search_query", || {
                backend.track_search_query(&query, results_count)
            })
            .await;
        })
    }

    /// Send a session report and wait for the outcome. Never fails; returns
    /// whether the backend accepted it.
    pub async fn deliver_session(&self, report: &SessionReport) -> bool {
        deliver(&self.config, "reading_session", || {
            self.backend.track_reading_session(report)
        })
        .await
    }
}

/// Client-side rejections will not get better on a second try.
fn is_retryable(e: &ClientError) -> bool {
    match e {
        ClientError::Network(_) => true,
        ClientError::BackendRejected { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

async fn deliver<F, Fut>(config: &TelemetryConfig, what: &'static str, mut action: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ClientError>>,
{
    let result = if config.max_retries == 0 {
        action().await
    } else {
        let strategy = ExponentialBackoff::from_millis(config.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(config.max_retries);
        RetryIf::spawn(strategy, &mut action, is_retryable).await
    };

    match result {
        Ok(()) => {
            tracing::debug!(report = what, "Telemetry delivered");
            true
        }
        Err(ClientError::Unauthenticated) => {
            tracing::debug!(report = what, "Telemetry skipped, not signed in");
            false
        }
        Err(e) => {
            tracing::warn!(report = what, error = %e, "Telemetry delivery failed, dropping report");
            false
        }
    }
}
