//! Reading-session tracker.
//!
//! Opens one session per article view, reports the start immediately, keeps a
//! per-second elapsed counter for display, and reports the final reading time
//! exactly once no matter how many close triggers fire.

use std::time::Duration;

use chrono::Utc;
use echorithm_core::config::TrackerConfig;
use echorithm_core::models::{ArticleView, Session, ViewReport};
use echorithm_core::ClientError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::telemetry::Telemetry;

/// An open session. Dropping the handle stops its ticker; it does not report.
pub struct SessionHandle {
    session: Session,
    started: Instant,
    elapsed: watch::Receiver<u64>,
    ticker: CancellationToken,
    start_report: Option<JoinHandle<()>>,
    finalized: bool,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whole seconds since the session opened, updated once per tick.
    pub fn elapsed_watch(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    pub fn is_ticking(&self) -> bool {
        !self.ticker.is_cancelled()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.ticker.cancel();
    }
}

pub struct SessionTracker {
    telemetry: Telemetry,
    config: TrackerConfig,
}

impl SessionTracker {
    pub fn new(telemetry: Telemetry, config: TrackerConfig) -> Self {
        Self { telemetry, config }
    }

    /// Open a session, fire the view and start reports, start the ticker.
    pub fn start_session(&self, article: &ArticleView) -> Result<SessionHandle, ClientError> {
        if !article.has_url() {
            return Err(ClientError::InvalidArticle("article has no url".to_string()));
        }

        let session = Session::open(article, Utc::now());
        let started = Instant::now();

        self.telemetry.spawn_view(ViewReport::from(article));
        let start_report = self.telemetry.spawn_session(session.report());

        let (tx, rx) = watch::channel(0u64);
        let ticker = CancellationToken::new();
        spawn_ticker(
            started,
            Duration::from_millis(self.config.tick_interval_ms.max(1)),
            tx,
            ticker.clone(),
        );

        tracing::info!(
            session_id = %session.session_id,
            url = %session.article_url,
            "Reading session started"
        );

        Ok(SessionHandle {
            session,
            started,
            elapsed: rx,
            ticker,
            start_report: Some(start_report),
            finalized: false,
        })
    }

    /// Current elapsed whole seconds for `handle`.
    pub fn tick(&self, handle: &SessionHandle) -> u64 {
        handle.started.elapsed().as_secs()
    }

    /// Close the session and report its final reading time. Only the first
    /// call for a session reports; later calls return `None`.
    pub async fn finalize_session(&self, handle: &mut SessionHandle) -> Option<Session> {
        handle.ticker.cancel();

        if handle.finalized {
            tracing::debug!(session_id = %handle.session.session_id, "Session already finalized");
            return None;
        }
        handle.finalized = true;

        let reading_time_seconds = handle.started.elapsed().as_secs();
        let session = Session {
            reading_time_seconds,
            completed: reading_time_seconds > self.config.completion_threshold_seconds,
            ..handle.session.clone()
        };

        // The start report must land before the final one.
        if let Some(start_report) = handle.start_report.take() {
            let _ = start_report.await;
        }
        self.telemetry.deliver_session(&session.report()).await;

        tracing::info!(
            session_id = %session.session_id,
            reading_time = reading_time_seconds,
            completed = session.completed,
            "Reading session finalized"
        );
        Some(session)
    }
}

fn spawn_ticker(
    started: Instant,
    every: Duration,
    tx: watch::Sender<u64>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if tx.send(started.elapsed().as_secs()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeBackend};
    use echorithm_core::config::TelemetryConfig;
    use std::sync::Arc;

    fn tracker(backend: Arc<FakeBackend>) -> SessionTracker {
        SessionTracker::new(
            Telemetry::new(backend, TelemetryConfig::default()),
            TrackerConfig::default(),
        )
    }

    fn article() -> ArticleView {
        ArticleView::new("https://news.test/a", "Headline", "Tech")
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reports_view_and_zero_length_session() {
        let backend = Arc::new(FakeBackend::new());
        let tracker = tracker(backend.clone());

        let mut handle = tracker.start_session(&article()).unwrap();
        tracker.finalize_session(&mut handle).await;

        let reports = backend.session_reports();
        assert_eq!(backend.count(|c| matches!(c, Call::View(_))), 1);
        assert_eq!(reports[0].reading_time, 0);
        assert!(!reports[0].completed);
        assert_eq!(reports[0].session_id, handle.session_id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_threshold_is_strict() {
        let backend = Arc::new(FakeBackend::new());
        let tracker = tracker(backend.clone());

        let mut exactly = tracker.start_session(&article()).unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let session = tracker.finalize_session(&mut exactly).await.unwrap();
        assert_eq!(session.reading_time_seconds, 30);
        assert!(!session.completed, "30s is not more than 30s");

        let mut longer = tracker.start_session(&article()).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        let session = tracker.finalize_session(&mut longer).await.unwrap();
        assert!(session.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let tracker = tracker(backend.clone());

        let mut handle = tracker.start_session(&article()).unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(tracker.finalize_session(&mut handle).await.is_some());
        assert!(handle.is_finalized());
        assert!(tracker.finalize_session(&mut handle).await.is_none());
        assert_eq!(
            backend.session_reports().len(),
            2,
            "one start report and exactly one final report"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_report_precedes_final_report() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_delay(Duration::from_millis(200));
        let tracker = tracker(backend.clone());

        let mut handle = tracker.start_session(&article()).unwrap();
        tracker.finalize_session(&mut handle).await;

        let reports = backend.session_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].session_id, reports[1].session_id);
        assert!(reports[0].timestamp <= reports[1].timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_publishes_elapsed_and_stops_on_finalize() {
        let backend = Arc::new(FakeBackend::new());
        let tracker = tracker(backend);

        let mut handle = tracker.start_session(&article()).unwrap();
        let mut elapsed = handle.elapsed_watch();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        elapsed.changed().await.ok();
        assert_eq!(*elapsed.borrow(), 3);
        assert_eq!(tracker.tick(&handle), 3);

        tracker.finalize_session(&mut handle).await;
        assert!(!handle.is_ticking());
    }

    #[tokio::test]
    async fn test_article_without_url_is_rejected() {
        let backend = Arc::new(FakeBackend::new());
        let tracker = tracker(backend.clone());

        let err = tracker
            .start_session(&ArticleView::new("  ", "No link", "Tech"))
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::InvalidArticle(_)));
        assert!(backend.calls().is_empty(), "nothing reported for a rejected article");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_does_not_break_finalize() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_with(|| ClientError::Network("offline".into()));
        let tracker = tracker(backend);

        let mut handle = tracker.start_session(&article()).unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        let session = tracker.finalize_session(&mut handle).await.unwrap();
        assert!(session.completed);
    }
}
