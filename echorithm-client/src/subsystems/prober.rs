//! Embeddability prober.
//!
//! Decides, within a bounded wait, whether third-party content rendered in a
//! sandboxed frame is visible. When it is not, the URL is handed to an
//! [`ExternalOpener`] so the reader is never left looking at a blank frame.
//!
//! ```text
//! Idle ──open──▶ Loading ──inspectable, non-empty──────▶ Succeeded
//!                   │     ──cross-origin isolated*─────▶ Succeeded
//!                   │     ──error / timeout / escape───▶ Blocked (+ open externally)
//! ```
//! `*` when `prober.cross_origin_is_success` is set (the default).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use echorithm_core::config::ProberConfig;
use echorithm_core::ClientError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Loading,
    Succeeded,
    Blocked,
}

impl ProbeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProbeState::Succeeded | ProbeState::Blocked)
    }
}

/// What the frame reported once it finished loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameContent {
    /// Same-origin or otherwise readable; carries the rendered text.
    Inspectable(String),
    /// The runtime refused introspection. Content may well be rendering.
    CrossOriginIsolated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSignal {
    Loaded(FrameContent),
    Error,
}

/// Opens a URL in a new top-level context (browser tab, system handler, ...).
pub trait ExternalOpener: Send + Sync {
    fn open_external(&self, url: &str) -> Result<(), ClientError>;
}

pub struct EmbeddabilityProber {
    config: ProberConfig,
    opener: Arc<dyn ExternalOpener>,
}

impl EmbeddabilityProber {
    pub fn new(config: ProberConfig, opener: Arc<dyn ExternalOpener>) -> Self {
        Self { config, opener }
    }

    /// Start probing `url`: enter `Loading` and arm the bounded wait.
    pub fn open(&self, url: &str) -> Probe {
        let (state_tx, state_rx) = watch::channel(ProbeState::Idle);
        let inner = Arc::new(ProbeInner {
            url: url.to_string(),
            state: state_tx,
            decided: AtomicBool::new(false),
            cross_origin_is_success: self.config.cross_origin_is_success,
            opener: self.opener.clone(),
            cancel: CancellationToken::new(),
        });

        inner.state.send_replace(ProbeState::Loading);
        tracing::debug!(url = %url, timeout_ms = self.config.timeout_ms, "Probing embeddability");

        let timer = spawn_timeout(inner.clone(), self.config.timeout());
        Probe {
            inner,
            state: state_rx,
            timer,
        }
    }
}

/// One open of one URL. Dropping it cancels a pending wait.
pub struct Probe {
    inner: Arc<ProbeInner>,
    state: watch::Receiver<ProbeState>,
    timer: JoinHandle<()>,
}

impl Probe {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ProbeState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ProbeState> {
        self.state.clone()
    }

    /// Feed a frame signal. Returns whether it decided the outcome; signals
    /// after the first decision are ignored.
    pub fn signal(&self, signal: FrameSignal) -> bool {
        let outcome = match signal {
            FrameSignal::Loaded(FrameContent::Inspectable(content)) if !content.trim().is_empty() => {
                ProbeState::Succeeded
            }
            FrameSignal::Loaded(FrameContent::Inspectable(_)) => ProbeState::Blocked,
            FrameSignal::Loaded(FrameContent::CrossOriginIsolated) if self.inner.cross_origin_is_success => {
                ProbeState::Succeeded
            }
            FrameSignal::Loaded(FrameContent::CrossOriginIsolated) | FrameSignal::Error => {
                ProbeState::Blocked
            }
        };
        self.inner.decide(outcome, "frame signal")
    }

    /// "Can't see the article": force `Blocked` while still loading.
    pub fn escape(&self) -> bool {
        self.inner.decide(ProbeState::Blocked, "manual escape")
    }

    /// Stop waiting without deciding. Used when the reader closes mid-load.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Resolve once the probe leaves `Loading`. Returns the terminal state, or
    /// `Loading` if the probe was cancelled first.
    pub async fn settled(&self) -> ProbeState {
        let mut rx = self.state.clone();
        loop {
            let current = *rx.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return *rx.borrow(),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return *rx.borrow();
                    }
                }
            }
        }
    }

    /// Turn a `Blocked` outcome into an error for callers that must embed.
    pub fn require_embedded(&self) -> Result<(), ClientError> {
        match self.state() {
            ProbeState::Blocked => Err(ClientError::EmbeddingBlocked(self.inner.url.clone())),
            _ => Ok(()),
        }
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        self.timer.abort();
    }
}

struct ProbeInner {
    url: String,
    state: watch::Sender<ProbeState>,
    decided: AtomicBool,
    cross_origin_is_success: bool,
    opener: Arc<dyn ExternalOpener>,
    cancel: CancellationToken,
}

impl ProbeInner {
    fn decide(&self, outcome: ProbeState, cause: &'static str) -> bool {
        if self.cancel.is_cancelled() && !self.decided.load(Ordering::Acquire) {
            // Cancelled while loading: the reader is gone.
            return false;
        }
        if self
            .decided
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(url = %self.url, cause, "Probe already decided, ignoring");
            return false;
        }

        self.state.send_replace(outcome);
        self.cancel.cancel();

        if outcome == ProbeState::Blocked {
            tracing::info!(url = %self.url, cause, "Embedding blocked, opening externally");
            if let Err(e) = self.opener.open_external(&self.url) {
                tracing::warn!(url = %self.url, error = %e, "Failed to open external view");
            }
        } else {
            tracing::debug!(url = %self.url, cause, "Embedding succeeded");
        }
        true
    }
}

fn spawn_timeout(inner: Arc<ProbeInner>, wait: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = inner.cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {
                inner.decide(ProbeState::Blocked, "timeout");
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
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl ExternalOpener for RecordingOpener {
        fn open_external(&self, url: &str) -> Result<(), ClientError> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn prober(opener: Arc<RecordingOpener>) -> EmbeddabilityProber {
        EmbeddabilityProber::new(ProberConfig::default(), opener)
    }

    const URL: &str = "https://news.test/a";

    #[tokio::test(start_paused = true)]
    async fn test_inspectable_content_succeeds() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);
        assert_eq!(probe.state(), ProbeState::Loading);

        assert!(probe.signal(FrameSignal::Loaded(FrameContent::Inspectable("<p>story</p>".into()))));
        assert_eq!(probe.state(), ProbeState::Succeeded);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(probe.state(), ProbeState::Succeeded, "timeout no longer applies");
        assert!(opener.opened.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_origin_isolation_is_not_blocked() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        probe.signal(FrameSignal::Loaded(FrameContent::CrossOriginIsolated));
        assert_eq!(probe.settled().await, ProbeState::Succeeded);
        assert!(opener.opened.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_origin_policy_is_tunable() {
        let opener = Arc::new(RecordingOpener::default());
        let strict = EmbeddabilityProber::new(
            ProberConfig {
                cross_origin_is_success: false,
                ..ProberConfig::default()
            },
            opener.clone(),
        );
        let probe = strict.open(URL);

        probe.signal(FrameSignal::Loaded(FrameContent::CrossOriginIsolated));
        assert_eq!(probe.state(), ProbeState::Blocked);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_content_is_blocked() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        probe.signal(FrameSignal::Loaded(FrameContent::Inspectable("   ".into())));
        assert_eq!(probe.state(), ProbeState::Blocked);
        assert!(matches!(probe.require_embedded(), Err(ClientError::EmbeddingBlocked(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_blocks_and_opens_once() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        assert_eq!(probe.settled().await, ProbeState::Blocked);
        assert!(!probe.signal(FrameSignal::Error), "late error is ignored");
        assert!(!probe.escape());
        assert_eq!(*opener.opened.lock().unwrap(), vec![URL.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_signal_wins() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        assert!(probe.signal(FrameSignal::Error));
        assert!(!probe.signal(FrameSignal::Loaded(FrameContent::Inspectable("late".into()))));
        assert_eq!(probe.state(), ProbeState::Blocked);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_forces_blocked() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(probe.escape());
        assert_eq!(probe.state(), ProbeState::Blocked);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_loading_has_no_side_effects() {
        let opener = Arc::new(RecordingOpener::default());
        let probe = prober(opener.clone()).open(URL);

        probe.cancel();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(probe.settled().await, ProbeState::Loading);
        assert!(!probe.signal(FrameSignal::Error));
        assert!(opener.opened.lock().unwrap().is_empty());
    }
}
