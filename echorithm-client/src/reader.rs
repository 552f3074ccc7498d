//! Reader view: one open article.
//!
//! Composes a tracked session with an optional embeddability probe. The
//! session clock keeps running whatever the probe decides; closing the view
//! cancels a pending probe and finalizes the session.

use std::sync::Arc;

use echorithm_core::format::format_duration;
use echorithm_core::models::{ArticleView, Session};
use echorithm_core::ClientError;

use crate::subsystems::prober::{EmbeddabilityProber, FrameSignal, Probe, ProbeState};
use crate::subsystems::tracker::{SessionHandle, SessionTracker};

pub struct ReaderView {
    article: ArticleView,
    tracker: Arc<SessionTracker>,
    handle: SessionHandle,
    probe: Option<Probe>,
}

impl ReaderView {
    /// Open `article`. With `prober`, the content is rendered in a frame and
    /// probed; without, the reader shows the summary only.
    pub fn open(
        tracker: Arc<SessionTracker>,
        prober: Option<&EmbeddabilityProber>,
        article: ArticleView,
    ) -> Result<Self, ClientError> {
        let handle = tracker.start_session(&article)?;
        let probe = prober.map(|p| p.open(&article.url));
        Ok(Self {
            article,
            tracker,
            handle,
            probe,
        })
    }

    pub fn article(&self) -> &ArticleView {
        &self.article
    }

    pub fn session_id(&self) -> &str {
        self.handle.session_id()
    }

    pub fn probe(&self) -> Option<&Probe> {
        self.probe.as_ref()
    }

    pub fn probe_state(&self) -> ProbeState {
        self.probe.as_ref().map_or(ProbeState::Idle, |p| p.state())
    }

    pub fn elapsed(&self) -> u64 {
        self.tracker.tick(&self.handle)
    }

    /// Live elapsed label for display, e.g. `1m`.
    pub fn elapsed_label(&self) -> String {
        format_duration(self.elapsed())
    }

    pub fn frame_signal(&self, signal: FrameSignal) -> bool {
        self.probe.as_ref().is_some_and(|p| p.signal(signal))
    }

    pub fn escape(&self) -> bool {
        self.probe.as_ref().is_some_and(|p| p.escape())
    }

    /// Close the reader. Safe to call more than once; only the first call
    /// returns the finalized session.
    pub async fn close(&mut self) -> Option<Session> {
        if let Some(probe) = &self.probe {
            probe.cancel();
        }
        self.tracker.finalize_session(&mut self.handle).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
