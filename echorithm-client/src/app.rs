//! Wiring: one place that turns an `EchorithmConfig` into live subsystems
//! sharing a single client state service.

use std::sync::Arc;

use echorithm_core::models::{ArticleView, PersonalizedFeed, Preferences};
use echorithm_core::{
    ClientError, ClientState, EchorithmConfig, HttpBackend, KvStore, NewsBackend, StateBus,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::reader::ReaderView;
use crate::subsystems::analytics::AnalyticsAggregator;
use crate::subsystems::bookmarks::{BookmarkSynchronizer, BookmarkView};
use crate::subsystems::prober::{EmbeddabilityProber, ExternalOpener};
use crate::subsystems::reading_lists::ReadingLists;
use crate::subsystems::suggestions::SuggestionBox;
use crate::subsystems::tracker::SessionTracker;
use crate::telemetry::Telemetry;

pub struct Echorithm {
    pub config: EchorithmConfig,
    pub state: Arc<ClientState>,
    pub backend: Arc<dyn NewsBackend>,
    pub tracker: Arc<SessionTracker>,
    pub prober: EmbeddabilityProber,
    pub bookmarks: BookmarkSynchronizer,
    pub reading_lists: ReadingLists,
    pub analytics: AnalyticsAggregator,
    pub suggestions: SuggestionBox,
}

impl Echorithm {
    /// Open the configured store and talk HTTP to the configured backend.
    pub fn from_config(
        config: EchorithmConfig,
        opener: Arc<dyn ExternalOpener>,
    ) -> Result<Self, ClientError> {
        let store = KvStore::open(config.storage.resolved_path())?;
        let state = Arc::new(ClientState::new(store, StateBus::default()));
        let backend: Arc<dyn NewsBackend> =
            Arc::new(HttpBackend::new(&config.backend, state.clone())?);
        Ok(Self::with_backend(config, state, backend, opener))
    }

    pub fn with_backend(
        config: EchorithmConfig,
        state: Arc<ClientState>,
        backend: Arc<dyn NewsBackend>,
        opener: Arc<dyn ExternalOpener>,
    ) -> Self {
        let telemetry = Telemetry::new(backend.clone(), config.telemetry.clone());

        Self {
            tracker: Arc::new(SessionTracker::new(telemetry.clone(), config.tracker.clone())),
            prober: EmbeddabilityProber::new(config.prober.clone(), opener),
            bookmarks: BookmarkSynchronizer::new(backend.clone(), state.clone()),
            reading_lists: ReadingLists::new(backend.clone(), state.clone()),
            analytics: AnalyticsAggregator::new(backend.clone(), config.analytics.clone()),
            suggestions: SuggestionBox::new(
                backend.clone(),
                state.clone(),
                telemetry,
                config.suggestions.limit,
            ),
            config,
            state,
            backend,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Pass credentials through to the backend and keep the issued tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let credentials = self.backend.login(username, password).await?;
        self.state
            .set_credentials(&credentials.access, Some(&credentials.refresh))?;
        tracing::info!(username, "Signed in");
        Ok(())
    }

    /// Create an account; the backend signs it in straight away.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let credentials = self.backend.register(username, password).await?;
        self.state
            .set_credentials(&credentials.access, Some(&credentials.refresh))?;
        tracing::info!(username, "Registered and signed in");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token. Returns
    /// `false` when there is no refresh token to exchange.
    pub async fn refresh_session(&self) -> Result<bool, ClientError> {
        let Some(refresh) = self.state.refresh_token() else {
            return Ok(false);
        };

        let renewed = self.backend.refresh_access(&refresh).await?;
        let refresh = renewed.refresh.unwrap_or(refresh);
        self.state.set_credentials(&renewed.access, Some(&refresh))?;
        tracing::debug!("Access token renewed");
        Ok(true)
    }

    pub async fn preferences(&self) -> Result<Preferences, ClientError> {
        self.require_login()?;
        self.backend.preferences().await
    }

    /// Save feed categories and mirror them into the cached profile so other
    /// views pick them up from the profile channel.
    pub async fn save_preferences(&self, categories: &[String]) -> Result<(), ClientError> {
        self.require_login()?;
        self.backend.update_preferences(categories).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to save preferences");
            e
        })?;

        let mut profile = self
            .state
            .cached_profile()
            .filter(|p| p.is_object())
            .unwrap_or_else(|| serde_json::json!({}));
        profile["categories"] = serde_json::json!(categories);
        if let Err(e) = self.state.set_profile(&profile) {
            tracing::warn!(error = %e, "Failed to cache saved preferences");
        }

        tracing::info!(count = categories.len(), "Preferences saved");
        Ok(())
    }

    /// The "For You" feed. Gated: anonymous users are sent to sign in.
    pub async fn personalized_feed(&self) -> Result<PersonalizedFeed, ClientError> {
        self.require_login()?;
        self.backend.personalized_feed(self.config.feed.limit).await
    }

    fn require_login(&self) -> Result<(), ClientError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Unauthenticated)
        }
    }

    /// Returns whether there was anything to sign out of.
    pub fn logout(&self) -> Result<bool, ClientError> {
        Ok(self.state.clear_credentials()?)
    }

    /// Open a reader; `embed` renders the article in a probed frame.
    pub fn open_reader(&self, article: ArticleView, embed: bool) -> Result<ReaderView, ClientError> {
        let prober = embed.then_some(&self.prober);
        ReaderView::open(self.tracker.clone(), prober, article)
    }

    pub fn bookmark_view(&self) -> BookmarkView {
        BookmarkView::new(self.state.clone())
    }

    /// Follow writes other instances make to the shared store.
    pub fn spawn_storage_watcher(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.state
            .clone()
            .spawn_storage_watcher(self.config.storage.watch_interval(), cancel)
    }
}
