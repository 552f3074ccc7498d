//! Bookmark synchronizer: the only writer of bookmark truth.
//!
//! Toggles are confirm-then-update. Local state changes only after the backend
//! accepts the add/remove, and the confirmed state is then published on the
//! bookmark channel so every view rendering that article converges. Toggles
//! for one URL never overlap; a second one while the first is in flight is
//! rejected with `ToggleInFlight`. Batch refreshes publish every flag whose
//! cached value they change, so open views track reconciled state too.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use echorithm_core::models::{ArticleView, BookmarkChange, BookmarkEntry};
use echorithm_core::{ClientError, ClientState, NewsBackend};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub struct BookmarkSynchronizer {
    backend: Arc<dyn NewsBackend>,
    state: Arc<ClientState>,
    in_flight: Mutex<HashSet<String>>,
}

impl BookmarkSynchronizer {
    pub fn new(backend: Arc<dyn NewsBackend>, state: Arc<ClientState>) -> Self {
        Self {
            backend,
            state,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Cached flag; `false` when nothing is known.
    pub fn is_bookmarked(&self, url: &str) -> bool {
        self.state.bookmark_flag(url).unwrap_or(false)
    }

    pub fn is_toggling(&self, url: &str) -> bool {
        self.lock_in_flight().contains(url)
    }

    /// Fetch the status of a batch of visible URLs, cache it and publish the
    /// flags that changed. Anonymous users get `false` for everything without
    /// a request.
    pub async fn refresh(&self, urls: &[String]) -> Result<HashMap<String, bool>, ClientError> {
        if !self.state.is_authenticated() || urls.is_empty() {
            return Ok(urls.iter().map(|u| (u.clone(), false)).collect());
        }

        let known = self.backend.bookmark_status(urls).await?;
        let mut flags = HashMap::with_capacity(urls.len());
        for url in urls {
            let flag = known.get(url).copied().unwrap_or(false);
            let previous = self.commit(url, flag);
            if previous != flag {
                self.publish(url, flag);
            }
            flags.insert(url.clone(), flag);
        }

        tracing::debug!(count = urls.len(), "Bookmark status refreshed");
        Ok(flags)
    }

    /// Flip the bookmark for `article` and return the confirmed new state.
    pub async fn toggle(&self, article: &ArticleView) -> Result<bool, ClientError> {
        if !article.has_url() {
            return Err(ClientError::InvalidArticle("article has no url".to_string()));
        }
        if !self.state.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }

        let _guard = InFlight::acquire(&self.in_flight, &article.url)?;
        let current = self.is_bookmarked(&article.url);

        let result = if current {
            self.backend.remove_bookmark(&article.url).await
        } else {
            self.backend.add_bookmark(article).await
        };

        if let Err(e) = result {
            tracing::warn!(url = %article.url, error = %e, "Bookmark toggle failed, keeping previous state");
            return Err(e);
        }

        // The backend has the new state now; views follow it even if the
        // local cache could not be written.
        let new_state = !current;
        self.commit(&article.url, new_state);
        self.publish(&article.url, new_state);

        tracing::info!(url = %article.url, bookmarked = new_state, "Bookmark toggled");
        Ok(new_state)
    }

    /// Saved articles, newest first as the backend orders them. Marks each as
    /// bookmarked in the cache.
    pub async fn list(&self) -> Result<Vec<BookmarkEntry>, ClientError> {
        if !self.state.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }

        let entries = self.backend.list_bookmarks().await?;
        for entry in &entries {
            if entry.article.has_url() && !self.commit(&entry.article.url, true) {
                self.publish(&entry.article.url, true);
            }
        }
        Ok(entries)
    }

    /// Cache a confirmed flag, returning the previously cached one. A failed
    /// write is logged and leaves the cache behind the backend until the next
    /// refresh.
    fn commit(&self, url: &str, state: bool) -> bool {
        let previous = self.is_bookmarked(url);
        if let Err(e) = self.state.cache_bookmark_flag(url, state) {
            tracing::warn!(url, error = %e, "Failed to cache bookmark flag");
        }
        previous
    }

    fn publish(&self, url: &str, new_state: bool) {
        self.state.bus().publish_bookmark(BookmarkChange {
            article_url: url.to_string(),
            new_state,
        });
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks a URL as toggling for as long as it lives.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    url: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, url: &str) -> Result<Self, ClientError> {
        let mut urls = set.lock().unwrap_or_else(|e| e.into_inner());
        if !urls.insert(url.to_string()) {
            return Err(ClientError::ToggleInFlight(url.to_string()));
        }
        Ok(Self {
            set,
            url: url.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.url);
    }
}

// ============================================================================
// BookmarkView
// ============================================================================

/// A reader of bookmark truth: a feed card, the bookmarks page, ... Seeds from
/// the cache and then follows the bus; never calls the backend.
pub struct BookmarkView {
    state: Arc<ClientState>,
    flags: HashMap<String, bool>,
    changes: broadcast::Receiver<BookmarkChange>,
}

impl BookmarkView {
    pub fn new(state: Arc<ClientState>) -> Self {
        let changes = state.bus().subscribe_bookmarks();
        let flags = state.bookmark_flags();
        Self {
            state,
            flags,
            changes,
        }
    }

    pub fn is_bookmarked(&self, url: &str) -> bool {
        self.flags.get(url).copied().unwrap_or(false)
    }

    /// Apply every change published since the last call. Returns how many
    /// were applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    self.apply(change);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Bookmark view lagged, reseeding from store");
                    self.flags = self.state.bookmark_flags();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Wait for the next change and apply it.
    pub async fn next_change(&mut self) -> Option<BookmarkChange> {
        loop {
            match self.changes.recv().await {
                Ok(change) => {
                    self.apply(change.clone());
                    return Some(change);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    self.flags = self.state.bookmark_flags();
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn apply(&mut self, change: BookmarkChange) {
        self.flags.insert(change.article_url, change.new_state);
    }
}

// ============================================================================
// TESTS
// ============================================================================
