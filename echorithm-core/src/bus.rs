//! State-change bus: process-wide publish/subscribe for shared client state.
//!
//! Two named channels:
//! - **profile**: auth presence and cached profile changes
//! - **bookmarks**: `{article_url, new_state}` after a confirmed toggle
//!
//! Every view instance holds its own receiver. Sending never blocks; a
//! receiver that falls more than `capacity` events behind sees `Lagged` and
//! should re-read the store.

use tokio::sync::broadcast;

use crate::models::BookmarkChange;

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEvent {
    AuthChanged { authenticated: bool },
    ProfileUpdated,
}

#[derive(Debug, Clone)]
pub struct StateBus {
    profile: broadcast::Sender<ProfileEvent>,
    bookmarks: broadcast::Sender<BookmarkChange>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StateBus {
    pub fn new(capacity: usize) -> Self {
        let (profile, _) = broadcast::channel(capacity);
        let (bookmarks, _) = broadcast::channel(capacity);
        Self { profile, bookmarks }
    }

    /// Returns how many live subscribers saw the event.
    pub fn publish_profile(&self, event: ProfileEvent) -> usize {
        tracing::debug!(?event, "Publishing profile event");
        self.profile.send(event).unwrap_or(0)
    }

    pub fn publish_bookmark(&self, change: BookmarkChange) -> usize {
        tracing::debug!(url = %change.article_url, new_state = change.new_state, "Publishing bookmark change");
        self.bookmarks.send(change).unwrap_or(0)
    }

    pub fn subscribe_profile(&self) -> broadcast::Receiver<ProfileEvent> {
        self.profile.subscribe()
    }

    pub fn subscribe_bookmarks(&self) -> broadcast::Receiver<BookmarkChange> {
        self.bookmarks.subscribe()
    }
}
