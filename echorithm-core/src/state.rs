//! Injected client state service.
//!
//! Owns the only two shared mutable resources (the key-value store and the
//! state-change bus). Built once at startup, handed to every component as an
//! `Arc<ClientState>`, never torn down. All mutations of shared state go
//! through here so that each one is paired with its bus notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{ProfileEvent, StateBus};
use crate::error::StoreError;
use crate::models::BookmarkChange;
use crate::store::{KvStore, StorageChange, ACCESS_KEY, BOOKMARK_PREFIX, PROFILE_KEY, REFRESH_KEY};

pub struct ClientState {
    store: KvStore,
    bus: StateBus,
}

impl ClientState {
    pub fn new(store: KvStore, bus: StateBus) -> Self {
        Self { store, bus }
    }

    /// In-memory store with a fresh bus.
    pub fn ephemeral() -> Self {
        Self::new(KvStore::in_memory(), StateBus::default())
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn bus(&self) -> &StateBus {
        &self.bus
    }

    // ------------------------------------------------------------------
    // Auth presence
    // ------------------------------------------------------------------

    pub fn is_authenticated(&self) -> bool {
        self.store.contains(ACCESS_KEY)
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_KEY)
    }

    pub fn set_credentials(&self, access: &str, refresh: Option<&str>) -> Result<(), StoreError> {
        self.store.set(ACCESS_KEY, access)?;
        if let Some(refresh) = refresh {
            self.store.set(REFRESH_KEY, refresh)?;
        }
        self.bus.publish_profile(ProfileEvent::AuthChanged { authenticated: true });
        Ok(())
    }

    /// Canonical logout: drop both credential keys and the cached profile.
    /// Returns whether the client was signed in.
    pub fn clear_credentials(&self) -> Result<bool, StoreError> {
        let had_access = self.store.remove(ACCESS_KEY)?.is_some();
        let had_refresh = self.store.remove(REFRESH_KEY)?.is_some();
        self.store.remove(PROFILE_KEY)?;

        let was_signed_in = had_access || had_refresh;
        if was_signed_in {
            tracing::info!("Credentials cleared");
            self.bus.publish_profile(ProfileEvent::AuthChanged { authenticated: false });
        }
        Ok(was_signed_in)
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    pub fn cached_profile(&self) -> Option<serde_json::Value> {
        let raw = self.store.get(PROFILE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "Cached profile is not valid JSON, ignoring");
                None
            }
        }
    }

    pub fn set_profile(&self, profile: &serde_json::Value) -> Result<(), StoreError> {
        self.store.set(PROFILE_KEY, &serde_json::to_string(profile)?)?;
        self.bus.publish_profile(ProfileEvent::ProfileUpdated);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bookmark flags
    // ------------------------------------------------------------------

    pub fn bookmark_flag(&self, url: &str) -> Option<bool> {
        self.store
            .get(&bookmark_key(url))
            .map(|v| v == "true")
    }

    pub fn bookmark_flags(&self) -> HashMap<String, bool> {
        self.store
            .entries_with_prefix(BOOKMARK_PREFIX)
            .into_iter()
            .map(|(k, v)| (k[BOOKMARK_PREFIX.len()..].to_string(), v == "true"))
            .collect()
    }

    /// Cache a flag without notifying. Only the bookmark synchronizer should
    /// publish bookmark truth.
    pub fn cache_bookmark_flag(&self, url: &str, state: bool) -> Result<(), StoreError> {
        self.store
            .set(&bookmark_key(url), if state { "true" } else { "false" })
    }

    // ------------------------------------------------------------------
    // Cross-instance propagation
    // ------------------------------------------------------------------

    /// Adopt whatever other instances wrote to the shared store and republish
    /// it on the bus. Returns the number of changed keys.
    pub fn sync_from_storage(&self) -> Result<usize, StoreError> {
        let changes = self.store.reload()?;
        if changes.is_empty() {
            return Ok(0);
        }

        tracing::debug!(changed = changes.len(), "Store changed underneath this instance");
        self.dispatch(&changes);
        Ok(changes.len())
    }

    fn dispatch(&self, changes: &[StorageChange]) {
        let mut auth_changed = false;
        let mut profile_changed = false;

        for change in changes {
            match change.key.as_str() {
                ACCESS_KEY | REFRESH_KEY => auth_changed = true,
                PROFILE_KEY => profile_changed = true,
                key if key.starts_with(BOOKMARK_PREFIX) => {
                    self.bus.publish_bookmark(BookmarkChange {
                        article_url: key[BOOKMARK_PREFIX.len()..].to_string(),
                        new_state: change.new_value.as_deref() == Some("true"),
                    });
                }
                _ => {}
            }
        }

        if auth_changed {
            self.bus.publish_profile(ProfileEvent::AuthChanged {
                authenticated: self.is_authenticated(),
            });
        }
        if profile_changed {
            self.bus.publish_profile(ProfileEvent::ProfileUpdated);
        }
    }

    /// Poll the shared store until `cancel` fires, republishing foreign changes.
    pub fn spawn_storage_watcher(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(interval_ms = every.as_millis() as u64, "Storage watcher started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sync_from_storage() {
                            tracing::warn!(error = %e, "Storage sync failed");
                        }
                    }
                }
            }

            tracing::debug!("Storage watcher stopped");
        })
    }
}

fn bookmark_key(url: &str) -> String {
    format!("{}{}", BOOKMARK_PREFIX, url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_pair() -> (tempfile::TempDir, ClientState, ClientState) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let a = ClientState::new(KvStore::open(&path).unwrap(), StateBus::default());
        let b = ClientState::new(KvStore::open(&path).unwrap(), StateBus::default());
        (dir, a, b)
    }

    #[test]
    fn test_credentials_drive_auth_presence() {
        let state = ClientState::ephemeral();
        let mut events = state.bus().subscribe_profile();
        assert!(!state.is_authenticated());

        state.set_credentials("acc", Some("ref")).unwrap();
        assert!(state.is_authenticated());
        assert_eq!(
            events.try_recv().unwrap(),
            ProfileEvent::AuthChanged { authenticated: true }
        );

        assert!(state.clear_credentials().unwrap());
        assert!(!state.is_authenticated());
        assert_eq!(state.refresh_token(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            ProfileEvent::AuthChanged { authenticated: false }
        );
    }

    #[test]
    fn test_logout_when_signed_out_publishes_nothing() {
        let state = ClientState::ephemeral();
        let mut events = state.bus().subscribe_profile();
        assert!(!state.clear_credentials().unwrap());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_logout_in_one_instance_reaches_the_other() {
        let (_dir, a, b) = shared_pair();
        a.set_credentials("acc", Some("ref")).unwrap();
        b.sync_from_storage().unwrap();
        assert!(b.is_authenticated());

        let mut b_events = b.bus().subscribe_profile();
        a.clear_credentials().unwrap();

        assert!(b.sync_from_storage().unwrap() > 0);
        assert!(!b.is_authenticated());
        assert_eq!(
            b_events.try_recv().unwrap(),
            ProfileEvent::AuthChanged { authenticated: false }
        );
        assert!(b_events.try_recv().is_err(), "one auth event per sync");
    }

    #[test]
    fn test_foreign_bookmark_flag_is_republished() {
        let (_dir, a, b) = shared_pair();
        let mut b_bookmarks = b.bus().subscribe_bookmarks();

        a.cache_bookmark_flag("https://news.test/a", true).unwrap();
        b.sync_from_storage().unwrap();

        assert_eq!(
            b_bookmarks.try_recv().unwrap(),
            BookmarkChange {
                article_url: "https://news.test/a".into(),
                new_state: true
            }
        );
        assert_eq!(b.bookmark_flag("https://news.test/a"), Some(true));
    }

    #[test]
    fn test_profile_roundtrip() {
        let state = ClientState::ephemeral();
        let profile = serde_json::json!({ "username": "reader", "categories": ["Tech"] });
        state.set_profile(&profile).unwrap();
        assert_eq!(state.cached_profile(), Some(profile));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_stops_on_cancel() {
        let state = Arc::new(ClientState::ephemeral());
        let cancel = CancellationToken::new();
        let handle = state
            .clone()
            .spawn_storage_watcher(Duration::from_millis(50), cancel.clone());

        tokio::time::advance(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
