//! Reading lists: named collections the user curates by hand.
//!
//! Same confirm-then-update discipline as bookmarks. The local copy of the
//! lists changes only after the backend accepts a change, so a failed call
//! leaves nothing to roll back.

use std::sync::{Arc, Mutex};

use echorithm_core::models::{ArticleView, ReadingList};
use echorithm_core::{ClientError, ClientState, NewsBackend};

pub struct ReadingLists {
    backend: Arc<dyn NewsBackend>,
    state: Arc<ClientState>,
    lists: Mutex<Vec<ReadingList>>,
}

impl ReadingLists {
    pub fn new(backend: Arc<dyn NewsBackend>, state: Arc<ClientState>) -> Self {
        Self {
            backend,
            state,
            lists: Mutex::new(Vec::new()),
        }
    }

    /// Lists as of the last successful load or change.
    pub fn cached(&self) -> Vec<ReadingList> {
        self.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<ReadingList> {
        self.lock().iter().find(|l| l.name == name).cloned()
    }

    pub async fn load(&self) -> Result<Vec<ReadingList>, ClientError> {
        self.require_login()?;
        let lists = self.backend.reading_lists().await?;
        tracing::debug!(count = lists.len(), "Reading lists loaded");
        *self.lock() = lists.clone();
        Ok(lists)
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<ReadingList, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidInput("List name is required".to_string()));
        }
        self.require_login()?;

        let list = self
            .backend
            .create_reading_list(name, description.trim())
            .await
            .map_err(|e| {
                tracing::warn!(list = name, error = %e, "Failed to create reading list");
                e
            })?;

        tracing::info!(list = %list.name, "Reading list created");
        self.lock().push(list.clone());
        Ok(list)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.require_login()?;
        self.backend.delete_reading_list(name).await.map_err(|e| {
            tracing::warn!(list = name, error = %e, "Failed to delete reading list");
            e
        })?;

        tracing::info!(list = name, "Reading list deleted");
        self.lock().retain(|l| l.name != name);
        Ok(())
    }

    pub async fn add(&self, name: &str, article: &ArticleView) -> Result<(), ClientError> {
        if !article.has_url() {
            return Err(ClientError::InvalidArticle("article has no url".to_string()));
        }
        self.require_login()?;
        self.backend.add_to_reading_list(name, article).await.map_err(|e| {
            tracing::warn!(list = name, url = %article.url, error = %e, "Failed to add to reading list");
            e
        })?;

        if let Some(list) = self.lock().iter_mut().find(|l| l.name == name) {
            if !list.contains(&article.url) {
                list.articles.push(article.clone());
            }
        }
        tracing::debug!(list = name, url = %article.url, "Added to reading list");
        Ok(())
    }

    pub async fn remove(&self, name: &str, url: &str) -> Result<(), ClientError> {
        self.require_login()?;
        self.backend.remove_from_reading_list(name, url).await.map_err(|e| {
            tracing::warn!(list = name, url, error = %e, "Failed to remove from reading list");
            e
        })?;

        if let Some(list) = self.lock().iter_mut().find(|l| l.name == name) {
            list.articles.retain(|a| a.url != url);
        }
        tracing::debug!(list = name, url, "Removed from reading list");
        Ok(())
    }

    fn require_login(&self) -> Result<(), ClientError> {
        if self.state.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Unauthenticated)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ReadingList>> {
        self.lists.lock().unwrap_or_else(|e| e.into_inner())
    }
}
