//! Search suggestion box.
//!
//! Suggestions are a personalization feature: fetched fresh on every focus for
//! signed-in users, shown until a pointer-down lands outside the search
//! control, then thrown away. Nothing is cached across focus cycles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use echorithm_core::models::SuggestionSet;
use echorithm_core::{ClientError, ClientState, NewsBackend, SearchResults};
use reqwest::Url;
use serde::Serialize;

use crate::telemetry::Telemetry;

const SEARCH_ROUTE: &str = "/search";
/// Locations are relative; this only anchors them for parsing.
const LOCATION_BASE: &str = "http://localhost/";

/// Where a search lands: the results-page location and what it shows.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub location: String,
    pub results: SearchResults,
}

pub struct SuggestionBox {
    backend: Arc<dyn NewsBackend>,
    state: Arc<ClientState>,
    telemetry: Telemetry,
    limit: u32,
    epoch: AtomicU64,
    shown: Mutex<Option<SuggestionSet>>,
}

impl SuggestionBox {
    pub fn new(
        backend: Arc<dyn NewsBackend>,
        state: Arc<ClientState>,
        telemetry: Telemetry,
        limit: u32,
    ) -> Self {
        Self {
            backend,
            state,
            telemetry,
            limit,
            epoch: AtomicU64::new(0),
            shown: Mutex::new(None),
        }
    }

    /// The input gained focus. Anonymous users get `None` without a request.
    /// A response that arrives after a dismiss (or a newer focus) resolves to
    /// `RaceDiscarded` and is not shown.
    pub async fn focus(&self) -> Result<Option<SuggestionSet>, ClientError> {
        let epoch = self.next_epoch();
        if !self.state.is_authenticated() {
            return Ok(None);
        }

        let set = self.backend.search_suggestions(self.limit).await?;
        if self.epoch.load(Ordering::Acquire) != epoch {
            return Err(ClientError::RaceDiscarded("search suggestions".to_string()));
        }

        tracing::debug!(
            recent = set.recent.len(),
            popular = set.popular.len(),
            "Showing search suggestions"
        );
        *self.lock_shown() = Some(set.clone());
        Ok(Some(set))
    }

    pub fn visible(&self) -> Option<SuggestionSet> {
        self.lock_shown().clone()
    }

    /// Pointer-down somewhere on the page. Returns whether it dismissed.
    pub fn pointer_down(&self, inside_search: bool) -> bool {
        if inside_search {
            return false;
        }
        self.dismiss();
        true
    }

    pub fn dismiss(&self) {
        self.next_epoch();
    }

    /// A suggestion was clicked: dismiss, navigate to its results page and
    /// search for exactly that text.
    pub async fn select(&self, suggestion: &str) -> Result<SearchPage, ClientError> {
        self.dismiss();
        let location = search_location(suggestion)
            .ok_or_else(|| ClientError::InvalidInput(format!("unroutable query {:?}", suggestion)))?;
        let results = self.open_location(&location).await?;
        Ok(SearchPage { location, results })
    }

    /// Run the search a results-page location carries.
    pub async fn open_location(&self, location: &str) -> Result<SearchResults, ClientError> {
        let query = query_from_location(location).unwrap_or_default();
        self.search(&query).await
    }

    /// Run a search and report it fire-and-forget. Blank queries return no
    /// results without a request; anything else is sent as typed.
    pub async fn search(&self, query: &str) -> Result<SearchResults, ClientError> {
        if query.trim().is_empty() {
            return Ok(SearchResults {
                query: String::new(),
                articles: Vec::new(),
            });
        }

        let results = self.backend.search_articles(query).await?;
        if self.state.is_authenticated() {
            self.telemetry
                .spawn_search(query.to_string(), results.articles.len());
        }
        Ok(results)
    }

    fn next_epoch(&self) -> u64 {
        *self.lock_shown() = None;
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn lock_shown(&self) -> std::sync::MutexGuard<'_, Option<SuggestionSet>> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-app location of the results page for `query`, e.g. `/search?q=ai+%26+chips`.
pub fn search_location(query: &str) -> Option<String> {
    let mut url = Url::parse(LOCATION_BASE).ok()?.join(SEARCH_ROUTE).ok()?;
    url.query_pairs_mut().append_pair("q", query);
    Some(format!("{}?{}", url.path(), url.query()?))
}

/// The query a results-page location carries.
pub fn query_from_location(location: &str) -> Option<String> {
    let url = Url::parse(LOCATION_BASE).ok()?.join(location).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
}

// ============================================================================
// TESTS
// ============================================================================
