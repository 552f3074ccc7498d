//! News backend API: trait seam plus the reqwest implementation.
//!
//! Everything the client needs from the article/analytics service goes through
//! `NewsBackend`, so subsystems can be exercised against an in-process fake and
//! the HTTP client can be exercised against a mock server.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::ClientError;
use crate::models::analytics::{InsightsResponse, TimelineResponse};
use crate::models::bookmark::{
    AddBookmarkRequest, BookmarkListResponse, BookmarkStatusRequest, BookmarkStatusResponse,
};
use crate::models::preferences::PersonalizedResponse;
use crate::models::reading_list::{
    CreateReadingListRequest, CreatedReadingListResponse, ReadingListEntryRequest,
    ReadingListRequest, ReadingListsResponse,
};
use crate::models::suggestion::SuggestionsResponse;
use crate::models::{
    ArticleView, BookmarkEntry, Insight, PeakTimes, PersonalizedFeed, Preferences, RangeDays,
    RawArticle, ReadingList, ReadingStats, SessionReport, SuggestionSet, TimelinePoint,
    ViewReport,
};
use crate::state::ClientState;

// ============================================================================
// NewsBackend trait
// ============================================================================

#[async_trait]
pub trait NewsBackend: Send + Sync {
    /// POST `/articles/track/`. Anonymous callers are accepted.
    async fn track_article_view(&self, report: &ViewReport) -> Result<(), ClientError>;

    /// POST `/reading/session/`.
    async fn track_reading_session(&self, report: &SessionReport) -> Result<(), ClientError>;

    /// POST `/search/track/`.
    async fn track_search_query(&self, query: &str, results_count: usize) -> Result<(), ClientError>;

    /// Bulk bookmark status. URLs the backend omits are not bookmarked.
    async fn bookmark_status(&self, urls: &[String]) -> Result<HashMap<String, bool>, ClientError>;

    async fn add_bookmark(&self, article: &ArticleView) -> Result<(), ClientError>;

    async fn remove_bookmark(&self, url: &str) -> Result<(), ClientError>;

    async fn list_bookmarks(&self) -> Result<Vec<BookmarkEntry>, ClientError>;

    async fn reading_stats(&self, range: RangeDays) -> Result<ReadingStats, ClientError>;

    async fn reading_timeline(&self, range: RangeDays) -> Result<Vec<TimelinePoint>, ClientError>;

    async fn peak_reading_times(&self, range: RangeDays) -> Result<PeakTimes, ClientError>;

    async fn personalized_insights(&self, range: RangeDays) -> Result<Vec<Insight>, ClientError>;

    async fn search_suggestions(&self, limit: u32) -> Result<SuggestionSet, ClientError>;

    async fn search_articles(&self, query: &str) -> Result<SearchResults, ClientError>;

    async fn login(&self, username: &str, password: &str) -> Result<Credentials, ClientError>;

    /// POST `/register/`. A new account comes back already signed in.
    async fn register(&self, username: &str, password: &str) -> Result<Credentials, ClientError>;

    /// POST `/token/refresh/`: trade the refresh token for a new access token.
    async fn refresh_access(&self, refresh: &str) -> Result<RefreshedAccess, ClientError>;

    async fn preferences(&self) -> Result<Preferences, ClientError>;

    async fn update_preferences(&self, categories: &[String]) -> Result<(), ClientError>;

    /// GET `/articles/personalized/?limit=N`.
    async fn personalized_feed(&self, limit: u32) -> Result<PersonalizedFeed, ClientError>;

    async fn reading_lists(&self) -> Result<Vec<ReadingList>, ClientError>;

    async fn create_reading_list(&self, name: &str, description: &str) -> Result<ReadingList, ClientError>;

    async fn delete_reading_list(&self, name: &str) -> Result<(), ClientError>;

    async fn add_to_reading_list(&self, name: &str, article: &ArticleView) -> Result<(), ClientError>;

    async fn remove_from_reading_list(&self, name: &str, url: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access: String,
    pub refresh: String,
}

/// Rotating deployments hand out a new refresh token alongside the access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedAccess {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub articles: Vec<ArticleView>,
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    results: Vec<RawArticle>,
}

#[derive(Debug, Serialize)]
struct SearchTrackRequest<'a> {
    query: &'a str,
    results_count: usize,
}

#[derive(Debug, Serialize)]
struct RemoveBookmarkRequest<'a> {
    article_url: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferencesRequest<'a> {
    categories: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    detail: Option<String>,
    error: Option<String>,
}

// ============================================================================
// HttpBackend
// ============================================================================

/// reqwest client for the news backend. Attaches the stored bearer token to
/// every request and treats any 401 as a logout.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    state: Arc<ClientState>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig, state: Arc<ClientState>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            state,
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: String, state: Arc<ClientState>) -> Result<Self, ClientError> {
        let config = BackendConfig {
            base_url,
            ..BackendConfig::default()
        };
        Self::new(&config, state)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token. Gated endpoints fail fast when none is stored.
    fn authorize(&self, request: RequestBuilder, required: bool) -> Result<RequestBuilder, ClientError> {
        match self.state.access_token() {
            Some(token) => Ok(request.bearer_auth(token)),
            None if required => Err(ClientError::Unauthenticated),
            None => Ok(request),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Backend rejected credentials, signing out");
            if let Err(e) = self.state.clear_credentials() {
                tracing::error!(error = %e, "Failed to clear credentials after 401");
            }
            return Err(ClientError::Unauthenticated);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ErrorBody>(&body).unwrap_or_default();
            let message = parsed
                .message
                .or(parsed.detail)
                .or(parsed.error)
                .or_else(|| field_errors(&body))
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body
                    }
                });

            tracing::error!(status = status.as_u16(), message = %message, "Backend error");
            return Err(ClientError::BackendRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn get_ranged<T: DeserializeOwned>(&self, path: &str, range: RangeDays) -> Result<T, ClientError> {
        let request = self
            .client
            .get(self.url(path))
            .query(&[("days", range.days())]);
        self.send_json(self.authorize(request, true)?).await
    }
}

/// Validation failures arrive as `{"field": ["problem", ..]}`.
fn field_errors(body: &str) -> Option<String> {
    let fields: BTreeMap<String, Vec<String>> = serde_json::from_str(body).ok()?;
    let joined = fields
        .into_iter()
        .flat_map(|(field, problems)| problems.into_iter().map(move |p| format!("{}: {}", field, p)))
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

#[async_trait]
impl NewsBackend for HttpBackend {
    async fn track_article_view(&self, report: &ViewReport) -> Result<(), ClientError> {
        let request = self.client.post(self.url("/articles/track/")).json(report);
        self.send(self.authorize(request, false)?).await?;
        Ok(())
    }

    async fn track_reading_session(&self, report: &SessionReport) -> Result<(), ClientError> {
        let request = self.client.post(self.url("/reading/session/")).json(report);
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn track_search_query(&self, query: &str, results_count: usize) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.url("/search/track/"))
            .json(&SearchTrackRequest { query, results_count });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn bookmark_status(&self, urls: &[String]) -> Result<HashMap<String, bool>, ClientError> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }
        let request = self
            .client
            .post(self.url("/bookmarks/status/"))
            .json(&BookmarkStatusRequest { urls });
        let resp: BookmarkStatusResponse = self.send_json(self.authorize(request, true)?).await?;
        Ok(resp.bookmarks)
    }

    async fn add_bookmark(&self, article: &ArticleView) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.url("/bookmarks/add/"))
            .json(&AddBookmarkRequest::new(article));
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn remove_bookmark(&self, url: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .delete(self.url("/bookmarks/remove/"))
            .json(&RemoveBookmarkRequest { article_url: url });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn list_bookmarks(&self) -> Result<Vec<BookmarkEntry>, ClientError> {
        let request = self.client.get(self.url("/bookmarks/"));
        let resp: BookmarkListResponse = self.send_json(self.authorize(request, true)?).await?;

        let mut entries = Vec::with_capacity(resp.bookmarks.len());
        for value in resp.bookmarks {
            let created_at = value
                .get("created_at")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            match ArticleView::from_json(value) {
                Ok(article) => entries.push(BookmarkEntry { article, created_at }),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed bookmark entry"),
            }
        }
        Ok(entries)
    }

    async fn reading_stats(&self, range: RangeDays) -> Result<ReadingStats, ClientError> {
        self.get_ranged("/analytics/stats/", range).await
    }

    async fn reading_timeline(&self, range: RangeDays) -> Result<Vec<TimelinePoint>, ClientError> {
        let resp: TimelineResponse = self.get_ranged("/analytics/timeline/", range).await?;
        Ok(resp.timeline)
    }

    async fn peak_reading_times(&self, range: RangeDays) -> Result<PeakTimes, ClientError> {
        self.get_ranged("/analytics/peak-times/", range).await
    }

    async fn personalized_insights(&self, range: RangeDays) -> Result<Vec<Insight>, ClientError> {
        let resp: InsightsResponse = self.get_ranged("/analytics/insights/", range).await?;
        Ok(resp.insights)
    }

    async fn search_suggestions(&self, limit: u32) -> Result<SuggestionSet, ClientError> {
        let request = self
            .client
            .get(self.url("/search/suggestions/"))
            .query(&[("limit", limit)]);
        let resp: SuggestionsResponse = self.send_json(self.authorize(request, true)?).await?;
        Ok(resp.into())
    }

    async fn search_articles(&self, query: &str) -> Result<SearchResults, ClientError> {
        let request = self
            .client
            .get(self.url("/articles/search/"))
            .query(&[("q", query)]);
        let resp: SearchResponse = self.send_json(self.authorize(request, false)?).await?;

        Ok(SearchResults {
            query: if resp.query.is_empty() {
                query.to_string()
            } else {
                resp.query
            },
            articles: resp.results.into_iter().map(ArticleView::from).collect(),
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<Credentials, ClientError> {
        let request = self
            .client
            .post(self.url("/login/"))
            .json(&LoginRequest { username, password });
        self.send_json(request).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<Credentials, ClientError> {
        let request = self
            .client
            .post(self.url("/register/"))
            .json(&LoginRequest { username, password });
        self.send_json(request).await
    }

    async fn refresh_access(&self, refresh: &str) -> Result<RefreshedAccess, ClientError> {
        let request = self
            .client
            .post(self.url("/token/refresh/"))
            .json(&RefreshRequest { refresh });
        self.send_json(request).await
    }

    async fn preferences(&self) -> Result<Preferences, ClientError> {
        let request = self.client.get(self.url("/preferences/"));
        self.send_json(self.authorize(request, true)?).await
    }

    async fn update_preferences(&self, categories: &[String]) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.url("/preferences/update/"))
            .json(&PreferencesRequest { categories });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn personalized_feed(&self, limit: u32) -> Result<PersonalizedFeed, ClientError> {
        let request = self
            .client
            .get(self.url("/articles/personalized/"))
            .query(&[("limit", limit)]);
        let resp: PersonalizedResponse = self.send_json(self.authorize(request, true)?).await?;
        Ok(resp.into())
    }

    async fn reading_lists(&self) -> Result<Vec<ReadingList>, ClientError> {
        let request = self.client.get(self.url("/reading-lists/"));
        let resp: ReadingListsResponse = self.send_json(self.authorize(request, true)?).await?;
        Ok(resp.reading_lists.into_iter().map(ReadingList::from).collect())
    }

    async fn create_reading_list(&self, name: &str, description: &str) -> Result<ReadingList, ClientError> {
        let request = self
            .client
            .post(self.url("/reading-lists/create/"))
            .json(&CreateReadingListRequest {
                list_name: name,
                description,
            });
        let resp: CreatedReadingListResponse = self.send_json(self.authorize(request, true)?).await?;
        Ok(resp.reading_list.into())
    }

    async fn delete_reading_list(&self, name: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .delete(self.url("/reading-lists/delete/"))
            .json(&ReadingListRequest { list_name: name });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn add_to_reading_list(&self, name: &str, article: &ArticleView) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.url("/reading-lists/add/"))
            .json(&ReadingListEntryRequest {
                list_name: name,
                article_url: &article.url,
                article_data: Some(article.snapshot()),
            });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }

    async fn remove_from_reading_list(&self, name: &str, url: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .delete(self.url("/reading-lists/remove/"))
            .json(&ReadingListEntryRequest {
                list_name: name,
                article_url: url,
                article_data: None,
            });
        self.send(self.authorize(request, true)?).await?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
