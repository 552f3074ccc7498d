//! In-process backend double for unit tests that run on a paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use echorithm_core::models::{
    ArticleView, BookmarkEntry, Insight, PeakTimes, PersonalizedFeed, Preferences, RangeDays,
    ReadingList, ReadingStats, SessionReport, SuggestionSet, TimelinePoint, ViewReport,
};
use echorithm_core::{ClientError, Credentials, NewsBackend, RefreshedAccess, SearchResults};

#[derive(Debug, Clone)]
pub(crate) enum Call {
    View(ViewReport),
    Session(SessionReport),
    Search { query: String, results_count: usize },
    Status(Vec<String>),
    Add(String),
    Remove(String),
    List,
    Stats(RangeDays),
    Timeline(RangeDays),
    Peak(RangeDays),
    Insights(RangeDays),
    Suggestions(u32),
    SearchArticles(String),
    Login(String),
    Register(String),
    Refresh(String),
    Preferences,
    UpdatePreferences(Vec<String>),
    Personalized(u32),
    ReadingLists,
    CreateList(String),
    DeleteList(String),
    AddToList { list: String, url: String },
    RemoveFromList { list: String, url: String },
}

type Failure = Box<dyn Fn() -> ClientError + Send + Sync>;

#[derive(Default)]
pub(crate) struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<Failure>>,
    delay: Mutex<Duration>,
    range_delays: Mutex<HashMap<RangeDays, Duration>>,
    pub statuses: Mutex<HashMap<String, bool>>,
    pub stats: Mutex<ReadingStats>,
    pub timeline: Mutex<Vec<TimelinePoint>>,
    pub peak: Mutex<PeakTimes>,
    pub insights: Mutex<Vec<Insight>>,
    pub suggestions: Mutex<SuggestionSet>,
    pub search_hits: Mutex<Vec<ArticleView>>,
    pub preferences: Mutex<Preferences>,
    pub feed: Mutex<PersonalizedFeed>,
    pub lists: Mutex<Vec<ReadingList>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, f: impl Fn() -> ClientError + Send + Sync + 'static) {
        *self.failure.lock().unwrap() = Some(Box::new(f));
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Analytics calls for `range` sleep this long before answering.
    pub fn set_range_delay(&self, range: RangeDays, delay: Duration) {
        self.range_delays.lock().unwrap().insert(range, delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn session_reports(&self) -> Vec<SessionReport> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Session(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: Call) -> Result<(), ClientError> {
        let range = match &call {
            Call::Stats(r) | Call::Timeline(r) | Call::Peak(r) | Call::Insights(r) => Some(*r),
            _ => None,
        };
        self.calls.lock().unwrap().push(call);

        let mut delay = *self.delay.lock().unwrap();
        if let Some(range) = range {
            if let Some(d) = self.range_delays.lock().unwrap().get(&range) {
                delay = *d;
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.failure.lock().unwrap().as_ref() {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NewsBackend for FakeBackend {
    async fn track_article_view(&self, report: &ViewReport) -> Result<(), ClientError> {
        self.record(Call::View(report.clone())).await
    }

    async fn track_reading_session(&self, report: &SessionReport) -> Result<(), ClientError> {
        self.record(Call::Session(report.clone())).await
    }

    async fn track_search_query(&self, query: &str, results_count: usize) -> Result<(), ClientError> {
        self.record(Call::Search {
            query: query.to_string(),
            results_count,
        })
        .await
    }

    async fn bookmark_status(&self, urls: &[String]) -> Result<HashMap<String, bool>, ClientError> {
        self.record(Call::Status(urls.to_vec())).await?;
        let known = self.statuses.lock().unwrap();
        Ok(urls
            .iter()
            .filter_map(|u| known.get(u).map(|s| (u.clone(), *s)))
            .collect())
    }

    async fn add_bookmark(&self, article: &ArticleView) -> Result<(), ClientError> {
        self.record(Call::Add(article.url.clone())).await
    }

    async fn remove_bookmark(&self, url: &str) -> Result<(), ClientError> {
        self.record(Call::Remove(url.to_string())).await
    }

    async fn list_bookmarks(&self) -> Result<Vec<BookmarkEntry>, ClientError> {
        self.record(Call::List).await?;
        Ok(Vec::new())
    }

    async fn reading_stats(&self, range: RangeDays) -> Result<ReadingStats, ClientError> {
        self.record(Call::Stats(range)).await?;
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn reading_timeline(&self, range: RangeDays) -> Result<Vec<TimelinePoint>, ClientError> {
        self.record(Call::Timeline(range)).await?;
        Ok(self.timeline.lock().unwrap().clone())
    }

    async fn peak_reading_times(&self, range: RangeDays) -> Result<PeakTimes, ClientError> {
        self.record(Call::Peak(range)).await?;
        Ok(self.peak.lock().unwrap().clone())
    }

    async fn personalized_insights(&self, range: RangeDays) -> Result<Vec<Insight>, ClientError> {
        self.record(Call::Insights(range)).await?;
        Ok(self.insights.lock().unwrap().clone())
    }

    async fn search_suggestions(&self, limit: u32) -> Result<SuggestionSet, ClientError> {
        self.record(Call::Suggestions(limit)).await?;
        Ok(self.suggestions.lock().unwrap().clone())
    }

    async fn search_articles(&self, query: &str) -> Result<SearchResults, ClientError> {
        self.record(Call::SearchArticles(query.to_string())).await?;
        Ok(SearchResults {
            query: query.to_string(),
            articles: self.search_hits.lock().unwrap().clone(),
        })
    }

    async fn login(&self, username: &str, _password: &str) -> Result<Credentials, ClientError> {
        self.record(Call::Login(username.to_string())).await?;
        Ok(Credentials {
            access: format!("access-{}", username),
            refresh: format!("refresh-{}", username),
        })
    }

    async fn register(&self, username: &str, _password: &str) -> Result<Credentials, ClientError> {
        self.record(Call::Register(username.to_string())).await?;
        Ok(Credentials {
            access: format!("access-{}", username),
            refresh: format!("refresh-{}", username),
        })
    }

    async fn refresh_access(&self, refresh: &str) -> Result<RefreshedAccess, ClientError> {
        self.record(Call::Refresh(refresh.to_string())).await?;
        Ok(RefreshedAccess {
            access: format!("renewed-{}", refresh),
            refresh: None,
        })
    }

    async fn preferences(&self) -> Result<Preferences, ClientError> {
        self.record(Call::Preferences).await?;
        Ok(self.preferences.lock().unwrap().clone())
    }

    async fn update_preferences(&self, categories: &[String]) -> Result<(), ClientError> {
        self.record(Call::UpdatePreferences(categories.to_vec())).await
    }

    async fn personalized_feed(&self, limit: u32) -> Result<PersonalizedFeed, ClientError> {
        self.record(Call::Personalized(limit)).await?;
        Ok(self.feed.lock().unwrap().clone())
    }

    async fn reading_lists(&self) -> Result<Vec<ReadingList>, ClientError> {
        self.record(Call::ReadingLists).await?;
        Ok(self.lists.lock().unwrap().clone())
    }

    async fn create_reading_list(&self, name: &str, description: &str) -> Result<ReadingList, ClientError> {
        self.record(Call::CreateList(name.to_string())).await?;
        Ok(ReadingList {
            name: name.to_string(),
            description: description.to_string(),
            ..ReadingList::default()
        })
    }

    async fn delete_reading_list(&self, name: &str) -> Result<(), ClientError> {
        self.record(Call::DeleteList(name.to_string())).await
    }

    async fn add_to_reading_list(&self, name: &str, article: &ArticleView) -> Result<(), ClientError> {
        self.record(Call::AddToList {
            list: name.to_string(),
            url: article.url.clone(),
        })
        .await
    }

    async fn remove_from_reading_list(&self, name: &str, url: &str) -> Result<(), ClientError> {
        self.record(Call::RemoveFromList {
            list: name.to_string(),
            url: url.to_string(),
        })
        .await
    }
}
