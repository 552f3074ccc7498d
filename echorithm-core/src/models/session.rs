use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ArticleView;

/// One bounded interval of a user reading one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub article_url: String,
    pub article_title: String,
    pub category: String,
    pub started_at: DateTime<Utc>,
    pub reading_time_seconds: u64,
    pub completed: bool,
}

impl Session {
    pub fn open(article: &ArticleView, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: new_session_id(started_at),
            article_url: article.url.clone(),
            article_title: article.title.clone(),
            category: article.category.clone(),
            started_at,
            reading_time_seconds: 0,
            completed: false,
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            session_id: self.session_id.clone(),
            article_url: self.article_url.clone(),
            article_title: self.article_title.clone(),
            category: self.category.clone(),
            reading_time: self.reading_time_seconds,
            completed: self.completed,
            timestamp: Utc::now(),
        }
    }
}

/// Millisecond timestamp plus a random suffix.
fn new_session_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.timestamp_millis(), &suffix[..12])
}

/// Body of POST `/reading/session/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub article_url: String,
    pub article_title: String,
    pub category: String,
    pub reading_time: u64,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Body of POST `/articles/track/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewReport {
    pub article_url: String,
    pub article_title: String,
    pub category: String,
    pub reading_time: u64,
}

impl From<&ArticleView> for ViewReport {
    fn from(article: &ArticleView) -> Self {
        Self {
            article_url: article.url.clone(),
            article_title: article.title.clone(),
            category: article.category.clone(),
            reading_time: 0,
        }
    }
}
