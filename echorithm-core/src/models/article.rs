//! Article shapes as they arrive from the backend, and the single canonical
//! record every component works with.
//!
//! Feed items, search hits and flattened bookmarks all name the same fields
//! differently (`url` / `link` / `article_url`, `image` / `image_url` /
//! `urlToImage`, ...). `RawArticle` accepts all of them; `ArticleView` is what
//! crosses component boundaries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    pub url: Option<String>,
    pub link: Option<String>,
    pub article_url: Option<String>,
    pub title: Option<String>,
    pub article_title: Option<String>,
    pub source: Option<SourceField>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub image_url: Option<String>,
    #[serde(rename = "urlToImage")]
    pub url_to_image: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<String>,
    pub sentiment_label: Option<String>,
    pub published_at: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at_camel: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
}

/// `source` is either a bare name or a `{ "id": .., "name": .. }` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceField {
    Name(String),
    Object { name: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleView {
    pub url: String,
    pub title: String,
    pub source: String,
    pub summary: String,
    pub category: String,
    pub image: Option<String>,
    pub sentiment: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<String>,
}

fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

impl From<RawArticle> for ArticleView {
    fn from(raw: RawArticle) -> Self {
        let source = match raw.source {
            Some(SourceField::Name(name)) => name,
            Some(SourceField::Object { name }) => name.unwrap_or_default(),
            None => String::new(),
        };

        Self {
            url: first_non_empty([raw.url, raw.link, raw.article_url]).unwrap_or_default(),
            title: first_non_empty([raw.title, raw.article_title]).unwrap_or_default(),
            source,
            summary: first_non_empty([raw.summary, raw.description]).unwrap_or_default(),
            category: raw.category.unwrap_or_default(),
            image: first_non_empty([raw.image, raw.image_url, raw.url_to_image]),
            sentiment: first_non_empty([raw.sentiment, raw.sentiment_label]),
            published_at: first_non_empty([raw.published_at, raw.published_at_camel, raw.date]),
            author: first_non_empty([raw.author]),
        }
    }
}

impl ArticleView {
    pub fn new(url: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    /// Normalize any backend JSON article into the canonical record.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<RawArticle>(value).map(Self::from)
    }

    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// The article as the backend stores it inside bookmarks and reading lists.
    pub(crate) fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url,
            "title": self.title,
            "source": self.source,
            "summary": self.summary,
            "image_url": self.image,
            "category": self.category,
            "sentiment": self.sentiment,
            "author": self.author,
            "published_at": self.published_at,
        })
    }
}
