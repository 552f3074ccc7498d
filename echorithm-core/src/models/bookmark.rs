use serde::{Deserialize, Serialize};

use super::ArticleView;

/// Published on the bookmark channel after the backend confirms a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkChange {
    pub article_url: String,
    pub new_state: bool,
}

/// A saved article as returned by GET `/bookmarks/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub article: ArticleView,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddBookmarkRequest<'a> {
    pub article_url: &'a str,
    pub article_title: &'a str,
    pub article_data: serde_json::Value,
}

impl<'a> AddBookmarkRequest<'a> {
    pub(crate) fn new(article: &'a ArticleView) -> Self {
        Self {
            article_url: &article.url,
            article_title: &article.title,
            article_data: article.snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BookmarkStatusRequest<'a> {
    pub urls: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarkStatusResponse {
    #[serde(default)]
    pub bookmarks: std::collections::HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarkListResponse {
    #[serde(default)]
    pub bookmarks: Vec<serde_json::Value>,
}
