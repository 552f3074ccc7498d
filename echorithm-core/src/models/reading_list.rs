use serde::{Deserialize, Serialize};

use super::{ArticleView, RawArticle};

/// A named, user-curated collection of articles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadingList {
    pub name: String,
    pub description: String,
    pub articles: Vec<ArticleView>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl ReadingList {
    pub fn contains(&self, url: &str) -> bool {
        self.articles.iter().any(|a| a.url == url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawReadingList {
    pub list_name: String,
    pub description: Option<String>,
    pub articles: Vec<RawArticle>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<RawReadingList> for ReadingList {
    fn from(raw: RawReadingList) -> Self {
        Self {
            name: raw.list_name,
            description: raw.description.unwrap_or_default(),
            articles: raw
                .articles
                .into_iter()
                .map(ArticleView::from)
                .filter(ArticleView::has_url)
                .collect(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReadingListsResponse {
    #[serde(default)]
    pub reading_lists: Vec<RawReadingList>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedReadingListResponse {
    pub reading_list: RawReadingList,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateReadingListRequest<'a> {
    pub list_name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadingListRequest<'a> {
    pub list_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadingListEntryRequest<'a> {
    pub list_name: &'a str,
    pub article_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_list_normalizes_articles() {
        let raw: RawReadingList = serde_json::from_value(json!({
            "list_name": "Weekend",
            "description": null,
            "articles": [
                { "article_url": "https://news.test/a", "title": "A", "urlToImage": "https://img.test/a.png" },
                { "title": "no link" }
            ],
            "created_at": "2026-10-01T08:00:00Z"
        }))
        .unwrap();

        let list = ReadingList::from(raw);
        assert_eq!(list.name, "Weekend");
        assert_eq!(list.description, "");
        assert_eq!(list.articles.len(), 1, "entries without a url are dropped");
        assert!(list.contains("https://news.test/a"));
        assert_eq!(list.articles[0].image.as_deref(), Some("https://img.test/a.png"));
    }
}
