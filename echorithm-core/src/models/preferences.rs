use serde::{Deserialize, Serialize};

use super::{ArticleView, RawArticle};

/// Categories the user wants their feed built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Recommendations for the signed-in user. `message` explains an empty feed
/// (no preferences yet, nothing ingested).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersonalizedFeed {
    pub articles: Vec<ArticleView>,
    pub categories: Vec<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PersonalizedResponse {
    pub articles: Vec<RawArticle>,
    pub categories: Vec<String>,
    pub message: Option<String>,
}

impl From<PersonalizedResponse> for PersonalizedFeed {
    fn from(resp: PersonalizedResponse) -> Self {
        Self {
            articles: resp
                .articles
                .into_iter()
                .map(ArticleView::from)
                .filter(ArticleView::has_url)
                .collect(),
            categories: resp.categories,
            message: resp.message.filter(|m| !m.trim().is_empty()),
        }
    }
}
