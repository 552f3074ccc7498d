use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub recent: Vec<String>,
    pub popular: Vec<PopularQuery>,
}

impl SuggestionSet {
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty() && self.popular.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularQuery {
    pub query: String,
    pub count: Option<u64>,
}

/// Popular entries come back either as bare strings or as `{query, count}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PopularEntry {
    Query(String),
    Counted { query: String, count: Option<u64> },
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionsResponse {
    #[serde(default)]
    recent_searches: Vec<String>,
    #[serde(default)]
    popular_searches: Vec<PopularEntry>,
}

impl From<SuggestionsResponse> for SuggestionSet {
    fn from(resp: SuggestionsResponse) -> Self {
        Self {
            recent: resp.recent_searches,
            popular: resp
                .popular_searches
                .into_iter()
                .map(|entry| match entry {
                    PopularEntry::Query(query) => PopularQuery { query, count: None },
                    PopularEntry::Counted { query, count } => PopularQuery { query, count },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_popular_accepts_both_wire_shapes() {
        let resp: SuggestionsResponse = serde_json::from_value(json!({
            "recent_searches": ["climate"],
            "popular_searches": ["elections", { "query": "ai chips", "count": 14 }]
        }))
        .unwrap();
        let set = SuggestionSet::from(resp);

        assert_eq!(set.recent, vec!["climate".to_string()]);
        assert_eq!(set.popular[0], PopularQuery { query: "elections".into(), count: None });
        assert_eq!(set.popular[1], PopularQuery { query: "ai chips".into(), count: Some(14) });
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let resp: SuggestionsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(SuggestionSet::from(resp).is_empty());
    }
}
