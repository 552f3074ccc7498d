//! Analytics wire types (what the backend returns) and the derived snapshot
//! (what a renderer consumes).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ClientError;

/// The three supported look-back windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RangeDays {
    Week,
    Month,
    Quarter,
}

impl RangeDays {
    pub fn days(self) -> u32 {
        match self {
            RangeDays::Week => 7,
            RangeDays::Month => 30,
            RangeDays::Quarter => 90,
        }
    }
}

impl Default for RangeDays {
    fn default() -> Self {
        RangeDays::Month
    }
}

impl TryFrom<u32> for RangeDays {
    type Error = ClientError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(RangeDays::Week),
            30 => Ok(RangeDays::Month),
            90 => Ok(RangeDays::Quarter),
            other => Err(ClientError::InvalidRange(other)),
        }
    }
}

impl From<RangeDays> for u32 {
    fn from(range: RangeDays) -> Self {
        range.days()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadingStats {
    pub total_articles_read: u64,
    pub total_reading_time: f64,
    pub total_reading_time_formatted: String,
    pub average_reading_time: f64,
    pub average_reading_time_formatted: String,
    pub completed_articles: u64,
    pub completion_rate: f64,
    pub favorite_category: Option<String>,
    pub categories_breakdown: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelinePoint {
    pub date: String,
    #[serde(default)]
    pub articles_read: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TimelineResponse {
    #[serde(default)]
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayCount {
    pub day: String,
    #[serde(default)]
    pub articles_read: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PeakTimes {
    pub peak_hour: Option<u32>,
    pub peak_hour_label: String,
    pub peak_day: String,
    pub days_distribution: Vec<DayCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub icon: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InsightsResponse {
    #[serde(default)]
    pub insights: Vec<Insight>,
}

// ============================================================================
// Derived snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub articles_read: u64,
    pub total_time: String,
    pub avg_time: String,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: u64,
    pub percentage: f64,
    pub rounded_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBar {
    pub day: String,
    pub label: String,
    pub articles_read: u64,
    pub height_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBar {
    pub date: String,
    pub label: String,
    pub articles_read: u64,
    pub height_pct: f64,
}

/// Everything one analytics view renders for a range. Built wholesale, never
/// patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub range: RangeDays,
    pub totals: Totals,
    pub categories: Vec<CategoryShare>,
    pub days_distribution: Vec<DayBar>,
    pub peak_day: String,
    pub peak_hour_label: String,
    pub timeline: Vec<TimelineBar>,
    pub insights: Vec<Insight>,
}

impl AnalyticsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.totals.articles_read == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_accepts_only_supported_windows() {
        assert_eq!(RangeDays::try_from(7).unwrap(), RangeDays::Week);
        assert_eq!(RangeDays::try_from(90).unwrap().days(), 90);
        assert!(matches!(RangeDays::try_from(14), Err(ClientError::InvalidRange(14))));
    }

    #[test]
    fn test_stats_tolerate_missing_fields() {
        let stats: ReadingStats = serde_json::from_value(json!({
            "total_articles_read": 3,
            "categories_breakdown": { "Tech": 2, "Sports": 1 }
        }))
        .unwrap();
        assert_eq!(stats.total_articles_read, 3);
        assert_eq!(stats.categories_breakdown["Tech"], 2);
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn test_insight_type_field() {
        let insight: Insight = serde_json::from_value(json!({
            "type": "streak", "icon": "🔥", "message": "Active on 8 different days!"
        }))
        .unwrap();
        assert_eq!(insight.kind, "streak");
    }
}
