//! Analytics aggregator.
//!
//! One `load` issues the four summary requests together and publishes a
//! snapshot only when all of them succeed. Derived figures (percentages, bar
//! heights, labels) are computed here rather than taken from the backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use echorithm_core::config::AnalyticsConfig;
use echorithm_core::format::{format_duration, format_hour};
use echorithm_core::models::{
    AnalyticsSnapshot, CategoryShare, DayBar, DayCount, Insight, PeakTimes, RangeDays,
    ReadingStats, TimelineBar, TimelinePoint, Totals,
};
use echorithm_core::{ClientError, NewsBackend};
use futures::future::try_join4;
use tokio::sync::watch;

/// Height given to an empty timeline bar so the day stays visible.
const EMPTY_BAR_HEIGHT: f64 = 5.0;

pub struct AnalyticsAggregator {
    backend: Arc<dyn NewsBackend>,
    config: AnalyticsConfig,
    generation: AtomicU64,
    snapshot: watch::Sender<Option<Arc<AnalyticsSnapshot>>>,
}

impl AnalyticsAggregator {
    pub fn new(backend: Arc<dyn NewsBackend>, config: AnalyticsConfig) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            backend,
            config,
            generation: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Renderers watch this. It holds either nothing (loading, failed) or the
    /// complete snapshot of the most recent load.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AnalyticsSnapshot>>> {
        self.snapshot.subscribe()
    }

    pub fn current(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.snapshot.borrow().clone()
    }

    pub async fn load_days(&self, days: u32) -> Result<Arc<AnalyticsSnapshot>, ClientError> {
        self.load(RangeDays::try_from(days)?).await
    }

    /// Full refresh for `range`. The previous snapshot is withdrawn as soon as
    /// the load starts. A load overtaken by a newer one resolves to
    /// `RaceDiscarded` and publishes nothing.
    pub async fn load(&self, range: RangeDays) -> Result<Arc<AnalyticsSnapshot>, ClientError> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.snapshot.send_replace(None);
        tracing::debug!(days = range.days(), generation, "Loading analytics");

        let fetched = try_join4(
            self.backend.reading_stats(range),
            self.backend.reading_timeline(range),
            self.backend.peak_reading_times(range),
            self.backend.personalized_insights(range),
        )
        .await;

        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(days = range.days(), generation, "Analytics load superseded");
            return Err(ClientError::RaceDiscarded(format!(
                "analytics for {} days",
                range.days()
            )));
        }

        let (stats, timeline, peak, insights) = fetched.map_err(|e| {
            tracing::warn!(days = range.days(), error = %e, "Analytics load failed");
            e
        })?;

        let snapshot = Arc::new(build_snapshot(
            range,
            &stats,
            &timeline,
            peak,
            insights,
            self.config.timeline_window,
        ));
        self.snapshot.send_replace(Some(snapshot.clone()));

        tracing::info!(
            days = range.days(),
            articles_read = snapshot.totals.articles_read,
            "Analytics snapshot published"
        );
        Ok(snapshot)
    }
}

pub fn build_snapshot(
    range: RangeDays,
    stats: &ReadingStats,
    timeline: &[TimelinePoint],
    peak: PeakTimes,
    insights: Vec<Insight>,
    timeline_window: usize,
) -> AnalyticsSnapshot {
    let peak_hour_label = peak_hour_label(&peak);
    AnalyticsSnapshot {
        range,
        totals: totals(stats),
        categories: category_shares(stats),
        days_distribution: day_bars(&peak.days_distribution),
        peak_day: peak.peak_day,
        peak_hour_label,
        timeline: timeline_bars(timeline, timeline_window),
        insights,
    }
}

fn peak_hour_label(peak: &PeakTimes) -> String {
    match peak.peak_hour {
        Some(hour) if peak.peak_hour_label.trim().is_empty() => format_hour(hour),
        _ => peak.peak_hour_label.clone(),
    }
}

fn totals(stats: &ReadingStats) -> Totals {
    let or_formatted = |formatted: &str, seconds: f64| {
        if formatted.is_empty() {
            format_duration(seconds.max(0.0) as u64)
        } else {
            formatted.to_string()
        }
    };

    Totals {
        articles_read: stats.total_articles_read,
        total_time: or_formatted(&stats.total_reading_time_formatted, stats.total_reading_time),
        avg_time: or_formatted(&stats.average_reading_time_formatted, stats.average_reading_time),
        completion_rate: stats.completion_rate,
    }
}

/// Share of all articles read, largest first.
pub fn category_shares(stats: &ReadingStats) -> Vec<CategoryShare> {
    let total = stats.total_articles_read;
    let mut shares: Vec<CategoryShare> = stats
        .categories_breakdown
        .iter()
        .map(|(category, &count)| {
            let percentage = if total == 0 {
                0.0
            } else {
                100.0 * count as f64 / total as f64
            };
            CategoryShare {
                category: category.clone(),
                count,
                percentage,
                rounded_percentage: percentage.round() as u32,
            }
        })
        .collect();

    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    shares
}

/// The last `window` points, scaled against the whole series.
pub fn timeline_bars(points: &[TimelinePoint], window: usize) -> Vec<TimelineBar> {
    let max = points.iter().map(|p| p.articles_read).max().unwrap_or(0);
    let skip = points.len().saturating_sub(window);

    points[skip..]
        .iter()
        .map(|p| {
            let height = scaled(p.articles_read, max);
            TimelineBar {
                date: p.date.clone(),
                label: date_label(&p.date),
                articles_read: p.articles_read,
                height_pct: if height == 0.0 { EMPTY_BAR_HEIGHT } else { height },
            }
        })
        .collect()
}

pub fn day_bars(days: &[DayCount]) -> Vec<DayBar> {
    let max = days.iter().map(|d| d.articles_read).max().unwrap_or(0);
    days.iter()
        .map(|d| DayBar {
            day: d.day.clone(),
            label: d.day.chars().take(3).collect(),
            articles_read: d.articles_read,
            height_pct: scaled(d.articles_read, max),
        })
        .collect()
}

fn scaled(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        100.0 * value as f64 / max as f64
    }
}

/// `2024-03-07` becomes `3/7`; anything unparseable is shown as-is.
fn date_label(date: &str) -> String {
    let day = date.get(..10).unwrap_or(date);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(d) => format!("{}/{}", d.month(), d.day()),
        Err(_) => date.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
