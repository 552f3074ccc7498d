pub mod analytics;
pub mod article;
pub mod bookmark;
pub mod preferences;
pub mod reading_list;
pub mod session;
pub mod suggestion;

pub use analytics::{
    AnalyticsSnapshot, CategoryShare, DayBar, DayCount, Insight, PeakTimes, RangeDays,
    ReadingStats, TimelineBar, TimelinePoint, Totals,
};
pub use article::{ArticleView, RawArticle};
pub use bookmark::{BookmarkChange, BookmarkEntry};
pub use preferences::{PersonalizedFeed, Preferences};
pub use reading_list::ReadingList;
pub use session::{Session, SessionReport, ViewReport};
pub use suggestion::{PopularQuery, SuggestionSet};
