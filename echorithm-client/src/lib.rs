pub mod app;
pub mod reader;
pub mod subsystems;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use app::Echorithm;
pub use reader::ReaderView;
pub use subsystems::analytics::AnalyticsAggregator;
pub use subsystems::bookmarks::{BookmarkSynchronizer, BookmarkView};
pub use subsystems::prober::{
    EmbeddabilityProber, ExternalOpener, FrameContent, FrameSignal, Probe, ProbeState,
};
pub use subsystems::reading_lists::ReadingLists;
pub use subsystems::suggestions::{SearchPage, SuggestionBox};
pub use subsystems::tracker::{SessionHandle, SessionTracker};
pub use telemetry::Telemetry;
