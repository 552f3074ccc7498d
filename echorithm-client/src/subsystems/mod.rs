pub mod analytics;
pub mod bookmarks;
pub mod prober;
pub mod reading_lists;
pub mod suggestions;
pub mod tracker;
