pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod state;
pub mod store;

pub use api::{Credentials, HttpBackend, NewsBackend, RefreshedAccess, SearchResults};
pub use bus::{ProfileEvent, StateBus};
pub use config::EchorithmConfig;
pub use error::{ClientError, StoreError};
pub use state::ClientState;
pub use store::KvStore;
