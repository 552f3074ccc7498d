use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EchorithmConfig {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub tracker: TrackerConfig,
    pub prober: ProberConfig,
    pub analytics: AnalyticsConfig,
    pub suggestions: SuggestionsConfig,
    pub feed: FeedConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub watch_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.echorithm/store.json".to_string(),
            watch_interval_ms: 250,
        }
    }
}

impl StorageConfig {
    /// Store path with `~` and `$VARS` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match shellexpand::full(&self.path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Could not expand store path, using it verbatim");
                PathBuf::from(&self.path)
            }
        }
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    /// A session counts as completed when it lasted strictly longer than this.
    pub completion_threshold_seconds: u64,
    pub tick_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            completion_threshold_seconds: 30,
            tick_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProberConfig {
    pub timeout_ms: u64,
    /// Treat a load whose content cannot be inspected (cross-origin isolation)
    /// as a successful embed.
    pub cross_origin_is_success: bool,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            cross_origin_is_success: true,
        }
    }
}

impl ProberConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub timeline_window: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { timeline_window: 14 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub limit: u32,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self { limit: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    /// Articles requested from the personalized feed.
    pub limit: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Extra delivery attempts for fire-and-forget reports. Zero means a single
    /// best-effort attempt.
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EchorithmConfig {
    /// Load from an optional TOML file, then `ECHORITHM__SECTION__KEY` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("ECHORITHM").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
