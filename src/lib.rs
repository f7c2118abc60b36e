//! Tracker BFF
//!
//! Backend-for-frontend over a GitLab-compatible issue tracker:
//! - Activity feed with a single "last activity" summary per issue
//! - Work item hierarchy (children, project names) resolved in batches
//! - Parent/child linking and child issue creation

pub mod api;
pub mod enrichment;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use enrichment::{
    ActivityAggregator, ActivityLimits, HierarchyLinker, HierarchyResolver,
    DEFAULT_HIERARCHY_BATCH_SIZE,
};
use tracker::{GitLabClient, TrackerClient};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub tracker: TrackerYamlConfig,
    pub enrichment: EnrichmentYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Remote tracker section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerYamlConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for TrackerYamlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gitlab.com".into(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Enrichment tuning section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentYamlConfig {
    pub notes_limit: u32,
    pub label_events_limit: u32,
    /// Work items per graph request. Keeps each request under the tracker's
    /// query complexity cap.
    pub hierarchy_batch_size: usize,
    pub dashboard_issue_limit: u32,
}

impl Default for EnrichmentYamlConfig {
    fn default() -> Self {
        let limits = ActivityLimits::default();
        Self {
            notes_limit: limits.notes,
            label_events_limit: limits.label_events,
            hierarchy_batch_size: DEFAULT_HIERARCHY_BATCH_SIZE,
            dashboard_issue_limit: 5,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub tracker_base_url: String,
    pub tracker_token: String,
    pub tracker_timeout_secs: u64,
    pub notes_limit: u32,
    pub label_events_limit: u32,
    pub hierarchy_batch_size: usize,
    pub dashboard_issue_limit: u32,
}

fn env_or<T: FromStr>(var: &str, fallback: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    /// Equivalent to `from_yaml_and_env(None)`.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let config = Self {
            server_port: env_or("SERVER_PORT", yaml.server.port),
            tracker_base_url: std::env::var("GITLAB_BASE_URL").unwrap_or(yaml.tracker.base_url),
            tracker_token: std::env::var("GITLAB_TOKEN").unwrap_or(yaml.tracker.token),
            tracker_timeout_secs: env_or("TRACKER_TIMEOUT_SECS", yaml.tracker.timeout_secs),
            notes_limit: env_or("ACTIVITY_NOTES_LIMIT", yaml.enrichment.notes_limit),
            label_events_limit: env_or(
                "ACTIVITY_LABEL_EVENTS_LIMIT",
                yaml.enrichment.label_events_limit,
            ),
            hierarchy_batch_size: env_or(
                "HIERARCHY_BATCH_SIZE",
                yaml.enrichment.hierarchy_batch_size,
            ),
            dashboard_issue_limit: env_or(
                "DASHBOARD_ISSUE_LIMIT",
                yaml.enrichment.dashboard_issue_limit,
            ),
        };

        if config.hierarchy_batch_size == 0 {
            bail!("hierarchy_batch_size must be at least 1");
        }
        Ok(config)
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn activity_limits(&self) -> ActivityLimits {
        ActivityLimits {
            notes: self.notes_limit,
            label_events: self.label_events_limit,
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<dyn TrackerClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let tracker = Arc::new(GitLabClient::new(
            &config.tracker_base_url,
            &config.tracker_token,
            Duration::from_secs(config.tracker_timeout_secs),
        )?);
        Ok(Self::with_tracker(tracker, config))
    }

    pub fn with_tracker(tracker: Arc<dyn TrackerClient>, config: Config) -> Self {
        Self {
            tracker,
            config: Arc::new(config),
        }
    }

    pub fn aggregator(&self) -> ActivityAggregator {
        ActivityAggregator::new(self.tracker.clone(), self.config.activity_limits())
    }

    pub fn resolver(&self) -> HierarchyResolver {
        HierarchyResolver::new(self.tracker.clone(), self.config.hierarchy_batch_size)
    }

    pub fn linker(&self) -> HierarchyLinker {
        HierarchyLinker::new(self.tracker.clone())
    }
}

/// Build the state, bind `0.0.0.0:<server_port>` and serve the API.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config)?;
    let app = api::create_router(Arc::new(api::handlers::ServerState::new(&state)));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
