use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the submission endpoint (`{base_url}/transcribe/`)
    pub base_url: String,

    /// Base URL of the progress endpoint (`{ws_url}/ws/{session_id}`)
    pub ws_url: String,

    /// Hard timeout for the submission request, none by default
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn submission_url(&self) -> String {
        format!("{}/transcribe/", self.base_url.trim_end_matches('/'))
    }

    pub fn progress_url(&self, session_id: &str) -> String {
        format!("{}/ws/{}", self.ws_url.trim_end_matches('/'), session_id)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// What the orchestrator does when the progress channel cannot be set up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFailurePolicy {
    /// Submit anyway, without live progress
    #[default]
    Degrade,
    /// Fail the workflow before submitting
    FailFast,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub connect_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub teardown_grace_ms: u64,
    pub on_channel_failure: ChannelFailurePolicy,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            keepalive_interval_ms: 30_000,
            teardown_grace_ms: 1_000,
            on_channel_failure: ChannelFailurePolicy::Degrade,
        }
    }
}

impl ProgressConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Never zero: a zero period cannot drive a ticker
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            bail!("progress.connect_timeout_ms must be greater than zero");
        }
        if self.keepalive_interval_ms == 0 {
            bail!("progress.keepalive_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from an optional file, overridden by
    /// `STUDYFLOW__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("STUDYFLOW").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        cfg.progress.validate().context("Invalid configuration")?;

        Ok(cfg)
    }
}
