use std::time::Duration;

use crate::error::{Result, TrainerError};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Matches the grading service's own upper bound on submitted code.
pub const DEFAULT_CODE_MAX_BYTES: usize = 131_072;

pub const ENV_BASE_URL: &str = "TRAINER_API_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "TRAINER_POLL_INTERVAL_MS";
pub const ENV_CODE_MAX_BYTES: &str = "TRAINER_CODE_MAX_BYTES";

/// Client-side configuration for talking to the grading service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the grading service, without a trailing slash.
    pub base_url: String,
    /// Cadence of the job poller.
    pub poll_interval_ms: u64,
    /// Submissions larger than this are rejected before any request is sent.
    pub code_max_bytes: usize,
    /// TCP connect timeout. Requests themselves rely on the transport's own
    /// failure signalling.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            code_max_bytes: DEFAULT_CODE_MAX_BYTES,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Build a config from `TRAINER_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            cfg = cfg.with_base_url(url);
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|_| {
                TrainerError::Config(format!("{} must be an integer, got {:?}", ENV_POLL_INTERVAL_MS, raw))
            })?;
            cfg = cfg.with_poll_interval_ms(ms);
        }
        if let Some(raw) = lookup(ENV_CODE_MAX_BYTES) {
            let bytes = raw.trim().parse::<usize>().map_err(|_| {
                TrainerError::Config(format!("{} must be an integer, got {:?}", ENV_CODE_MAX_BYTES, raw))
            })?;
            cfg.code_max_bytes = bytes;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TrainerError::Config(format!(
                "base url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(TrainerError::Config("poll interval must be positive".to_string()));
        }
        Ok(())
    }
}
