//! Typed view over the merged config document.
//!
//! Every field has a default so an empty YAML document yields a working
//! single-process setup (in-memory store, public operator API, 5s cadence).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "http://m.mivb.be/api/";
pub const DEFAULT_UPSTREAM_LANG: &str = "nl";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 40;
pub const DEFAULT_EVENT_CHANNEL: &str = "mivb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Connection URL; only read by the redis backend.
    pub url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "redis://127.0.0.1/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    /// Sent as the `lang` query parameter on every request.
    pub lang: String,
    /// Global cap on simultaneous in-flight fetches, across all routes.
    pub max_in_flight: usize,
    pub fetch_timeout_ms: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            lang: DEFAULT_UPSTREAM_LANG.to_string(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            fetch_timeout_ms: 5_000,
        }
    }
}

impl UpstreamSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_ms: u64,
    /// Per-attempt deadline. Must not exceed `interval_ms`.
    pub deadline_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            deadline_ms: 5_000,
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub channel: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel: DEFAULT_EVENT_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AerialConfig {
    pub store: StoreSettings,
    pub upstream: UpstreamSettings,
    pub scheduler: SchedulerSettings,
    pub events: EventSettings,
}

impl AerialConfig {
    /// Deserialize from the merged config document and validate ranges.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: AerialConfig = serde_json::from_value(config_json.clone())
            .context("config does not match AerialConfig shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.max_in_flight == 0 {
            bail!("CONFIG_INVALID /upstream/max_in_flight must be > 0");
        }
        if self.scheduler.interval_ms == 0 {
            bail!("CONFIG_INVALID /scheduler/interval_ms must be > 0");
        }
        if self.scheduler.deadline_ms == 0 || self.scheduler.deadline_ms > self.scheduler.interval_ms
        {
            bail!(
                "CONFIG_INVALID /scheduler/deadline_ms={} must be in 1..={}",
                self.scheduler.deadline_ms,
                self.scheduler.interval_ms
            );
        }
        if self.events.channel.trim().is_empty() {
            bail!("CONFIG_INVALID /events/channel must not be empty");
        }
        Ok(())
    }
}
