use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub sink: SinkConfig,
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Cron-like trigger spec. Consumed by the external scheduler; recorded
    /// in logs only.
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    pub max_results: u32,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

pub fn default_event_type() -> String {
    "Anomaly".to_string()
}

pub fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub workspace_id: String,
    /// Base64-encoded workspace key.
    pub shared_key: String,
    /// Explicit ingestion endpoint. Derived from the workspace id and
    /// `domain` when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_log_type")]
    pub log_type: String,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

pub fn default_domain() -> String {
    "azure.com".to_string()
}

pub fn default_log_type() -> String {
    "LookoutCloudSecurity".to_string()
}

impl SinkConfig {
    /// `https://{workspace}.ods.opinsights.{domain}` unless overridden.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.ods.opinsights.{}",
                self.workspace_id, self.domain
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Backend connection string, see `checkpoint::open_store`.
    pub connection: String,
    #[serde(default = "default_share")]
    pub share: String,
    #[serde(default = "default_file")]
    pub file: String,
}

pub fn default_share() -> String {
    crate::checkpoint::file::DEFAULT_SHARE.to_string()
}

pub fn default_file() -> String {
    crate::checkpoint::file::DEFAULT_FILE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_fetch_delay_minutes")]
    pub fetch_delay_minutes: u32,
    #[serde(default = "default_past_days")]
    pub past_days: u32,
    /// Largest fetch delivered as a single request; above this the batch is
    /// sorted and shipped in chunks.
    #[serde(default = "default_max_event_count")]
    pub max_event_count: usize,
    /// Upper bound on events per chunked request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of contiguous sub-windows the poll window is split into.
    #[serde(default = "default_segments")]
    pub segments: usize,
    #[serde(with = "humantime_serde", default = "default_run_timeout")]
    pub run_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fetch_delay_minutes: default_fetch_delay_minutes(),
            past_days: default_past_days(),
            max_event_count: default_max_event_count(),
            chunk_size: default_chunk_size(),
            workers: default_workers(),
            segments: default_segments(),
            run_timeout: default_run_timeout(),
        }
    }
}

pub fn default_fetch_delay_minutes() -> u32 {
    5
}

pub fn default_past_days() -> u32 {
    7
}

pub fn default_max_event_count() -> usize {
    10_000
}

pub fn default_chunk_size() -> usize {
    20_000
}

pub fn default_workers() -> usize {
    1
}

pub fn default_segments() -> usize {
    1
}

pub fn default_run_timeout() -> Duration {
    Duration::from_secs(600)
}
