use super::parse::{validate_config, ConfigError};
use super::types::*;
use std::str::FromStr;
use std::time::Duration;

/// Build the configuration from process environment variables.
pub fn config_from_env() -> Result<Config, ConfigError> {
    config_from_lookup(|name| std::env::var(name).ok())
}

/// Build the configuration from an arbitrary variable lookup.
///
/// Each setting is read under its primary name first, then under the names
/// used by older deployments (`LookoutClientId`, `AzureWebJobsStorage`, ...).
pub fn config_from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    let upstream = UpstreamConfig {
        base_url: env
            .required(&["Baseurl", "BaseUrl"])?
            .trim_end_matches('/')
            .to_string(),
        client_id: env.required(&["ClientId", "LookoutClientId"])?,
        client_secret: env.required(&["ApiSecret", "LookoutApiSecret"])?,
        event_type: env
            .optional(&["EventType"])
            .unwrap_or_else(default_event_type),
        max_results: env.parse_required(&["MaxResults"])?,
        request_timeout: env
            .duration(&["RequestTimeout"])?
            .unwrap_or_else(default_request_timeout),
    };

    let sink = SinkConfig {
        workspace_id: env.required(&["WorkspaceId", "WorkspaceID"])?,
        shared_key: env.required(&["WorkspaceKey"])?,
        endpoint: env.optional(&["LogAnalyticsUri", "logAnalyticsUri"]),
        domain: env.optional(&["LogAnalyticsDomain"]).unwrap_or_else(default_domain),
        log_type: env.optional(&["LogType"]).unwrap_or_else(default_log_type),
        request_timeout: env
            .duration(&["RequestTimeout"])?
            .unwrap_or_else(default_request_timeout),
    };

    let checkpoint = CheckpointConfig {
        connection: env.required(&["StorageConnectionString", "AzureWebJobsStorage"])?,
        share: env.optional(&["CheckpointShare"]).unwrap_or_else(default_share),
        file: env.optional(&["CheckpointFile"]).unwrap_or_else(default_file),
    };

    let run = RunConfig {
        fetch_delay_minutes: env
            .parse_optional(&["FetchDelay"])?
            .unwrap_or_else(default_fetch_delay_minutes),
        past_days: env
            .parse_optional(&["PastDays"])?
            .unwrap_or_else(default_past_days),
        max_event_count: env
            .parse_optional(&["MaxEventCount"])?
            .unwrap_or_else(default_max_event_count),
        chunk_size: env
            .parse_optional(&["ChunkSize"])?
            .unwrap_or_else(default_chunk_size),
        workers: env
            .parse_optional(&["Workers"])?
            .unwrap_or_else(default_workers),
        segments: env
            .parse_optional(&["Segments"])?
            .unwrap_or_else(default_segments),
        run_timeout: env
            .duration(&["RunTimeout"])?
            .unwrap_or_else(default_run_timeout),
    };

    let config = Config {
        upstream,
        sink,
        checkpoint,
        run,
        schedule: env.optional(&["Schedule"]),
    };

    validate_config(&config)?;
    Ok(config)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| (self.lookup)(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    fn required(&self, names: &[&str]) -> Result<String, ConfigError> {
        self.optional(names)
            .ok_or_else(|| ConfigError::MissingEnv(names[0].to_string()))
    }

    fn parse_optional<T>(&self, names: &[&str]) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(names) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidEnv {
                    name: names[0].to_string(),
                    value,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn parse_required<T>(&self, names: &[&str]) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_optional(names)?
            .ok_or_else(|| ConfigError::MissingEnv(names[0].to_string()))
    }

    /// Durations accept humantime strings (`90s`, `10m`) or bare seconds.
    fn duration(&self, names: &[&str]) -> Result<Option<Duration>, ConfigError> {
        let Some(value) = self.optional(names) else {
            return Ok(None);
        };

        if let Ok(secs) = value.parse::<u64>() {
            return Ok(Some(Duration::from_secs(secs)));
        }

        humantime::parse_duration(&value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                name: names[0].to_string(),
                value,
                reason: e.to_string(),
            })
    }
}
