use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars};
use crate::sink::signature::SharedKeySigner;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },
}

fn sink_endpoint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://([\w\-]+)\.ods\.opinsights\.azure\.([a-zA-Z\.]+)$")
            .expect("sink endpoint pattern is valid")
    })
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(inner) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), inner),
        )),
        other => other,
    })
}

/// Parse and validate a YAML config, expanding `$env{VAR}` references first.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them in the connector's environment or replace the references\n\
             in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let upstream = &config.upstream;
    if !(upstream.base_url.starts_with("https://") || upstream.base_url.starts_with("http://")) {
        errors.push(format!(
            "upstream.base_url '{}' must be an http(s) URL",
            upstream.base_url
        ));
    }
    for (name, value) in [
        ("upstream.client_id", &upstream.client_id),
        ("upstream.client_secret", &upstream.client_secret),
        ("upstream.event_type", &upstream.event_type),
        ("sink.workspace_id", &config.sink.workspace_id),
        ("sink.log_type", &config.sink.log_type),
        ("checkpoint.connection", &config.checkpoint.connection),
        ("checkpoint.share", &config.checkpoint.share),
        ("checkpoint.file", &config.checkpoint.file),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("{} must not be empty", name));
        }
    }
    if upstream.max_results == 0 {
        errors.push("upstream.max_results must be greater than 0".to_string());
    }

    let endpoint = config.sink.endpoint();
    if !sink_endpoint_pattern().is_match(&endpoint) {
        errors.push(format!("invalid log analytics endpoint '{}'", endpoint));
    }
    if let Err(e) = SharedKeySigner::new(&config.sink.workspace_id, &config.sink.shared_key) {
        errors.push(format!("sink.shared_key: {}", e));
    }

    let run = &config.run;
    for (name, value) in [
        ("run.max_event_count", run.max_event_count),
        ("run.chunk_size", run.chunk_size),
        ("run.workers", run.workers),
        ("run.segments", run.segments),
    ] {
        if value == 0 {
            errors.push(format!("{} must be greater than 0", name));
        }
    }
    if run.run_timeout.is_zero() {
        errors.push("run.run_timeout must be greater than 0".to_string());
    }

    if let Some(schedule) = &config.schedule {
        if schedule.trim().is_empty() {
            errors.push("schedule must not be empty when set".to_string());
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    fn minimal_yaml() -> String {
        format!(
            r#"
upstream:
  base_url: https://api.example.com
  client_id: id
  client_secret: secret
  max_results: 1000
sink:
  workspace_id: 1a2b3c
  shared_key: {KEY}
checkpoint:
  connection: /var/lib/anomaly-connector
"#
        )
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(&minimal_yaml()).unwrap();
        assert_eq!(config.upstream.event_type, "Anomaly");
        assert_eq!(config.sink.log_type, "LookoutCloudSecurity");
        assert_eq!(config.sink.endpoint(), "https://1a2b3c.ods.opinsights.azure.com");
        assert_eq!(config.checkpoint.share, "funcstatemarkershare");
        assert_eq!(config.checkpoint.file, "Anomalyfuncmarkerfile");
        assert_eq!(config.run.fetch_delay_minutes, 5);
        assert_eq!(config.run.past_days, 7);
        assert_eq!(config.run.max_event_count, 10_000);
        assert_eq!(config.run.chunk_size, 20_000);
        assert_eq!(config.run.workers, 1);
        assert_eq!(config.run.segments, 1);
    }

    #[test]
    fn test_durations_use_humantime() {
        let yaml = format!(
            "{}run:\n  run_timeout: 2m\n  chunk_size: 500\n",
            minimal_yaml()
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.run.run_timeout, std::time::Duration::from_secs(120));
        assert_eq!(config.run.chunk_size, 500);
        assert_eq!(config.run.max_event_count, 10_000);
    }

    #[test]
    fn test_unexpanded_env_var_is_reported() {
        let yaml = minimal_yaml().replace(
            "client_secret: secret",
            "client_secret: $env{ANOMALY_CONNECTOR_TEST_NEVER_SET}",
        );
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("ANOMALY_CONNECTOR_TEST_NEVER_SET"));
    }

    #[test]
    fn test_rejects_foreign_sink_endpoint() {
        let yaml = minimal_yaml().replace(
            "  workspace_id: 1a2b3c\n",
            "  workspace_id: 1a2b3c\n  endpoint: https://collector.example.net\n",
        );
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("invalid log analytics endpoint"));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let yaml = format!(
            "{}run:\n  chunk_size: 0\n  workers: 0\n",
            minimal_yaml().replace(KEY, "not-base64!")
        );
        match parse_config(&yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 3, "{:?}", errors);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
