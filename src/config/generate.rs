pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# ANOMALY CONNECTOR CONFIGURATION
# =============================================================================
# Polls the security-events API for anomaly records and forwards them to a
# Log Analytics workspace. Each invocation performs exactly one run; schedule
# it with cron, a systemd timer or your platform's timer trigger.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/anomaly-connector/config.yml
#   3. /etc/anomaly-connector/config.yml
# Without a config file, settings are read from environment variables
# (ClientId, ApiSecret, WorkspaceId, WorkspaceKey, StorageConnectionString,
# Baseurl, MaxResults, FetchDelay, PastDays, ...).
#
# Any value may reference an environment variable as $env{...} with the
# variable name between the braces.

# =============================================================================
# UPSTREAM
# =============================================================================
upstream:
  base_url: https://api.lookout.com
  client_id: $env{ClientId}
  client_secret: $env{ApiSecret}
  event_type: Anomaly
  # Upper bound on records returned for one window
  max_results: 10000
  request_timeout: 30s

# =============================================================================
# SINK
# =============================================================================
sink:
  workspace_id: $env{WorkspaceId}
  # Base64 workspace key used to sign requests
  shared_key: $env{WorkspaceKey}
  # Ingestion endpoint is https://<workspace_id>.ods.opinsights.<domain>
  domain: azure.com
  # Custom log table the records land in
  log_type: LookoutCloudSecurity
  request_timeout: 30s

# =============================================================================
# CHECKPOINT
# =============================================================================
# connection forms:
#   /var/lib/anomaly-connector         marker file at <dir>/<share>/<file>
#   file:///var/lib/anomaly-connector  same as above
#   duckdb:///var/lib/anomaly-connector/state.duckdb
checkpoint:
  connection: /var/lib/anomaly-connector
  share: funcstatemarkershare
  file: Anomalyfuncmarkerfile

# =============================================================================
# RUN
# =============================================================================
run:
  # Minutes subtracted from "now" so not-yet-committed records are skipped
  fetch_delay_minutes: 5
  # Look-back used when no checkpoint exists yet
  past_days: 7
  # Fetches up to this size are sent as a single request
  max_event_count: 10000
  # Larger fetches are sorted and sent in chunks of at most this size
  chunk_size: 20000
  # Sub-windows fetched per run and the tasks that work them
  segments: 1
  workers: 1
  run_timeout: 10m

# Trigger spec for the external scheduler (informational)
schedule: "0 */10 * * * *"
"#
    .to_string()
}
