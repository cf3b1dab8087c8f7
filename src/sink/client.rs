use super::signature::{rfc1123_date, SharedKeySigner, SignatureError};
use crate::config::types::SinkConfig;
use crate::event::AnomalyEvent;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;

pub const RESOURCE: &str = "/api/logs";
pub const API_VERSION: &str = "2016-04-01";
const METHOD: &str = "POST";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("request signing setup failed: {0}")]
    Signature(#[from] SignatureError),
}

/// Accepted vs rejected record counts for one or more sink requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub requests: usize,
}

impl DeliveryOutcome {
    pub fn accepted(count: usize) -> Self {
        Self {
            succeeded: count,
            failed: 0,
            requests: 1,
        }
    }

    pub fn rejected(count: usize) -> Self {
        Self {
            succeeded: 0,
            failed: count,
            requests: 1,
        }
    }

    pub fn merge(&mut self, other: DeliveryOutcome) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.requests += other.requests;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// HTTP client for the Log Analytics data collector endpoint.
#[derive(Debug)]
pub struct LogAnalyticsClient {
    uri: String,
    log_type: String,
    signer: SharedKeySigner,
    client: reqwest::Client,
}

impl LogAnalyticsClient {
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            uri: format!("{}{}?api-version={}", config.endpoint(), RESOURCE, API_VERSION),
            log_type: config.log_type.clone(),
            signer: SharedKeySigner::new(&config.workspace_id, &config.shared_key)?,
            client,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Send `records` as one signed request. Never retried; any failure
    /// counts every record as rejected.
    pub async fn post_batch(&self, records: &[AnomalyEvent]) -> DeliveryOutcome {
        let count = records.len();

        let body = match serde_json::to_vec(records) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, events = count, "Failed to serialize batch");
                return DeliveryOutcome::rejected(count);
            }
        };

        let date = rfc1123_date(Utc::now());
        let signature = self
            .signer
            .sign(&date, body.len(), METHOD, JSON_CONTENT_TYPE, RESOURCE);

        let response = self
            .client
            .post(&self.uri)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, signature)
            .header("Log-Type", &self.log_type)
            .header("x-ms-date", &date)
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::info!(events = count, "Chunk was processed");
                DeliveryOutcome::accepted(count)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                tracing::error!(
                    status,
                    events = count,
                    message = %message,
                    "Error sending events to the log sink"
                );
                DeliveryOutcome::rejected(count)
            }
            Err(e) => {
                tracing::error!(error = %e, events = count, "Log sink request failed");
                DeliveryOutcome::rejected(count)
            }
        }
    }
}
