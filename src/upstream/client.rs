use super::window::Window;
use crate::config::types::UpstreamConfig;
use crate::event::AnomalyEvent;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AUTH_PATH: &str = "/apigw/v1/authenticate";
pub const EVENTS_PATH: &str = "/apigw/v1/events";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("authentication failed: {message}")]
    Auth {
        status: Option<u16>,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Bearer token returned by the authentication endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(..)")
    }
}

/// What one window fetch produced. Only `Fetched` lets the watermark move.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched {
        events: Vec<AnomalyEvent>,
        /// The response hit `max_results`; later events in the window may
        /// not have been returned.
        truncated: bool,
    },
    /// 400: the account's plan does not include this report.
    UnsupportedPlan,
    /// Any other non-2xx status, transport or decode failure.
    Failed {
        status: Option<u16>,
        message: String,
    },
}

#[derive(Debug, Serialize)]
struct AuthenticateRequest<'a> {
    #[serde(rename = "clientId")]
    client_id: &'a str,
    #[serde(rename = "clientSecret")]
    client_secret: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    data: Option<Vec<AnomalyEvent>>,
}

enum Attempt {
    Done(FetchOutcome),
    Unauthorized,
}

/// HTTP client for the security-events API.
///
/// Each run unit owns its client; the token lives here rather than in any
/// shared state.
#[derive(Debug)]
pub struct UpstreamClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    token: Option<Token>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            client,
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange the client credentials for a bearer token and keep it for
    /// subsequent fetches.
    pub async fn authenticate(&mut self) -> Result<Token> {
        let url = format!("{}{}", self.base_url, AUTH_PATH);
        let body = AuthenticateRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            grant_type: "refresh_token",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Auth {
                status: None,
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpstreamError::Auth {
                status: Some(status.as_u16()),
                message: format!("authentication endpoint returned {}", status.as_u16()),
            });
        }

        let payload: AuthenticateResponse =
            response.json().await.map_err(|e| UpstreamError::Auth {
                status: Some(status.as_u16()),
                message: format!("malformed authentication response: {}", e),
            })?;

        let token = payload
            .id_token
            .filter(|t| !t.is_empty())
            .map(Token)
            .ok_or_else(|| UpstreamError::Auth {
                status: Some(status.as_u16()),
                message: "authentication response has no id_token".to_string(),
            })?;

        tracing::debug!("Obtained upstream bearer token");
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Fetch one window of events.
    ///
    /// A 401 triggers a single re-authentication and retry; a second 401 is
    /// an authentication error. Every other failure is reported through
    /// `FetchOutcome` and never returned as `Err`.
    pub async fn fetch_events(
        &mut self,
        event_type: &str,
        window: &Window,
        max_results: u32,
    ) -> Result<FetchOutcome> {
        if self.token.is_none() {
            self.authenticate().await?;
        }

        match self.fetch_once(event_type, window, max_results).await {
            Attempt::Done(outcome) => return Ok(outcome),
            Attempt::Unauthorized => {
                tracing::warn!("Unauthorized, invalid access token; re-authenticating");
            }
        }

        self.authenticate().await?;

        match self.fetch_once(event_type, window, max_results).await {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::Unauthorized => {
                tracing::error!("Unauthorized after re-authentication");
                Err(UpstreamError::Auth {
                    status: Some(StatusCode::UNAUTHORIZED.as_u16()),
                    message: "event fetch rejected the refreshed token".to_string(),
                })
            }
        }
    }

    async fn fetch_once(&self, event_type: &str, window: &Window, max_results: u32) -> Attempt {
        let url = format!("{}{}", self.base_url, EVENTS_PATH);
        let token = self.token.as_ref().map(Token::as_str).unwrap_or_default();

        tracing::info!(
            url = %url,
            event_type,
            start = %window.start,
            end = %window.end,
            max_results,
            "Fetching events"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("eventType", event_type.to_string()),
                ("startTime", window.start.to_string()),
                ("endTime", window.end.to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .bearer_auth(token)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Event fetch request failed");
                return Attempt::Done(FetchOutcome::Failed {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => {
                tracing::error!(
                    status = status.as_u16(),
                    "The requested report cannot be generated for this account's plan"
                );
                return Attempt::Done(FetchOutcome::UnsupportedPlan);
            }
            StatusCode::UNAUTHORIZED => return Attempt::Unauthorized,
            other => {
                let message = response.text().await.unwrap_or_default();
                tracing::error!(status = other.as_u16(), message = %message, "Event fetch failed");
                return Attempt::Done(FetchOutcome::Failed {
                    status: Some(other.as_u16()),
                    message,
                });
            }
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read event response body");
                return Attempt::Done(FetchOutcome::Failed {
                    status: Some(status.as_u16()),
                    message: e.to_string(),
                });
            }
        };

        match serde_json::from_slice::<EventsResponse>(&body) {
            Ok(parsed) => {
                let events = parsed.data.unwrap_or_default();
                let truncated = max_results > 0 && events.len() >= max_results as usize;
                if truncated {
                    tracing::warn!(
                        events = events.len(),
                        max_results,
                        "Fetch returned max_results events, window may not be drained"
                    );
                }
                Attempt::Done(FetchOutcome::Fetched { events, truncated })
            }
            Err(e) => {
                tracing::error!(error = %e, "Malformed event response");
                Attempt::Done(FetchOutcome::Failed {
                    status: Some(status.as_u16()),
                    message: format!("malformed event response: {}", e),
                })
            }
        }
    }
}
