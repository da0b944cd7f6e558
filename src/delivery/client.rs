use crate::config::types::DeliveryConfig;
use crate::delivery::{DeliveryOutcome, RecordSink};
use crate::source::record::Record;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Longest response body kept on a rejected delivery.
const MAX_ERROR_BODY_CHARS: usize = 1024;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

#[derive(Debug, Serialize)]
struct DeliveryRequest<'a> {
    entries: &'a [Record],
}

/// HTTP client posting record batches to the collector endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    endpoint: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl DeliveryClient {
    /// Every request is bounded by `config.timeout`.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }
}

#[async_trait]
impl RecordSink for DeliveryClient {
    async fn send(&self, records: &[Record]) -> DeliveryOutcome {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&DeliveryRequest { entries: records });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DeliveryOutcome::TransportError(format!("request timed out: {e}"))
            }
            Err(e) => return DeliveryOutcome::TransportError(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return DeliveryOutcome::Accepted {
                status: status.as_u16(),
            };
        }

        let body = response.text().await.unwrap_or_default();
        DeliveryOutcome::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }
}
