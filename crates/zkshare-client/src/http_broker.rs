//! [`BrokerClient`] over the broker's HTTP API.
//!
//! Status mapping:
//!
//! | response                  | issue                 | redeem                |
//! |---------------------------|-----------------------|-----------------------|
//! | 2xx                       | token                 | share                 |
//! | 404                       | `BrokerRejected`      | `TokenNotFound`       |
//! | 400, 413, 415, 422, 429   | `BrokerRejected`      | `BrokerRejected`      |
//! | other 4xx (408, ...)      | `BrokerRejected`      | `BrokerUnavailable`   |
//! | 5xx, undecodable body     | `BrokerUnavailable`   | `BrokerUnavailable`   |
//! | no response               | `BrokerUnavailable`   | `BrokerUnavailable`   |
//!
//! The server answers the statuses in the `BrokerRejected` row before the
//! broker is touched. Any other failed redemption may still have consumed the
//! token. It is reported as `BrokerUnavailable` and never retried here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use zkshare_core::{BrokerClient, IssuedToken, ShareError};
use zkshare_proto::{
    LookupId, SecretShare,
    wire::{
        ErrorResponse, IssueTokenRequest, IssueTokenResponse, RedeemTokenRequest,
        RedeemTokenResponse,
    },
};

use crate::error::ClientError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Broker reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBroker {
    /// Broker at `base_url` (e.g. `http://localhost:3001`).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::InvalidBrokerUrl(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    /// Broker at `base_url` using a preconfigured client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBrokerUrl(format!(
                "{base_url:?} must start with http:// or https://"
            )));
        }
        Ok(Self { client, base_url: base_url.to_string() })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl BrokerClient for HttpBroker {
    async fn issue_token(&self, ttl: Option<Duration>) -> Result<IssuedToken, ShareError> {
        let request = IssueTokenRequest { ttl_hours: None, ttl_secs: ttl.map(|ttl| ttl.as_secs()) };

        let response = self
            .client
            .post(self.endpoint("/api/tokens"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ShareError::BrokerUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let body: IssueTokenResponse = response
            .json()
            .await
            .map_err(|e| ShareError::BrokerUnavailable(format!("invalid issue response: {e}")))?;

        Ok(IssuedToken {
            lookup_id: body.lookup_id,
            secret_share: body.secret_share,
            expires_at_secs: body.expires_at,
        })
    }

    async fn redeem_token(&self, lookup_id: &LookupId) -> Result<SecretShare, ShareError> {
        let request = RedeemTokenRequest { lookup_id: lookup_id.as_str().to_string() };

        let response = self
            .client
            .post(self.endpoint("/api/redeem"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redemption outcome unknown");
                ShareError::BrokerUnavailable(format!("redemption outcome unknown: {e}"))
            })?;

        match response.status() {
            status if status.is_success() => {
                let body: RedeemTokenResponse = response.json().await.map_err(|e| {
                    ShareError::BrokerUnavailable(format!("invalid redeem response: {e}"))
                })?;
                Ok(body.secret_share)
            },
            StatusCode::NOT_FOUND => Err(ShareError::TokenNotFound),
            status if refused_before_redeem(status) => Err(failure(response).await),
            status => {
                let message = failure_message(response).await;
                tracing::warn!(%status, "redemption outcome unknown");
                Err(ShareError::BrokerUnavailable(format!("redemption outcome unknown: {message}")))
            },
        }
    }
}

/// Statuses the server sends before a redemption reaches the broker.
fn refused_before_redeem(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY
            | StatusCode::TOO_MANY_REQUESTS
    )
}

/// Map a non-success response to a broker error.
async fn failure(response: Response) -> ShareError {
    let status = response.status();
    let message = failure_message(response).await;

    if status.is_client_error() {
        ShareError::BrokerRejected(message)
    } else {
        ShareError::BrokerUnavailable(message)
    }
}

/// Status line plus the server's error body, when it has one.
async fn failure_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => match body.retry_after {
            Some(secs) => format!("{status}: {} (retry after {secs}s)", body.error),
            None => format!("{status}: {}", body.error),
        },
        Err(_) => status.to_string(),
    }
}
