use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Binary approval oracle for external-funds operations: card payments,
/// card reversals, and deposits. The contract is deliberately bare (no
/// amount, purpose, or idempotency key) and fail-closed: an unreachable
/// or erroring authorizer means "do not move money".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizerGateway: Send + Sync {
    async fn is_approved(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct AuthorizerResponse {
    data: Option<AuthorizerData>,
}

#[derive(Debug, Deserialize)]
struct AuthorizerData {
    authorized: bool,
}

/// Adapter for the remote authorizer service. Requests are bounded by
/// the configured timeout; any transport or decoding failure is logged
/// and reported as a decline.
pub struct HttpAuthorizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthorizer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self) -> std::result::Result<bool, reqwest::Error> {
        let response: AuthorizerResponse = self
            .client
            .get(format!("{}/authorizer", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data.map(|d| d.authorized).unwrap_or(false))
    }
}

#[async_trait]
impl AuthorizerGateway for HttpAuthorizer {
    async fn is_approved(&self) -> bool {
        let approved = match self.fetch().await {
            Ok(approved) => {
                tracing::debug!(approved, "authorizer responded");
                approved
            }
            Err(err) => {
                tracing::warn!(error = %err, "authorizer unreachable, failing closed");
                false
            }
        };
        crate::observability::get_metrics().record_authorizer_decision(approved);
        approved
    }
}

/// Fixed-outcome authorizer for tests and offline runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticAuthorizer {
    approved: bool,
}

impl StaticAuthorizer {
    pub fn approving() -> Self {
        Self { approved: true }
    }

    pub fn declining() -> Self {
        Self { approved: false }
    }
}

#[async_trait]
impl AuthorizerGateway for StaticAuthorizer {
    async fn is_approved(&self) -> bool {
        self.approved
    }
}
