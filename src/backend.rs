//! HTTP backend API client.
//!
//! The mailbox application exposes the user directory and message storage
//! over HTTP: `GET /auth/validate-user/{username}` answers existence checks
//! and `POST /mail/receive` stores one record, both authenticated with a
//! shared secret in the `X-API-Key` header. [`BackendClient`] implements
//! both capability traits against that API so the receiver can run with a
//! real directory and durable storage.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use ulid::Ulid;

use crate::directory::{DirectoryError, RecipientDirectory};
use crate::store::{MessageStore, StoreError, StoredRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the backend HTTP API, usable as both the recipient directory
/// and the message store.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ValidateUserResponse {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct StoreResponse {
    uid: String,
}

impl BackendClient {
    /// Creates a client for the API at `base_url`, authenticating every
    /// request with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Lookup`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::Lookup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }
}

#[async_trait]
impl RecipientDirectory for BackendClient {
    async fn exists(&self, local_part: &str) -> Result<bool, DirectoryError> {
        let url = format!("{}/auth/validate-user/{local_part}", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| DirectoryError::Lookup(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Lookup(format!(
                "API returned status {status} for {url}"
            )));
        }

        let body: ValidateUserResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Lookup(format!("invalid response from {url}: {e}")))?;

        Ok(body.exists)
    }
}

#[async_trait]
impl MessageStore for BackendClient {
    async fn store(&self, record: StoredRecord) -> Result<String, StoreError> {
        let url = format!("{}/mail/receive", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&record)
            .send()
            .await
            .map_err(|e| StoreError::Write(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Write(format!(
                "API returned status {status} for {url}"
            )));
        }

        // The write succeeded at this point; a response body the client
        // cannot decode should not fail the transaction.
        match response.json::<StoreResponse>().await {
            Ok(body) => Ok(body.uid),
            Err(e) => {
                warn!(error = %e, "stored record but could not parse response, generating id");
                Ok(Ulid::new().to_string())
            }
        }
    }
}
