//! `ActivityPub` HTTP client.
//!
//! [`ApTransport`] is the seam between federation logic and the network;
//! [`ApClient`] is the reqwest implementation.

#![allow(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;
use vitrine_common::{AppError, SignatureError, config::FederationConfig};

use crate::signature::HttpSigner;

const ACTIVITY_JSON: &str = "application/activity+json";
const ACCEPT_ACTIVITY: &str =
    r#"application/activity+json, application/ld+json; profile="https://www.w3.org/ns/activitystreams""#;

/// Largest media body downloaded for avatars and headers.
const MAX_MEDIA_BYTES: usize = 8 * 1024 * 1024;

/// Error type for AP client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Signing failed: {0}")]
    Signing(#[from] SignatureError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Remote object is gone")]
    Gone,
    #[error("Request failed: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl ApClientError {
    /// A 410: the remote side deleted the target, retrying cannot help.
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }

    /// Failures that will not change on retry: the remote answered with a
    /// client error or with something that is not an object.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Gone | Self::InvalidUrl(_) | Self::InvalidBody(_) => true,
            Self::Status { status, .. } => {
                matches!(*status, 400..=499) && *status != 408 && *status != 429
            }
            Self::Http(_) | Self::Signing(_) => false,
        }
    }
}

impl From<ApClientError> for AppError {
    fn from(err: ApClientError) -> Self {
        match err {
            ApClientError::Signing(e) => e.into(),
            ApClientError::InvalidUrl(e) => Self::BadRequest(e),
            other => Self::Federation(other.to_string()),
        }
    }
}

/// Downloaded media.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub content_type: String,
    pub data: Bytes,
}

/// Network operations the federation core needs.
#[async_trait]
pub trait ApTransport: Send + Sync {
    /// Signed GET of an `ActivityPub` document.
    async fn fetch_object(&self, url: &Url, signer: &HttpSigner) -> Result<Value, ApClientError>;

    /// Unsigned GET of a media file.
    async fn fetch_media(&self, url: &Url) -> Result<FetchedMedia, ApClientError>;

    /// Signed POST of an activity to an inbox.
    async fn post_activity(
        &self,
        inbox: &Url,
        body: Bytes,
        signer: &HttpSigner,
    ) -> Result<(), ApClientError>;
}

/// `ActivityPub` HTTP client.
#[derive(Clone)]
pub struct ApClient {
    client: Client,
}

impl ApClient {
    /// Create a new AP client with the configured timeout and user agent.
    pub fn new(config: &FederationConfig) -> Result<Self, ApClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(config.http_timeout_secs.min(10)))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

fn status_error(status: StatusCode, body: String) -> ApClientError {
    if status == StatusCode::GONE {
        ApClientError::Gone
    } else {
        ApClientError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl ApTransport for ApClient {
    async fn fetch_object(&self, url: &Url, signer: &HttpSigner) -> Result<Value, ApClientError> {
        debug!(url = %url, "Fetching remote object");

        let headers = signer.sign_request("GET", url, None)?;
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .header("Accept", ACCEPT_ACTIVITY)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| ApClientError::InvalidBody(e.to_string()))
    }

    async fn fetch_media(&self, url: &Url) -> Result<FetchedMedia, ApClientError> {
        debug!(url = %url, "Fetching remote media");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, String::new()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = response.bytes().await?;
        if data.len() > MAX_MEDIA_BYTES {
            return Err(ApClientError::InvalidBody(format!(
                "media is {} bytes, limit is {MAX_MEDIA_BYTES}",
                data.len()
            )));
        }

        Ok(FetchedMedia { content_type, data })
    }

    async fn post_activity(
        &self,
        inbox: &Url,
        body: Bytes,
        signer: &HttpSigner,
    ) -> Result<(), ApClientError> {
        let headers = signer.sign_request("POST", inbox, Some(body.as_ref()))?;

        let response = self
            .client
            .post(inbox.clone())
            .headers(headers)
            .header("Content-Type", ACTIVITY_JSON)
            .header("Accept", ACCEPT_ACTIVITY)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(inbox = %inbox, status = %status, "Activity delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(inbox = %inbox, status = %status, "Activity delivery failed");
        Err(status_error(status, body))
    }
}
