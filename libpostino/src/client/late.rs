//! HTTP client for the LATE publishing API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;
use tracing::debug;

use super::{CreatePostRequest, PublishClient, PublishReceipt, RemoteAccount};
use crate::config::ApiConfig;
use crate::error::{PostinoError, PublishError, Result};

pub struct LateClient {
    http: reqwest::Client,
    base_url: String,
}

impl LateClient {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api.key))
            .map_err(|_| PostinoError::InvalidInput("API key contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(PublishError::Api {
            status: status.as_u16(),
            detail,
        }
        .into())
    }
}

fn transport_error(e: reqwest::Error) -> PostinoError {
    if e.is_timeout() {
        PublishError::Timeout(e.to_string()).into()
    } else {
        PublishError::Network(e.to_string()).into()
    }
}

#[async_trait]
impl PublishClient for LateClient {
    async fn create_post(&self, request: &CreatePostRequest) -> Result<PublishReceipt> {
        debug!(
            platforms = request.platforms.len(),
            scheduled_for = ?request.scheduled_for,
            "submitting post to publish service"
        );

        let response = self
            .http
            .post(self.url("/posts"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_status(response).await?;
        let raw: serde_json::Value = response.json().await.map_err(transport_error)?;
        Ok(PublishReceipt::from_response(raw))
    }

    async fn get_post(&self, remote_id: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(self.url(&format!("/posts/{remote_id}")))
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_status(response).await?;
        response.json().await.map_err(transport_error)
    }

    async fn delete_post(&self, remote_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/posts/{remote_id}")))
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>> {
        let response = self
            .http
            .get(self.url("/accounts"))
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_status(response).await?;
        let body: serde_json::Value = response.json().await.map_err(transport_error)?;

        // The accounts endpoint wraps its list in an "accounts" field; accept
        // a bare array too.
        let accounts = body
            .get("accounts")
            .cloned()
            .unwrap_or(body);
        serde_json::from_value(accounts)
            .map_err(|e| PublishError::Network(format!("unexpected accounts payload: {e}")).into())
    }
}
