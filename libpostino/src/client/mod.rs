//! Publishing service client abstraction.
//!
//! All outbound publication goes through [`PublishClient`], so binaries and
//! tests can swap the HTTP implementation for a mock.

pub mod late;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::MediaKind;

/// One platform entry in the fan-out set of a create request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTarget {
    pub platform: String,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

/// The single publish-service call that fans a post out to every bound
/// platform at once.
///
/// `scheduled_for` is optional on the wire: omitting it asks the service to
/// publish immediately, which is what the dispatcher wants for a post whose
/// time has already arrived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub platforms: Vec<PlatformTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_items: Option<Vec<MediaItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// What the publish service told us about an accepted post.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Remote identifier, when the response carried one.
    pub post_id: Option<String>,
    /// Full response body, retained verbatim for the audit trail.
    pub raw: serde_json::Value,
}

impl PublishReceipt {
    pub fn from_response(raw: serde_json::Value) -> Self {
        let post_id = raw
            .get("post")
            .and_then(|p| p.get("id").or_else(|| p.get("_id")))
            .or_else(|| raw.get("id"))
            .or_else(|| raw.get("_id"))
            .and_then(|v| v.as_str())
            .map(String::from);
        Self { post_id, raw }
    }
}

/// A platform account registered with the publish service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAccount {
    #[serde(alias = "_id")]
    pub id: String,
    pub platform: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Submit a post for publication across its fan-out set.
    async fn create_post(&self, request: &CreatePostRequest) -> Result<PublishReceipt>;

    /// Fetch the remote representation of a previously created post.
    async fn get_post(&self, remote_id: &str) -> Result<serde_json::Value>;

    /// Cancel a post that the remote service has not yet published.
    async fn delete_post(&self, remote_id: &str) -> Result<()>;

    /// List the platform accounts connected to this API key.
    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>>;
}
