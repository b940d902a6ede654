//! In-memory publish client used by tests and dry runs.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{CreatePostRequest, PublishClient, PublishReceipt, RemoteAccount};
use crate::error::{PublishError, Result};

#[derive(Default)]
struct MockState {
    next_error: Option<PublishError>,
    next_post_id: Option<String>,
    created: Vec<CreatePostRequest>,
    deleted: Vec<String>,
    fail_delete: bool,
}

/// Records every request instead of talking to the network.
#[derive(Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next create_post call fail with the given error.
    pub fn fail_next(&self, error: PublishError) {
        self.state.lock().unwrap().next_error = Some(error);
    }

    /// Set the remote id returned by the next successful create_post call.
    pub fn set_next_post_id(&self, id: &str) {
        self.state.lock().unwrap().next_post_id = Some(id.to_string());
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_delete = true;
    }

    pub fn created_requests(&self) -> Vec<CreatePostRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl PublishClient for MockClient {
    async fn create_post(&self, request: &CreatePostRequest) -> Result<PublishReceipt> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.next_error.take() {
            return Err(error.into());
        }
        state.created.push(request.clone());
        let id = state
            .next_post_id
            .take()
            .unwrap_or_else(|| format!("mock-{}", state.created.len()));
        let raw = serde_json::json!({"post": {"id": id, "status": "scheduled"}});
        Ok(PublishReceipt::from_response(raw))
    }

    async fn get_post(&self, remote_id: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({"id": remote_id, "status": "scheduled"}))
    }

    async fn delete_post(&self, remote_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(PublishError::Api {
                status: 404,
                detail: "post not found".to_string(),
            }
            .into());
        }
        state.deleted.push(remote_id.to_string());
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>> {
        Ok(vec![
            RemoteAccount {
                id: "mock-facebook".to_string(),
                platform: "facebook".to_string(),
                username: Some("mock".to_string()),
            },
            RemoteAccount {
                id: "mock-twitter".to_string(),
                platform: "twitter".to_string(),
                username: Some("mock".to_string()),
            },
        ])
    }
}
