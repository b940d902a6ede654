//! Publish dispatcher: fans a due post out to the publishing service and
//! reconciles the outcome into post state plus per-platform logs.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{CreatePostRequest, MediaItem, PlatformTarget, PublishClient};
use crate::config::Config;
use crate::content::format_for_dispatch;
use crate::db::Database;
use crate::error::{PostinoError, Result};
use crate::types::{MediaKind, Platform, Post, PostStatus, PublicationLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Published,
    Failed,
}

/// Result of cancelling a post, including how the remote side went.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub remote_cancelled: bool,
    pub remote_error: Option<String>,
}

pub struct Dispatcher {
    db: Database,
    config: Arc<Config>,
    client: Arc<dyn PublishClient>,
}

impl Dispatcher {
    pub fn new(db: Database, config: Arc<Config>, client: Arc<dyn PublishClient>) -> Self {
        Self { db, config, client }
    }

    /// Dispatch one post: a single service call covering its whole fan-out
    /// set, then one atomic state transition with per-platform logs.
    ///
    /// The post either becomes published with a success log per dispatched
    /// platform, or failed with a failure log per platform. Partial outcomes
    /// do not exist at this level.
    pub async fn dispatch(&self, post: &Post) -> Result<DispatchOutcome> {
        if post.status != PostStatus::Scheduled {
            return Err(PostinoError::StateConflict {
                post_id: post.id.clone(),
                status: post.status.to_string(),
            });
        }

        // Claim the post before the external call. Only one claimant wins,
        // so a post is never handed to the service twice.
        if !self.db.claim_for_dispatch(&post.id).await? {
            let status = self
                .db
                .get_post(&post.id)
                .await?
                .map(|p| p.status.to_string())
                .unwrap_or_else(|| "deleted".to_string());
            return Err(PostinoError::StateConflict {
                post_id: post.id.clone(),
                status,
            });
        }

        let targets = self.build_targets(post);
        if targets.is_empty() {
            warn!(post_id = %post.id, "no platform in the fan-out set has a bound account");
            return self
                .record_failure(post, &post.platforms, "no bound platform accounts".to_string())
                .await;
        }

        let dispatched: Vec<Platform> = targets.iter().map(|(p, _)| *p).collect();
        let request = self.build_request(post, targets);

        match self.client.create_post(&request).await {
            Ok(receipt) => {
                let now = Utc::now().timestamp();
                let mut updated = post.clone();
                updated.status = PostStatus::Published;
                updated.published_at = Some(now);
                updated.external_post_id = receipt.post_id.clone();
                updated.error_message = None;
                updated.updated_at = now;

                let snapshot = receipt.raw.to_string();
                let logs: Vec<PublicationLog> = dispatched
                    .iter()
                    .map(|&platform| PublicationLog::success(&post.id, platform, snapshot.clone()))
                    .collect();

                self.db.finalize_dispatch(&updated, &logs).await?;
                info!(
                    post_id = %post.id,
                    external_id = ?receipt.post_id,
                    platforms = dispatched.len(),
                    "post published"
                );
                Ok(DispatchOutcome::Published)
            }
            Err(PostinoError::Publish(e)) => {
                warn!(post_id = %post.id, error = %e, "publish service call failed");
                self.record_failure(post, &dispatched, e.to_string()).await
            }
            Err(e) => Err(e),
        }
    }

    /// Dispatch a scheduled post immediately, regardless of its timer.
    pub async fn publish_now(&self, post_id: &str) -> Result<DispatchOutcome> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| PostinoError::NotFound(post_id.to_string()))?;
        self.dispatch(&post).await
    }

    /// Remove a post locally, first asking the remote service to cancel it
    /// when it was already handed over. Remote failures are surfaced but do
    /// not block local deletion.
    pub async fn cancel_and_delete(&self, post_id: &str) -> Result<DeleteOutcome> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| PostinoError::NotFound(post_id.to_string()))?;

        let mut outcome = DeleteOutcome {
            remote_cancelled: false,
            remote_error: None,
        };

        if post.status == PostStatus::Scheduled {
            if let Some(remote_id) = &post.external_post_id {
                match self.client.delete_post(remote_id).await {
                    Ok(()) => outcome.remote_cancelled = true,
                    Err(e) => {
                        warn!(post_id = %post.id, error = %e, "remote cancellation failed");
                        outcome.remote_error = Some(e.to_string());
                    }
                }
            }
        }

        self.db.delete_post(post_id).await?;
        Ok(outcome)
    }

    /// A platform without an account binding is dropped from the fan-out
    /// rather than failing the whole post.
    fn build_targets(&self, post: &Post) -> Vec<(Platform, PlatformTarget)> {
        post.platforms
            .iter()
            .filter_map(|&platform| {
                let Some(account_id) = self.config.accounts.account_id(platform) else {
                    warn!(
                        post_id = %post.id,
                        platform = platform.as_str(),
                        "platform has no bound account, skipping"
                    );
                    return None;
                };

                let (board_id, link) = if platform == Platform::Pinterest {
                    (
                        post.pinterest_board_id
                            .clone()
                            .or_else(|| self.config.pinterest.default_board.clone()),
                        post.pinterest_link
                            .clone()
                            .or_else(|| self.config.pinterest.default_link.clone()),
                    )
                } else {
                    (None, None)
                };

                Some((
                    platform,
                    PlatformTarget {
                        platform: platform.as_str().to_string(),
                        account_id: account_id.to_string(),
                        board_id,
                        link,
                    },
                ))
            })
            .collect()
    }

    /// The post is already due by the time it gets here, so the request
    /// carries no schedule of its own and the service publishes right away.
    fn build_request(
        &self,
        post: &Post,
        targets: Vec<(Platform, PlatformTarget)>,
    ) -> CreatePostRequest {
        let platforms: Vec<Platform> = targets.iter().map(|(p, _)| *p).collect();
        let content = format_for_dispatch(&post.content, &platforms);

        let mut media = Vec::new();
        for url in [&post.image_url, &post.video_url].into_iter().flatten() {
            let resolved = self.resolve_media_url(url);
            media.push(MediaItem {
                kind: MediaKind::from_url(&resolved),
                url: resolved,
            });
        }

        CreatePostRequest {
            content,
            platforms: targets.into_iter().map(|(_, t)| t).collect(),
            media_items: if media.is_empty() { None } else { Some(media) },
            scheduled_for: None,
            timezone: None,
        }
    }

    /// Relative media paths are rewritten against the public base URL; the
    /// publishing service fetches media itself and needs absolute addresses.
    fn resolve_media_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.config.media.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/')),
            None => url.to_string(),
        }
    }

    async fn record_failure(
        &self,
        post: &Post,
        platforms: &[Platform],
        error: String,
    ) -> Result<DispatchOutcome> {
        let now = Utc::now().timestamp();
        let mut updated = post.clone();
        updated.status = PostStatus::Failed;
        updated.error_message = Some(error.clone());
        updated.updated_at = now;

        let logs: Vec<PublicationLog> = platforms
            .iter()
            .map(|&platform| PublicationLog::failure(&post.id, platform, error.clone()))
            .collect();

        self.db.finalize_dispatch(&updated, &logs).await?;
        Ok(DispatchOutcome::Failed)
    }
}
