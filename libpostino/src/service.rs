//! Operator-facing scheduling service.
//!
//! Validation, timezone conversion and state transitions for everything an
//! operator does to the queue. Publication itself lives in the dispatcher.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{PublishClient, RemoteAccount};
use crate::config::Config;
use crate::content::{extract_hashtags, validate_length};
use crate::db::{Database, PostWithLogs};
use crate::dispatcher::{DeleteOutcome, DispatchOutcome, Dispatcher};
use crate::error::{PostinoError, Result, ValidationError};
use crate::scheduling::to_utc;
use crate::types::{Platform, Post, PostStatus};

/// Operator input for a new queue entry. Times are local wall-clock in the
/// configured timezone.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub platforms: Vec<Platform>,
    pub scheduled_local: NaiveDateTime,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub pinterest_board_id: Option<String>,
    pub pinterest_link: Option<String>,
    pub template_name: Option<String>,
    pub notes: Option<String>,
    pub draft: bool,
}

/// Partial update to an unpublished post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub content: Option<String>,
    pub platforms: Option<Vec<Platform>>,
    pub scheduled_local: Option<NaiveDateTime>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub draft: i64,
    pub scheduled: i64,
    pub published: i64,
    pub failed: i64,
    /// Earliest pending schedule time, if any post is waiting.
    pub next_due: Option<i64>,
    /// Hashtags across scheduled posts, most used first.
    pub top_hashtags: Vec<(String, usize)>,
}

pub struct SchedulerService {
    db: Database,
    config: Arc<Config>,
    client: Arc<dyn PublishClient>,
    dispatcher: Dispatcher,
}

impl SchedulerService {
    pub fn new(db: Database, config: Arc<Config>, client: Arc<dyn PublishClient>) -> Self {
        let dispatcher = Dispatcher::new(db.clone(), config.clone(), client.clone());
        Self {
            db,
            config,
            client,
            dispatcher,
        }
    }

    /// Validate and enqueue a post for future publication.
    pub async fn schedule(&self, new: NewPost) -> Result<Post> {
        validate_post_input(&new.content, &new.platforms)?;

        let tz = self.config.schedule.tz()?;
        let scheduled_at = to_utc(new.scheduled_local, tz)?.timestamp();

        let mut post = Post::new(new.content, new.platforms, scheduled_at);
        post.image_url = new.image_url;
        post.video_url = new.video_url;
        post.template_name = new.template_name;
        post.notes = new.notes;
        if post.platforms.contains(&Platform::Pinterest) {
            post.pinterest_board_id = new.pinterest_board_id;
            post.pinterest_link = new.pinterest_link;
        }
        if new.draft {
            post.status = PostStatus::Draft;
        }

        self.db.create_post(&post).await?;
        Ok(post)
    }

    /// Apply edits to a post that is not published or mid-dispatch. Editing
    /// a failed post re-arms it for the next batch pass.
    pub async fn edit(&self, post_id: &str, edit: PostEdit) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;

        if matches!(post.status, PostStatus::Published | PostStatus::Publishing) {
            return Err(PostinoError::StateConflict {
                post_id: post.id,
                status: post.status.to_string(),
            });
        }

        if let Some(content) = edit.content {
            post.content = content;
        }
        if let Some(platforms) = edit.platforms {
            post.platforms = platforms;
        }
        if let Some(local) = edit.scheduled_local {
            let tz = self.config.schedule.tz()?;
            post.scheduled_at = to_utc(local, tz)?.timestamp();
        }
        if let Some(url) = edit.image_url {
            post.image_url = Some(url);
        }
        if let Some(url) = edit.video_url {
            post.video_url = Some(url);
        }
        if let Some(notes) = edit.notes {
            post.notes = Some(notes);
        }

        validate_post_input(&post.content, &post.platforms)?;

        if post.status == PostStatus::Failed {
            post.status = PostStatus::Scheduled;
            post.error_message = None;
        }

        self.db.update_post(&post).await?;
        Ok(post)
    }

    /// Promote a draft into the live queue.
    pub async fn mark_scheduled(&self, post_id: &str) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;

        if post.status != PostStatus::Draft {
            return Err(PostinoError::StateConflict {
                post_id: post.id,
                status: post.status.to_string(),
            });
        }

        validate_post_input(&post.content, &post.platforms)?;
        post.status = PostStatus::Scheduled;
        self.db.update_post(&post).await?;
        Ok(post)
    }

    /// Move a pending or failed post to a new publish time. A failed post is
    /// re-armed in the process.
    pub async fn reschedule(&self, post_id: &str, local: NaiveDateTime) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;

        match post.status {
            PostStatus::Scheduled | PostStatus::Failed => {}
            _ => {
                return Err(PostinoError::StateConflict {
                    post_id: post.id,
                    status: post.status.to_string(),
                })
            }
        }

        let tz = self.config.schedule.tz()?;
        post.scheduled_at = to_utc(local, tz)?.timestamp();
        post.status = PostStatus::Scheduled;
        post.error_message = None;

        self.db.update_post(&post).await?;
        Ok(post)
    }

    /// Reschedule using a pre-resolved UTC timestamp.
    pub async fn reschedule_at(&self, post_id: &str, scheduled_at: i64) -> Result<Post> {
        let mut post = self.require_post(post_id).await?;

        match post.status {
            PostStatus::Scheduled | PostStatus::Failed => {}
            _ => {
                return Err(PostinoError::StateConflict {
                    post_id: post.id,
                    status: post.status.to_string(),
                })
            }
        }

        post.scheduled_at = scheduled_at;
        post.status = PostStatus::Scheduled;
        post.error_message = None;

        self.db.update_post(&post).await?;
        Ok(post)
    }

    pub async fn publish_now(&self, post_id: &str) -> Result<DispatchOutcome> {
        self.dispatcher.publish_now(post_id).await
    }

    pub async fn delete(&self, post_id: &str) -> Result<DeleteOutcome> {
        self.dispatcher.cancel_and_delete(post_id).await
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        self.require_post(post_id).await
    }

    pub async fn post_with_logs(&self, post_id: &str) -> Result<PostWithLogs> {
        self.db
            .post_with_logs(post_id)
            .await?
            .ok_or_else(|| PostinoError::NotFound(post_id.to_string()))
    }

    pub async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<Post>> {
        self.db.list_posts(status).await
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats {
            draft: self.db.count_with_status(PostStatus::Draft).await?,
            scheduled: self.db.count_with_status(PostStatus::Scheduled).await?,
            published: self.db.count_with_status(PostStatus::Published).await?,
            failed: self.db.count_with_status(PostStatus::Failed).await?,
            ..QueueStats::default()
        };

        let pending = self.db.scheduled_posts().await?;
        stats.next_due = pending.first().map(|p| p.scheduled_at);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for post in &pending {
            for tag in extract_hashtags(&post.content) {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        let mut tags: Vec<(String, usize)> = counts.into_iter().collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags.truncate(10);
        stats.top_hashtags = tags;

        Ok(stats)
    }

    pub async fn list_accounts(&self) -> Result<Vec<RemoteAccount>> {
        self.client.list_accounts().await
    }

    /// Remote-side view of a post that was handed to the publishing service.
    pub async fn remote_post(&self, post_id: &str) -> Result<serde_json::Value> {
        let post = self.require_post(post_id).await?;
        let remote_id = post.external_post_id.ok_or_else(|| {
            PostinoError::InvalidInput(format!("post {post_id} was never sent to the service"))
        })?;
        self.client.get_post(&remote_id).await
    }

    async fn require_post(&self, post_id: &str) -> Result<Post> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or_else(|| PostinoError::NotFound(post_id.to_string()))
    }
}

fn validate_post_input(content: &str, platforms: &[Platform]) -> Result<()> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent.into());
    }
    if platforms.is_empty() {
        return Err(ValidationError::NoPlatforms.into());
    }
    for &platform in platforms {
        validate_length(content, platform)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockClient;
    use crate::config::{
        AccountsConfig, ApiConfig, DatabaseConfig, MediaConfig, PinterestConfig, ScheduleConfig,
    };
    use crate::types::LogStatus;
    use chrono::NaiveDate;

    fn rome_config() -> Arc<Config> {
        Arc::new(Config {
            api: ApiConfig {
                key: "test".to_string(),
                base_url: "https://api.getlate.dev/v1".to_string(),
                timeout_secs: 5,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            accounts: AccountsConfig {
                facebook: Some("fb-1".to_string()),
                instagram: Some("ig-1".to_string()),
                linkedin: Some("li-1".to_string()),
                twitter: Some("tw-1".to_string()),
                pinterest: Some("pin-1".to_string()),
            },
            pinterest: PinterestConfig::default(),
            media: MediaConfig::default(),
            schedule: ScheduleConfig {
                timezone: "Europe/Rome".to_string(),
            },
        })
    }

    async fn test_service() -> (Arc<MockClient>, SchedulerService) {
        let pool = sqlx::sqlite::SqlitePool::connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let db = Database { pool };
        let client = Arc::new(MockClient::new());
        let service = SchedulerService::new(db, rome_config(), client.clone());
        (client, service)
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn new_post(content: &str, platforms: Vec<Platform>) -> NewPost {
        NewPost {
            content: content.to_string(),
            platforms,
            scheduled_local: local(2025, 3, 10, 9, 0),
            image_url: None,
            video_url: None,
            pinterest_board_id: None,
            pinterest_link: None,
            template_name: None,
            notes: None,
            draft: false,
        }
    }

    #[tokio::test]
    async fn test_schedule_converts_rome_wall_clock_to_utc() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("Buongiorno", vec![Platform::Facebook]))
            .await
            .unwrap();

        // 09:00 Rome in March (CET) is 08:00 UTC
        assert_eq!(post.scheduled_at, 1_741_593_600);
        assert_eq!(post.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_schedule_rejects_over_limit_content() {
        let (_client, service) = test_service().await;

        let long = "x".repeat(300);
        let err = service
            .schedule(new_post(&long, vec![Platform::Facebook, Platform::Twitter]))
            .await
            .unwrap_err();

        match err {
            PostinoError::Validation(ValidationError::TooLong {
                platform,
                limit,
                actual,
            }) => {
                assert_eq!(platform, Platform::Twitter);
                assert_eq!(limit, 280);
                assert_eq!(actual, 300);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_schedule_rejects_empty_content_and_platforms() {
        let (_client, service) = test_service().await;

        let err = service
            .schedule(new_post("   ", vec![Platform::Facebook]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PostinoError::Validation(ValidationError::EmptyContent)
        ));

        let err = service.schedule(new_post("ciao", vec![])).await.unwrap_err();
        assert!(matches!(
            err,
            PostinoError::Validation(ValidationError::NoPlatforms)
        ));
    }

    #[tokio::test]
    async fn test_pinterest_fields_dropped_when_not_targeted() {
        let (_client, service) = test_service().await;

        let mut input = new_post("ciao", vec![Platform::Facebook]);
        input.pinterest_board_id = Some("board-1".to_string());
        let post = service.schedule(input).await.unwrap();
        assert!(post.pinterest_board_id.is_none());

        let mut input = new_post("pin", vec![Platform::Pinterest]);
        input.pinterest_board_id = Some("board-1".to_string());
        let post = service.schedule(input).await.unwrap();
        assert_eq!(post.pinterest_board_id.as_deref(), Some("board-1"));
    }

    #[tokio::test]
    async fn test_draft_flow() {
        let (_client, service) = test_service().await;

        let mut input = new_post("bozza", vec![Platform::Facebook]);
        input.draft = true;
        let post = service.schedule(input).await.unwrap();
        assert_eq!(post.status, PostStatus::Draft);

        let promoted = service.mark_scheduled(&post.id).await.unwrap();
        assert_eq!(promoted.status, PostStatus::Scheduled);

        // already scheduled, promoting again is a conflict
        let err = service.mark_scheduled(&post.id).await.unwrap_err();
        assert!(matches!(err, PostinoError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_edit_refuses_published_post() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.publish_now(&post.id).await.unwrap();

        let err = service
            .edit(&post.id, PostEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PostinoError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_edit_refuses_post_mid_dispatch() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.db.claim_for_dispatch(&post.id).await.unwrap();

        let err = service
            .edit(&post.id, PostEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PostinoError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_edit_rearms_failed_post() {
        let (client, service) = test_service().await;
        client.fail_next(crate::error::PublishError::Timeout("slow".to_string()));

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.publish_now(&post.id).await.unwrap();
        assert_eq!(
            service.get_post(&post.id).await.unwrap().status,
            PostStatus::Failed
        );

        let edited = service
            .edit(
                &post.id,
                PostEdit {
                    content: Some("riprova".to_string()),
                    ..PostEdit::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, PostStatus::Scheduled);
        assert!(edited.error_message.is_none());
    }

    #[tokio::test]
    async fn test_reschedule_moves_time_and_rearms() {
        let (client, service) = test_service().await;
        client.fail_next(crate::error::PublishError::Network("down".to_string()));

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.publish_now(&post.id).await.unwrap();

        let moved = service
            .reschedule(&post.id, local(2025, 7, 1, 18, 30))
            .await
            .unwrap();
        assert_eq!(moved.status, PostStatus::Scheduled);
        // 18:30 Rome in July (CEST) is 16:30 UTC
        assert_eq!(moved.scheduled_at, 1_751_387_400);
    }

    #[tokio::test]
    async fn test_reschedule_refuses_published() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.publish_now(&post.id).await.unwrap();

        let err = service
            .reschedule_at(&post.id, 2_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, PostinoError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn test_publish_now_writes_logs() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("subito", vec![Platform::Facebook, Platform::Twitter]))
            .await
            .unwrap();
        let outcome = service.publish_now(&post.id).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Published);

        let with_logs = service.post_with_logs(&post.id).await.unwrap();
        assert_eq!(with_logs.post.status, PostStatus::Published);
        assert_eq!(with_logs.logs.len(), 2);
        assert!(with_logs.logs.iter().all(|l| l.status == LogStatus::Success));
    }

    #[tokio::test]
    async fn test_delete_removes_post() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("via", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.delete(&post.id).await.unwrap();

        let err = service.get_post(&post.id).await.unwrap_err();
        assert!(matches!(err, PostinoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let (_client, service) = test_service().await;

        let mut early = new_post("primo #ambiente #natura", vec![Platform::Facebook]);
        early.scheduled_local = local(2025, 3, 10, 8, 0);
        let mut late_input = new_post("secondo #ambiente", vec![Platform::Facebook]);
        late_input.scheduled_local = local(2025, 3, 10, 10, 0);

        let first = service.schedule(early).await.unwrap();
        service.schedule(late_input).await.unwrap();

        let published = service
            .schedule(new_post("fatto", vec![Platform::Facebook]))
            .await
            .unwrap();
        service.publish_now(&published.id).await.unwrap();

        let stats = service.queue_stats().await.unwrap();
        assert_eq!(stats.scheduled, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.next_due, Some(first.scheduled_at));
        assert_eq!(stats.top_hashtags[0], ("#ambiente".to_string(), 2));
    }

    #[tokio::test]
    async fn test_remote_post_requires_external_id() {
        let (_client, service) = test_service().await;

        let post = service
            .schedule(new_post("ciao", vec![Platform::Facebook]))
            .await
            .unwrap();

        let err = service.remote_post(&post.id).await.unwrap_err();
        assert!(matches!(err, PostinoError::InvalidInput(_)));

        service.publish_now(&post.id).await.unwrap();
        let remote = service.remote_post(&post.id).await.unwrap();
        assert!(remote.get("id").is_some());
    }
}
