//! Database operations for Postino

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    join_platforms, parse_platforms, LogStatus, Post, PostStatus, PublicationLog,
};

/// A post together with its publication audit trail.
#[derive(Debug, Clone)]
pub struct PostWithLogs {
    pub post: Post,
    pub logs: Vec<PublicationLog>,
}

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Create a new post
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, content, platforms, image_url, video_url, scheduled_at,
                status, published_at, external_post_id, error_message,
                pinterest_board_id, pinterest_link, template_name, notes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.content)
        .bind(join_platforms(&post.platforms))
        .bind(&post.image_url)
        .bind(&post.video_url)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(&post.external_post_id)
        .bind(&post.error_message)
        .bind(&post.pinterest_board_id)
        .bind(&post.pinterest_link)
        .bind(&post.template_name)
        .bind(&post.notes)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| post_from_row(&r)))
    }

    /// Rewrite the operator-editable columns of a post, plus its status and
    /// schedule. The dispatcher does not use this; it finalizes attempts
    /// through [`Database::finalize_dispatch`].
    pub async fn update_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET
                content = ?, platforms = ?, image_url = ?, video_url = ?,
                scheduled_at = ?, status = ?, error_message = ?,
                pinterest_board_id = ?, pinterest_link = ?, template_name = ?,
                notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.content)
        .bind(join_platforms(&post.platforms))
        .bind(&post.image_url)
        .bind(&post.video_url)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(&post.error_message)
        .bind(&post.pinterest_board_id)
        .bind(&post.pinterest_link)
        .bind(&post.template_name)
        .bind(&post.notes)
        .bind(chrono::Utc::now().timestamp())
        .bind(&post.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Delete a post and its publication logs. Returns whether a row existed.
    pub async fn delete_post(&self, post_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM publication_logs WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Due-item selector: every scheduled post whose time has arrived,
    /// earliest first. Evaluated fresh on each call.
    pub async fn due_posts(&self, now: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM posts
            WHERE status = 'scheduled' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// All posts still awaiting publication, earliest first.
    pub async fn scheduled_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE status = 'scheduled' ORDER BY scheduled_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// List posts, optionally filtered by status, newest first.
    pub async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<Post>> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM posts WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM posts ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    pub async fn count_with_status(&self, status: PostStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM posts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.get("n"))
    }

    /// Claim a post for dispatch by moving it out of the selectable state.
    ///
    /// The conditional update is the mutual-exclusion point: of any number
    /// of processes racing on the same post, exactly one sees a row change.
    /// Returns false when the post was already claimed, finished, or gone.
    pub async fn claim_for_dispatch(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET status = 'publishing', updated_at = ? WHERE id = ? AND status = 'scheduled'",
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Apply the outcome of one dispatch attempt atomically: the post's new
    /// state and all of its log entries are recorded together or not at all.
    pub async fn finalize_dispatch(&self, post: &Post, logs: &[PublicationLog]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            UPDATE posts SET
                status = ?, published_at = ?, external_post_id = ?,
                error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(&post.external_post_id)
        .bind(&post.error_message)
        .bind(post.updated_at)
        .bind(&post.id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        for log in logs {
            sqlx::query(
                r#"
                INSERT INTO publication_logs (
                    post_id, platform, status, response_snapshot,
                    error_message, attempted_at
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&log.post_id)
            .bind(log.platform.as_str())
            .bind(log.status.as_str())
            .bind(&log.response_snapshot)
            .bind(&log.error_message)
            .bind(log.attempted_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get all publication logs for a post, newest first.
    pub async fn logs_for_post(&self, post_id: &str) -> Result<Vec<PublicationLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, platform, status, response_snapshot,
                   error_message, attempted_at
            FROM publication_logs
            WHERE post_id = ?
            ORDER BY attempted_at DESC, id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(log_from_row).collect())
    }

    /// Fetch a post together with its audit trail.
    pub async fn post_with_logs(&self, post_id: &str) -> Result<Option<PostWithLogs>> {
        let Some(post) = self.get_post(post_id).await? else {
            return Ok(None);
        };
        let logs = self.logs_for_post(post_id).await?;
        Ok(Some(PostWithLogs { post, logs }))
    }
}

fn post_from_row(r: &SqliteRow) -> Post {
    Post {
        id: r.get("id"),
        content: r.get("content"),
        platforms: parse_platforms(&r.get::<String, _>("platforms")),
        image_url: r.get("image_url"),
        video_url: r.get("video_url"),
        scheduled_at: r.get("scheduled_at"),
        status: r
            .get::<String, _>("status")
            .parse()
            .unwrap_or(PostStatus::Draft),
        published_at: r.get("published_at"),
        external_post_id: r.get("external_post_id"),
        error_message: r.get("error_message"),
        pinterest_board_id: r.get("pinterest_board_id"),
        pinterest_link: r.get("pinterest_link"),
        template_name: r.get("template_name"),
        notes: r.get("notes"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn log_from_row(r: &SqliteRow) -> PublicationLog {
    PublicationLog {
        id: r.get("id"),
        post_id: r.get("post_id"),
        platform: r
            .get::<String, _>("platform")
            .parse()
            .unwrap_or(crate::types::Platform::Facebook),
        status: match r.get::<String, _>("status").as_str() {
            "success" => LogStatus::Success,
            _ => LogStatus::Failed,
        },
        response_snapshot: r.get("response_snapshot"),
        error_message: r.get("error_message"),
        attempted_at: r.get("attempted_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    async fn test_db() -> Database {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Database { pool }
    }

    fn sample_post(scheduled_at: i64) -> Post {
        Post::new(
            "Test content #ambiente".to_string(),
            vec![Platform::Facebook, Platform::Twitter],
            scheduled_at,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let db = test_db().await;
        let post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, post.content);
        assert_eq!(loaded.platforms, post.platforms);
        assert_eq!(loaded.scheduled_at, 1_700_000_000);
        assert_eq!(loaded.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_get_post_missing() {
        let db = test_db().await;
        assert!(db.get_post("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_posts_selection_and_order() {
        let db = test_db().await;
        let now = 1_700_000_000;

        let later = sample_post(now - 10);
        let earlier = sample_post(now - 100);
        let future = sample_post(now + 3600);
        let mut published = sample_post(now - 50);
        published.status = PostStatus::Published;
        let mut draft = sample_post(now - 50);
        draft.status = PostStatus::Draft;

        for post in [&later, &earlier, &future, &published, &draft] {
            db.create_post(post).await.unwrap();
        }

        let due = db.due_posts(now).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![earlier.id.as_str(), later.id.as_str()]);
    }

    #[tokio::test]
    async fn test_due_posts_boundary_inclusive() {
        let db = test_db().await;
        let now = 1_700_000_000;
        let exact = sample_post(now);
        db.create_post(&exact).await.unwrap();

        let due = db.due_posts(now).await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_for_dispatch_succeeds_once() {
        let db = test_db().await;
        let post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        assert!(db.claim_for_dispatch(&post.id).await.unwrap());
        assert_eq!(
            db.get_post(&post.id).await.unwrap().unwrap().status,
            PostStatus::Publishing
        );

        // second claimant loses the race
        assert!(!db.claim_for_dispatch(&post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_claimed_posts_are_not_due() {
        let db = test_db().await;
        let post = sample_post(1_700_000_000 - 60);
        db.create_post(&post).await.unwrap();
        db.claim_for_dispatch(&post.id).await.unwrap();

        assert!(db.due_posts(1_700_000_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_unknown_post() {
        let db = test_db().await;
        assert!(!db.claim_for_dispatch("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_dispatch_writes_status_and_logs_together() {
        let db = test_db().await;
        let mut post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        post.status = PostStatus::Published;
        post.published_at = Some(1_700_000_100);
        post.external_post_id = Some("late-1".to_string());
        post.updated_at = 1_700_000_100;

        let logs = vec![
            PublicationLog::success(&post.id, Platform::Facebook, "{\"id\":\"late-1\"}".into()),
            PublicationLog::success(&post.id, Platform::Twitter, "{\"id\":\"late-1\"}".into()),
        ];
        db.finalize_dispatch(&post, &logs).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Published);
        assert_eq!(loaded.external_post_id.as_deref(), Some("late-1"));

        let stored_logs = db.logs_for_post(&post.id).await.unwrap();
        assert_eq!(stored_logs.len(), 2);
        assert!(stored_logs.iter().all(|l| l.status == LogStatus::Success));
    }

    #[tokio::test]
    async fn test_update_post() {
        let db = test_db().await;
        let mut post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        post.content = "Edited".to_string();
        post.platforms = vec![Platform::Linkedin];
        post.scheduled_at = 1_700_003_600;
        db.update_post(&post).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, "Edited");
        assert_eq!(loaded.platforms, vec![Platform::Linkedin]);
        assert_eq!(loaded.scheduled_at, 1_700_003_600);
    }

    #[tokio::test]
    async fn test_delete_post_removes_logs() {
        let db = test_db().await;
        let mut post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        post.status = PostStatus::Failed;
        post.error_message = Some("boom".to_string());
        let logs = vec![PublicationLog::failure(
            &post.id,
            Platform::Facebook,
            "boom".to_string(),
        )];
        db.finalize_dispatch(&post, &logs).await.unwrap();

        assert!(db.delete_post(&post.id).await.unwrap());
        assert!(db.get_post(&post.id).await.unwrap().is_none());
        assert!(db.logs_for_post(&post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_post_missing_returns_false() {
        let db = test_db().await;
        assert!(!db.delete_post("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_posts_filtered() {
        let db = test_db().await;
        let scheduled = sample_post(1_700_000_000);
        let mut failed = sample_post(1_700_000_000);
        failed.status = PostStatus::Failed;
        db.create_post(&scheduled).await.unwrap();
        db.create_post(&failed).await.unwrap();

        let all = db.list_posts(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_failed = db.list_posts(Some(PostStatus::Failed)).await.unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].id, failed.id);
    }

    #[tokio::test]
    async fn test_count_with_status() {
        let db = test_db().await;
        db.create_post(&sample_post(1)).await.unwrap();
        db.create_post(&sample_post(2)).await.unwrap();

        assert_eq!(db.count_with_status(PostStatus::Scheduled).await.unwrap(), 2);
        assert_eq!(db.count_with_status(PostStatus::Published).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_with_logs() {
        let db = test_db().await;
        let post = sample_post(1_700_000_000);
        db.create_post(&post).await.unwrap();

        let with_logs = db.post_with_logs(&post.id).await.unwrap().unwrap();
        assert_eq!(with_logs.post.id, post.id);
        assert!(with_logs.logs.is_empty());

        assert!(db.post_with_logs("ghost").await.unwrap().is_none());
    }
}
