//! Core types for Postino

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// A publishing target supported by the external service.
///
/// The set is closed: an unknown platform cannot exist at runtime, so the
/// per-platform limit tables below are total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Linkedin,
    Twitter,
    Pinterest,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Pinterest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Pinterest => "pinterest",
        }
    }

    /// Maximum content length accepted when a post is scheduled.
    pub fn max_length(&self) -> usize {
        match self {
            Platform::Facebook => 63_206,
            Platform::Instagram => 2_200,
            Platform::Linkedin => 3_000,
            Platform::Twitter => 280,
            Platform::Pinterest => 500,
        }
    }

    /// Hard ceiling applied at dispatch time, where content is truncated
    /// rather than rejected. `None` means no dispatch-time clamp.
    pub fn format_limit(&self) -> Option<usize> {
        match self {
            Platform::Twitter => Some(280),
            Platform::Pinterest => Some(500),
            _ => None,
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" => Ok(Platform::Twitter),
            "pinterest" => Ok(Platform::Pinterest),
            other => Err(format!(
                "Unknown platform: '{}'. Valid options: facebook, instagram, linkedin, twitter, pinterest",
                other
            )),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a comma-joined platform list, preserving order and dropping
/// duplicates. Unknown names are skipped.
pub fn parse_platforms(s: &str) -> Vec<Platform> {
    let mut platforms = Vec::new();
    for part in s.split(',') {
        if let Ok(platform) = part.parse::<Platform>() {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
    }
    platforms
}

/// Join a platform list into its comma-separated storage form.
pub fn join_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    /// Transient claim state: the dispatcher moves a post here before its
    /// external call begins, so no second process can dispatch it.
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(format!("Unknown post status: '{}'", other)),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One content item awaiting or having undergone publication.
///
/// All timestamps are Unix seconds in UTC. The source timezone exists only
/// at the input/output boundary (see `scheduling`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    /// Order-preserving, no duplicates. Never empty except for drafts.
    pub platforms: Vec<Platform>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub scheduled_at: i64,
    pub status: PostStatus,
    pub published_at: Option<i64>,
    /// Identifier returned by the publishing service on success. Used to
    /// avoid duplicate dispatch and to cancel a still-pending remote schedule.
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub pinterest_board_id: Option<String>,
    pub pinterest_link: Option<String>,
    pub template_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    /// Create a new post in `scheduled` status.
    pub fn new(content: String, platforms: Vec<Platform>, scheduled_at: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut deduped = Vec::new();
        for platform in platforms {
            if !deduped.contains(&platform) {
                deduped.push(platform);
            }
        }
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            platforms: deduped,
            image_url: None,
            video_url: None,
            scheduled_at,
            status: PostStatus::Scheduled,
            published_at: None,
            external_post_id: None,
            error_message: None,
            pinterest_board_id: None,
            pinterest_link: None,
            template_name: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one publish attempt for one platform of one post.
///
/// Created only inside the dispatcher's finalization transaction, never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationLog {
    pub id: Option<i64>,
    pub post_id: String,
    pub platform: Platform,
    pub status: LogStatus,
    pub response_snapshot: Option<String>,
    pub error_message: Option<String>,
    pub attempted_at: i64,
}

impl PublicationLog {
    pub fn success(post_id: &str, platform: Platform, snapshot: String) -> Self {
        Self {
            id: None,
            post_id: post_id.to_string(),
            platform,
            status: LogStatus::Success,
            response_snapshot: Some(snapshot),
            error_message: None,
            attempted_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn failure(post_id: &str, platform: Platform, error: String) -> Self {
        Self {
            id: None,
            post_id: post_id.to_string(),
            platform,
            status: LogStatus::Failed,
            response_snapshot: None,
            error_message: Some(error),
            attempted_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Media classification used when building the fan-out payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a media URL by file extension. Only the known image
    /// extensions map to `Image`; everything else is treated as video,
    /// matching the publishing service's expectations.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".jpg")
            || lower.ends_with(".jpeg")
            || lower.ends_with(".png")
            || lower.ends_with(".gif")
        {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}
