//! Error types for Postino

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, PostinoError>;

#[derive(Error, Debug)]
pub enum PostinoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publishing error: {0}")]
    Publish(#[from] PublishError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Post {post_id} is {status}, expected scheduled")]
    StateConflict { post_id: String, status: String },

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostinoError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostinoError::Validation(_) | PostinoError::InvalidInput(_) => 3,
            PostinoError::NotFound(_) | PostinoError::StateConflict { .. } => 2,
            PostinoError::Config(_) | PostinoError::Database(_) | PostinoError::Publish(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors from the publishing collaborator boundary.
///
/// Every variant maps to a failed dispatch attempt; none of them abort a
/// batch run.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API rejected the request (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content cannot be empty")]
    EmptyContent,

    #[error("at least one platform is required")]
    NoPlatforms,

    #[error("{platform} allows at most {limit} characters (got {actual})")]
    TooLong {
        platform: Platform,
        limit: usize,
        actual: usize,
    },
}
