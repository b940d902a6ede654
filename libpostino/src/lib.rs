//! Postino - scheduled social media publishing through one service call
//!
//! This library provides the queue, batch runner and publish dispatcher
//! behind the postino command-line tools. Posts are stored locally in
//! SQLite and fanned out to their target platforms in a single request to
//! an external multi-platform publishing service.

pub mod client;
pub mod config;
pub mod content;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod runner;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use client::{late::LateClient, mock::MockClient, PublishClient};
pub use config::Config;
pub use db::{Database, PostWithLogs};
pub use dispatcher::{DeleteOutcome, DispatchOutcome, Dispatcher};
pub use error::{PostinoError, Result};
pub use runner::{BatchRunner, RunSummary};
pub use service::{NewPost, PostEdit, QueueStats, SchedulerService};
pub use types::{LogStatus, Platform, Post, PostStatus, PublicationLog};
