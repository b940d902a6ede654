//! Batch runner: selects due posts and hands each to the dispatcher.

use chrono::Utc;
use tracing::{debug, error, info};

use crate::db::Database;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed ({} published, {} failed)",
            self.total(),
            self.succeeded,
            self.failed
        )
    }
}

pub struct BatchRunner {
    db: Database,
    dispatcher: Dispatcher,
}

impl BatchRunner {
    pub fn new(db: Database, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// One pass: dispatch every post whose time has arrived, earliest first.
    ///
    /// Each post settles into published or failed independently; one bad post
    /// never stops the rest of the batch.
    pub async fn run(&self) -> Result<RunSummary> {
        let now = Utc::now().timestamp();
        let due = self.db.due_posts(now).await?;

        if due.is_empty() {
            debug!("no posts due");
            return Ok(RunSummary::default());
        }

        info!(count = due.len(), "processing due posts");
        let mut summary = RunSummary::default();

        for post in &due {
            match self.dispatcher.dispatch(post).await {
                Ok(DispatchOutcome::Published) => summary.succeeded += 1,
                Ok(DispatchOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    error!(post_id = %post.id, error = %e, "dispatch error");
                    summary.failed += 1;
                }
            }
        }

        info!(%summary, "batch complete");
        Ok(summary)
    }
}
