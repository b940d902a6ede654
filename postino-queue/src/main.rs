//! postino-queue - Manage scheduled posts
//!
//! Unix-style tool for inspecting and changing the Postino post queue.

use clap::{Parser, Subcommand};
use libpostino::scheduling::{format_local, format_utc_iso, parse_schedule};
use libpostino::{
    Config, Database, DispatchOutcome, LateClient, Post, PostStatus, PostinoError, Result,
    SchedulerService,
};
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "postino-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
postino-queue - Manage scheduled posts

DESCRIPTION:
    postino-queue is a Unix-style tool for managing the Postino post queue.
    Use it to list, inspect, cancel, reschedule, or immediately publish
    queued posts, and to view queue statistics.

COMMANDS:
    list        List queued posts
    show        Show one post with its publication log
    cancel      Cancel a post (also cancels it at the publishing service)
    reschedule  Move a post to a different publish time
    now         Publish a post immediately
    stats       Show queue statistics
    accounts    List platform accounts connected at the publishing service

USAGE EXAMPLES:
    # List all pending posts
    postino-queue list

    # List failed posts in JSON format
    postino-queue list --status failed --format json

    # Inspect a post and its per-platform outcomes
    postino-queue show <POST_ID>

    # Cancel a post without confirmation
    postino-queue cancel <POST_ID> --force

    # Reschedule a post (local wall-clock or relative)
    postino-queue reschedule <POST_ID> \"2025-03-10 09:00\"
    postino-queue reschedule <POST_ID> \"+2h\"

    # Publish a post right now
    postino-queue now <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/postino/config.toml
    (override with the POSTINO_CONFIG environment variable)

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Post not found or in the wrong state
    3 - Invalid input (bad format, bad time, content too long)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by status: draft, scheduled, published, failed
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one post with its publication log
    Show {
        /// Post ID to show
        post_id: String,
    },

    /// Cancel a post
    Cancel {
        /// Post ID to cancel
        post_id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Reschedule a post
    Reschedule {
        /// Post ID to reschedule
        post_id: String,

        /// New time: "YYYY-MM-DD HH:MM" local, or relative like "+2h"
        time: String,
    },

    /// Publish immediately
    Now {
        /// Post ID to publish now
        post_id: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List connected platform accounts
    Accounts,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(Config::load()?);
    let db = Database::new(&config.database.path).await?;
    let client = Arc::new(LateClient::new(&config.api)?);
    let service = SchedulerService::new(db, config.clone(), client);

    match cli.command {
        Commands::List { format, status } => {
            cmd_list(&service, &config, &format, status.as_deref()).await?;
        }
        Commands::Show { post_id } => {
            cmd_show(&service, &config, &post_id).await?;
        }
        Commands::Cancel { post_id, force } => {
            cmd_cancel(&service, &post_id, force).await?;
        }
        Commands::Reschedule { post_id, time } => {
            cmd_reschedule(&service, &config, &post_id, &time).await?;
        }
        Commands::Now { post_id } => {
            cmd_now(&service, &post_id).await?;
        }
        Commands::Stats { format } => {
            cmd_stats(&service, &config, &format).await?;
        }
        Commands::Accounts => {
            cmd_accounts(&service).await?;
        }
    }

    Ok(())
}

fn parse_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PostinoError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn parse_status(status: &str) -> Result<PostStatus> {
    status
        .parse()
        .map_err(|_| PostinoError::InvalidInput(format!("Invalid status '{}'", status)))
}

async fn cmd_list(
    service: &SchedulerService,
    config: &Config,
    format: &str,
    status: Option<&str>,
) -> Result<()> {
    parse_format(format)?;
    let filter = status.map(parse_status).transpose()?;
    let posts = service.list_posts(filter).await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = posts.iter().map(post_json).collect();
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
        return Ok(());
    }

    let tz = config.schedule.tz()?;
    for post in &posts {
        let platforms: Vec<&str> = post.platforms.iter().map(|p| p.as_str()).collect();
        println!(
            "{} | {} | {} | {} | {}",
            post.id,
            post.status,
            format_local(post.scheduled_at, tz),
            platforms.join(","),
            preview(&post.content, 50)
        );
    }
    Ok(())
}

async fn cmd_show(service: &SchedulerService, config: &Config, post_id: &str) -> Result<()> {
    let with_logs = service.post_with_logs(post_id).await?;
    let post = &with_logs.post;
    let tz = config.schedule.tz()?;

    println!("ID:         {}", post.id);
    println!("Status:     {}", post.status);
    println!("Scheduled:  {}", format_local(post.scheduled_at, tz));
    if let Some(utc) = format_utc_iso(post.scheduled_at) {
        println!("UTC:        {}", utc);
    }
    let platforms: Vec<&str> = post.platforms.iter().map(|p| p.as_str()).collect();
    println!("Platforms:  {}", platforms.join(", "));
    if let Some(remote) = &post.external_post_id {
        println!("Remote ID:  {}", remote);
    }
    if let Some(error) = &post.error_message {
        println!("Error:      {}", error);
    }
    println!("Content:\n{}", post.content);

    if !with_logs.logs.is_empty() {
        println!("\nPublication log:");
        for log in &with_logs.logs {
            let detail = log
                .error_message
                .as_deref()
                .unwrap_or("ok");
            println!(
                "  {} | {} | {} | {}",
                format_local(log.attempted_at, tz),
                log.platform,
                log.status,
                detail
            );
        }
    }
    Ok(())
}

async fn cmd_cancel(service: &SchedulerService, post_id: &str, force: bool) -> Result<()> {
    let post = service.get_post(post_id).await?;

    if !force && !confirm(&format!("Cancel post {}? [y/N] ", preview(&post.content, 40)))? {
        println!("Aborted");
        return Ok(());
    }

    let outcome = service.delete(post_id).await?;
    if outcome.remote_cancelled {
        println!("Cancelled {} (remote copy cancelled too)", post_id);
    } else if let Some(error) = outcome.remote_error {
        println!("Cancelled {} locally (remote cancellation failed: {})", post_id, error);
    } else {
        println!("Cancelled {}", post_id);
    }
    Ok(())
}

async fn cmd_reschedule(
    service: &SchedulerService,
    config: &Config,
    post_id: &str,
    time: &str,
) -> Result<()> {
    let tz = config.schedule.tz()?;
    let scheduled_at = parse_schedule(time, tz)?;
    let post = service.reschedule_at(post_id, scheduled_at).await?;
    println!(
        "Rescheduled {} to {}",
        post.id,
        format_local(post.scheduled_at, tz)
    );
    Ok(())
}

async fn cmd_now(service: &SchedulerService, post_id: &str) -> Result<()> {
    match service.publish_now(post_id).await? {
        DispatchOutcome::Published => {
            println!("Published {}", post_id);
            Ok(())
        }
        DispatchOutcome::Failed => {
            let post = service.get_post(post_id).await?;
            Err(PostinoError::InvalidInput(format!(
                "Publishing failed: {}",
                post.error_message.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }
}

async fn cmd_stats(service: &SchedulerService, config: &Config, format: &str) -> Result<()> {
    parse_format(format)?;
    let stats = service.queue_stats().await?;
    let tz = config.schedule.tz()?;

    if format == "json" {
        let json = serde_json::json!({
            "draft": stats.draft,
            "scheduled": stats.scheduled,
            "published": stats.published,
            "failed": stats.failed,
            "next_due": stats.next_due,
            "top_hashtags": stats.top_hashtags
                .iter()
                .map(|(tag, count)| serde_json::json!({"tag": tag, "count": count}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap());
        return Ok(());
    }

    println!("Draft:     {}", stats.draft);
    println!("Scheduled: {}", stats.scheduled);
    println!("Published: {}", stats.published);
    println!("Failed:    {}", stats.failed);
    if let Some(next) = stats.next_due {
        println!("Next due:  {}", format_local(next, tz));
    }
    if !stats.top_hashtags.is_empty() {
        println!("Top hashtags:");
        for (tag, count) in &stats.top_hashtags {
            println!("  {} ({})", tag, count);
        }
    }
    Ok(())
}

async fn cmd_accounts(service: &SchedulerService) -> Result<()> {
    let accounts = service.list_accounts().await?;
    if accounts.is_empty() {
        println!("No connected accounts");
        return Ok(());
    }
    for account in &accounts {
        println!(
            "{} | {} | {}",
            account.platform,
            account.id,
            account.username.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn post_json(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "content": post.content,
        "platforms": post.platforms,
        "scheduled_at": post.scheduled_at,
        "status": post.status.to_string(),
        "published_at": post.published_at,
        "external_post_id": post.external_post_id,
        "error_message": post.error_message,
    })
}

fn preview(content: &str, max_chars: usize) -> String {
    let flat: String = content.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout()
        .flush()
        .map_err(|e| PostinoError::InvalidInput(e.to_string()))?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| PostinoError::InvalidInput(e.to_string()))?;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
