use anyhow::Context;
use archiver_core::{ChannelMetadata, ChannelTarget};
use archiver_db::models::{Channel, Message};
use archiver_db::queries::{channels, messages, subscriptions, users};
use archiver_db::{Database, MediaKind};
use archiver_ingest::{IngestError, Ingester};
use backoff::{backoff::Backoff, ExponentialBackoff};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Backfill one channel, retrying whole runs on transient failures. Re-runs
/// only rewrite rows that already exist.
pub async fn fetch(
    ingester: &Ingester,
    target: &ChannelTarget,
    limit: u64,
    max_retries: u32,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: None,
        ..Default::default()
    };
    let mut attempt = 0;

    loop {
        match ingester.backfill(target, limit, cancel).await {
            Ok(report) => {
                info!(
                    %target,
                    processed = report.processed,
                    skipped = report.skipped,
                    pages = report.pages,
                    "fetch complete"
                );
                println!(
                    "fetched {} messages from {} ({} skipped)",
                    report.processed, target, report.skipped
                );
                return Ok(());
            }
            Err(err) if should_retry(&err, attempt, max_retries) => {
                attempt += 1;
                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_secs(60));
                warn!(
                    %target,
                    attempt,
                    max_retries,
                    processed = err.processed(),
                    ?delay,
                    error = %err,
                    "fetch failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => anyhow::bail!("fetch of {} cancelled", target),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) => {
                return Err(err).with_context(|| format!("fetch of {} failed", target));
            }
        }
    }
}

fn should_retry(err: &IngestError, attempt: u32, max_retries: u32) -> bool {
    err.is_transient() && attempt < max_retries
}

pub async fn subscribe(
    ingester: &Ingester,
    username: &str,
    target: &ChannelTarget,
) -> anyhow::Result<()> {
    let channel = ingester
        .subscribe(username, target)
        .await
        .with_context(|| format!("failed to subscribe {} to {}", username, target))?;
    println!("{} subscribed to {}", username, format_channel(&channel));
    Ok(())
}

pub async fn unsubscribe(
    ingester: &Ingester,
    username: &str,
    target: &ChannelTarget,
) -> anyhow::Result<()> {
    if ingester.unsubscribe(username, target).await? {
        println!("{} unsubscribed from {}", username, target);
    } else {
        println!("{} was not subscribed to {}", username, target);
    }
    Ok(())
}

/// Channels the remote account follows, whether archived or not.
pub async fn followed_channels(ingester: &Ingester, limit: i64) -> anyhow::Result<()> {
    let followed = ingester
        .followed_channels(limit)
        .await
        .context("failed to list followed channels")?;
    if followed.is_empty() {
        println!("the account follows no channels");
        return Ok(());
    }

    println!("{} followed channels:", followed.len());
    for metadata in &followed {
        println!("{}", format_metadata(metadata));
    }
    Ok(())
}

pub async fn list_subscriptions(db: &Database, username: &str) -> anyhow::Result<()> {
    let Some(user) = users::get_by_username(db.pool(), username).await? else {
        println!("unknown user {}", username);
        return Ok(());
    };

    let followed = subscriptions::list_channels_for_user(db.pool(), user.id).await?;
    if followed.is_empty() {
        println!("{} has no subscriptions", username);
    }
    for channel in &followed {
        println!("{}", format_channel(channel));
    }
    Ok(())
}

pub async fn show_messages(
    db: &Database,
    target: Option<&ChannelTarget>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<()> {
    let rows = match target {
        Some(target) => {
            let channel = local_channel(db, target)
                .await?
                .with_context(|| format!("channel {} has not been archived", target))?;
            messages::list_by_channel(db.pool(), channel.id, limit, offset).await?
        }
        None => messages::list_recent(db.pool(), limit, offset).await?,
    };

    for message in &rows {
        println!("{}", format_message(message));
    }
    Ok(())
}

/// Poll the given channels plus the user's subscriptions until cancelled.
pub async fn serve(
    ingester: &Ingester,
    username: Option<&str>,
    mut targets: Vec<ChannelTarget>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    if let Some(username) = username {
        targets.extend(ingester.subscribed_targets(username).await?);
    }

    let exits = ingester.listen(targets, cancel).await;
    for exit in &exits {
        info!(
            target_channel = %exit.target,
            reason = ?exit.reason,
            high_water_mark = ?exit.high_water_mark,
            "poller exited"
        );
    }
    Ok(())
}

async fn local_channel(db: &Database, target: &ChannelTarget) -> anyhow::Result<Option<Channel>> {
    let channel = match target {
        ChannelTarget::Handle(handle) => channels::get_by_username(db.pool(), handle).await?,
        ChannelTarget::Id(id) => channels::get_by_telegram_id(db.pool(), *id).await?,
    };
    Ok(channel)
}

fn format_channel(channel: &Channel) -> String {
    match &channel.username {
        Some(username) => format!(
            "{} (@{}, id {}, {} members)",
            channel.title, username, channel.telegram_id, channel.member_count
        ),
        None => format!(
            "{} (id {}, {} members)",
            channel.title, channel.telegram_id, channel.member_count
        ),
    }
}

fn format_metadata(metadata: &ChannelMetadata) -> String {
    let handle = metadata
        .username
        .as_deref()
        .map(|username| format!("@{}", username))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<14} {:<24} {:<40} {:>10}",
        metadata.id, handle, metadata.title, metadata.member_count
    )
}

fn format_message(message: &Message) -> String {
    let sender = message.sender_name.as_deref().unwrap_or("-");
    let mut line = format!(
        "[{}] #{} {}: {}",
        message.date.format("%Y-%m-%d %H:%M:%S"),
        message.telegram_id,
        sender,
        message.text
    );
    if let Some(url) = &message.media_url {
        line.push_str(&format!(" <{}>", url));
    } else if message.media_type != MediaKind::None {
        line.push_str(&format!(" <{}>", message.media_type));
    }
    line
}
