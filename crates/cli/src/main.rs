use anyhow::Context;
use archiver_core::config::Settings;
use archiver_core::ChannelTarget;
use archiver_db::Database;
use archiver_ingest::{IngestConfig, Ingester};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod gateway;

use gateway::HttpChannelClient;

#[derive(Debug, Parser)]
#[command(name = "archiver")]
#[command(about = "Archive broadcast channel history into a local database", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Backfill the newest messages of one channel.
    Fetch {
        #[command(flatten)]
        channel: ChannelArgs,
        #[arg(long, default_value_t = 100)]
        limit: u64,
    },
    /// Follow a channel on behalf of a user.
    Subscribe {
        #[arg(long)]
        channel: ChannelTarget,
        #[arg(long)]
        user: String,
    },
    Unsubscribe {
        #[arg(long)]
        channel: ChannelTarget,
        #[arg(long)]
        user: String,
    },
    /// Show the channels the remote account follows.
    Channels {
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Show the channels a user follows.
    List {
        #[arg(long)]
        user: String,
    },
    /// Print archived messages, newest first.
    Messages {
        #[arg(long, conflicts_with = "name")]
        id: Option<i64>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Poll channels for new messages until interrupted.
    Serve {
        #[arg(long)]
        user: Option<String>,
        #[arg(long = "channel")]
        channels: Vec<ChannelTarget>,
    },
}

#[derive(Debug, clap::Args)]
#[group(required = true, multiple = false)]
struct ChannelArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    name: Option<String>,
}

impl ChannelArgs {
    fn target(&self) -> anyhow::Result<ChannelTarget> {
        channel_target(self.id, self.name.as_deref())?
            .context("either --id or --name is required")
    }
}

fn channel_target(id: Option<i64>, name: Option<&str>) -> anyhow::Result<Option<ChannelTarget>> {
    match (id, name) {
        (Some(id), _) => Ok(Some(ChannelTarget::id(id))),
        (None, Some(name)) => {
            let target: ChannelTarget = name.parse()?;
            Ok(Some(target))
        }
        (None, None) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("ARCHIVER_GATEWAY_URL must be set")?;

    let db = Database::connect(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))?;
    db.migrate().await.context("failed to apply migrations")?;

    let client = HttpChannelClient::new(&settings.gateway_url, settings.gateway_token.clone())
        .context("invalid gateway configuration")?;
    let ingester = Ingester::new(Arc::new(client), db.clone(), IngestConfig::from(&settings));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
        }
        shutdown.cancel();
    });

    let result = match args.command {
        Command::Fetch { channel, limit } => {
            commands::fetch(&ingester, &channel.target()?, limit, settings.max_retries, &cancel)
                .await
        }
        Command::Subscribe { channel, user } => {
            commands::subscribe(&ingester, &user, &channel).await
        }
        Command::Unsubscribe { channel, user } => {
            commands::unsubscribe(&ingester, &user, &channel).await
        }
        Command::Channels { limit } => commands::followed_channels(&ingester, limit).await,
        Command::List { user } => commands::list_subscriptions(&db, &user).await,
        Command::Messages {
            id,
            name,
            limit,
            offset,
        } => {
            let target = channel_target(id, name.as_deref())?;
            commands::show_messages(&db, target.as_ref(), limit, offset).await
        }
        Command::Serve { user, channels } => {
            commands::serve(&ingester, user.as_deref(), channels, cancel.clone()).await
        }
    };

    db.close().await;
    result
}
