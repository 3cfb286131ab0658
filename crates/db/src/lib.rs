//! SQLite persistence for archived channels.
//!
//! Every write is an upsert keyed on the store's unique constraints, so
//! replaying the same remote range is a no-op rather than a duplicate or an
//! error.

pub mod error;
pub mod models;

pub mod queries {
    pub mod channels;
    pub mod messages;
    pub mod subscriptions;
    pub mod users;
}

pub use error::{DbError, Result};
pub use models::{Channel, MediaKind, Message, NewMessage, Subscription, User};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    const DEFAULT_POOL_SIZE: u32 = 8;

    /// Connect to a SQLite database, e.g. `sqlite:archiver.db?mode=rwc` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(url, pool_size, "connected to database");

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}
