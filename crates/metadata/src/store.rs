//! SQLite metadata store.

use crate::error::MetadataResult;
use crate::uow::UnitOfWork;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    ///
    /// `query_timeout_secs` bounds how long a statement waits on a locked
    /// database before failing.
    pub async fn new(path: impl AsRef<Path>, query_timeout_secs: u64) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(query_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "metadata store opened");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Check out a connection outside any unit of work.
    pub async fn acquire(&self) -> MetadataResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Start a unit of work.
    pub async fn begin(&self) -> MetadataResult<UnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(UnitOfWork::new(tx))
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
-- Images: key prefix encodes the lifecycle stage (tmp/, inline/, trash/)
CREATE TABLE IF NOT EXISTS images (
    image_id BLOB PRIMARY KEY NOT NULL,
    object_key TEXT NOT NULL UNIQUE,
    public_url TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('TMP', 'COMMITTED')),
    owner_user_id BLOB NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_images_status ON images(status);

-- Single-reference owners
CREATE TABLE IF NOT EXISTS artists (
    artist_id BLOB PRIMARY KEY NOT NULL,
    profile_image_id BLOB REFERENCES images(image_id)
);
CREATE INDEX IF NOT EXISTS idx_artists_profile_image ON artists(profile_image_id);

CREATE TABLE IF NOT EXISTS "groups" (
    group_id BLOB PRIMARY KEY NOT NULL,
    profile_image_id BLOB REFERENCES images(image_id)
);
CREATE INDEX IF NOT EXISTS idx_groups_profile_image ON "groups"(profile_image_id);

CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY NOT NULL,
    profile_image_id BLOB REFERENCES images(image_id)
);
CREATE INDEX IF NOT EXISTS idx_users_profile_image ON users(profile_image_id);

-- Multi-reference owners
CREATE TABLE IF NOT EXISTS event_images (
    event_id BLOB NOT NULL,
    image_id BLOB NOT NULL REFERENCES images(image_id),
    position INTEGER NOT NULL,
    PRIMARY KEY (event_id, position)
);
CREATE INDEX IF NOT EXISTS idx_event_images_image ON event_images(image_id);

CREATE TABLE IF NOT EXISTS review_images (
    review_id BLOB NOT NULL,
    image_id BLOB NOT NULL REFERENCES images(image_id),
    position INTEGER NOT NULL,
    PRIMARY KEY (review_id, position)
);
CREATE INDEX IF NOT EXISTS idx_review_images_image ON review_images(image_id);
"#;
