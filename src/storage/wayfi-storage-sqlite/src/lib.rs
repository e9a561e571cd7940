//! # Wayfi Storage - SQLite Backend
//!
//! Relational store holding realms, certificate authorities, trust edges,
//! signer designations, server names, virtual hosts, OAuth keys and the
//! signing log. One database file per deployment, created on first open.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

pub use wayfi_storage::StorageError;

/// Relational schema. Statements are idempotent.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS realm (
    realm       TEXT PRIMARY KEY,
    created     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ca (
    sub         TEXT PRIMARY KEY,
    pub         TEXT NOT NULL,
    key         TEXT,
    issuer      TEXT REFERENCES ca (sub)
);

CREATE TABLE IF NOT EXISTS realm_trust (
    realm           TEXT NOT NULL REFERENCES realm (realm) ON DELETE CASCADE,
    trusted_ca_sub  TEXT NOT NULL REFERENCES ca (sub),
    PRIMARY KEY (realm, trusted_ca_sub)
);

CREATE TABLE IF NOT EXISTS realm_signer (
    realm                   TEXT PRIMARY KEY REFERENCES realm (realm) ON DELETE CASCADE,
    signer_ca_sub           TEXT NOT NULL REFERENCES ca (sub),
    default_validity_days   INTEGER NOT NULL CHECK (default_validity_days > 0)
);

CREATE TABLE IF NOT EXISTS realm_server_name (
    realm       TEXT NOT NULL REFERENCES realm (realm) ON DELETE CASCADE,
    server_name TEXT NOT NULL,
    PRIMARY KEY (realm, server_name)
);

CREATE TABLE IF NOT EXISTS realm_vhost (
    http_host   TEXT PRIMARY KEY,
    realm       TEXT NOT NULL REFERENCES realm (realm) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS realm_key (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    realm       TEXT NOT NULL REFERENCES realm (realm) ON DELETE CASCADE,
    key         BLOB NOT NULL,
    issued      INTEGER NOT NULL,
    expires     INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_realm_key_current ON realm_key (realm) WHERE expires IS NULL;

CREATE TABLE IF NOT EXISTS realm_signing_log (
    serial      INTEGER PRIMARY KEY AUTOINCREMENT,
    realm       TEXT NOT NULL REFERENCES realm (realm),
    ca_sub      TEXT NOT NULL REFERENCES ca (sub),
    requester   TEXT NOT NULL,
    usage       TEXT NOT NULL CHECK (usage IN ('client', 'server')),
    sub         TEXT NOT NULL,
    issued      INTEGER NOT NULL,
    expires     INTEGER NOT NULL,
    csr         TEXT NOT NULL,
    x509        TEXT,
    client      TEXT,
    user_agent  TEXT,
    ip          TEXT,
    revoked     INTEGER,
    status      TEXT NOT NULL DEFAULT 'prepared' CHECK (status IN ('prepared', 'completed', 'failed'))
);

CREATE INDEX IF NOT EXISTS idx_signing_log_requester ON realm_signing_log (realm, requester, usage);
CREATE INDEX IF NOT EXISTS idx_signing_log_status ON realm_signing_log (status)
"#;

/// SQLite relational store.
///
/// The database lives at `{base_path}/{name}.db`. Cloning is cheap; clones
/// share one connection pool.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Opens or creates the database and applies the schema.
    ///
    /// # Arguments
    ///
    /// * `base_path` - Directory holding the database file
    /// * `name` - Database name (must match `[a-z0-9_-]+`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is invalid
    /// - The directory cannot be created
    /// - The connection or a migration fails
    pub async fn open(base_path: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        Self::validate_name(name)?;

        let base = base_path.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(format!("{name}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(name = %name, path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let backend = Self { pool, db_path };

        backend.migrate().await?;

        info!(name = %name, "SQLite backend ready");

        Ok(backend)
    }

    /// Only allows lowercase letters, digits, underscore and hyphen.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput(
                "database name cannot be empty".into(),
            ));
        }

        if name.len() > 64 {
            return Err(StorageError::InvalidInput("database name too long".into()));
        }

        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "database name must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        self.execute_raw(SCHEMA)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        debug!("Migrations complete");

        Ok(())
    }

    /// Executes `;`-separated SQL statements without parameters.
    pub async fn execute_raw(&self, sql: &str) -> Result<(), StorageError> {
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement.trim())
                .execute(&self.pool)
                .await
                .map_err(query_failed)?;
        }
        Ok(())
    }

    /// The connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a transaction. It rolls back on drop unless committed.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }
}

/// Maps a sqlx error, reporting unique-constraint violations as
/// [`StorageError::AlreadyExists`].
pub fn query_failed(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::AlreadyExists(db.message().to_string());
        }
    }
    StorageError::QueryFailed(e.to_string())
}
