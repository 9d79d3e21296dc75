//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Statements with a `RETURNING` clause are always read with `fetch_all`. SQLite only finishes (and, outside a
//! transaction, commits) such a statement once every row has been stepped through, so reading just the first row
//! leaves the write invisible to other connections in the pool.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod dispersals;
pub mod ledger;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";

/// How long a writer waits for a competing writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = env::var("MPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("MPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// The only row returned by an `INSERT ... RETURNING` statement.
pub(crate) fn single_row<T>(rows: Vec<T>) -> Result<T, SqlxError> {
    rows.into_iter().next().ok_or(SqlxError::RowNotFound)
}

/// SQLite's `CURRENT_TIMESTAMP` format, so that bound timestamps compare correctly against column defaults.
pub(crate) fn sqlite_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
