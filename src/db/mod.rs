// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Data access layer.
//!
//! This module owns the shared SQLite handle, including schema creation and
//! the mutual exclusion every storage client goes through. The [`Database`]
//! is the one resource shared across workers: acquiring its lock *is*
//! obtaining the connection, so a transaction in flight can never race a
//! second statement from another worker.
//!
//! # Tables
//!
//! * `podcasts` - One row per subscribed feed, identified by `ROWID`.
//! * `podcast_episodes` - Episode rows keyed back to their podcast by
//!   `podcast_database_id`.
//!
//! Both tables keep their open-ended attribute maps in an opaque `extra`
//! blob written and read through an [`ExtraCodec`].

mod codec;
pub(crate) mod model;

pub use codec::{CodecError, ExtraCodec, JsonCodec};

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;

/// Shared handle to the application database.
///
/// Every query and transaction anywhere in the process borrows the single
/// connection through [`Database::lock`]; operations are totally ordered by
/// lock acquisition. Subscription management is low-frequency, so the lost
/// throughput is a fair trade for interleaving that is trivial to reason
/// about.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens the database file and configures performance settings.
    ///
    /// * **WAL Mode**: Enables Write-Ahead Logging.
    /// * **Performance Tuning**: Sets synchronous mode to `NORMAL` and
    ///   increases the cache size.
    /// * **Constraints**: Enforces foreign key integrity.
    /// * **Schema**: Executes [`create_schema`] to ensure all tables and
    ///   indices exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened, if the
    /// initial PRAGMA configuration fails, or if the schema initialization
    /// fails.
    pub fn open(path: &str) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Failed to open database {path}"))?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        if journal_mode != "wal" {
            anyhow::bail!(
                "Failed to switch to WAL mode. Current mode: {}",
                journal_mode
            );
        }

        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000; -- Use 64MB of RAM for cache
        ",
        )?;

        conn.set_prepared_statement_cache_capacity(100);

        create_schema(&conn)?;

        debug!("opened database {path}");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database with the full schema. Used by
    /// tests and by tooling that never touches the on-disk store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        create_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquires the storage lock and with it the connection.
    ///
    /// The guard must be held for the whole operation, including any
    /// transaction commit.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

/// Create the database schema.
///
/// Both tables rely on SQLite's implicit `ROWID` as the generated identity
/// surfaced to callers as `database_id`. `podcasts.url` is indexed for the
/// subscription dedup lookup but carries no uniqueness constraint; dedup is
/// enforced by lookup under the storage lock.
///
/// # Errors
///
/// Returns an error if the transaction fails, if there are permission
/// issues with the database file, or if the SQL syntax is invalid.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS podcasts (
            url TEXT NOT NULL,
            title TEXT,
            description TEXT,
            copyright TEXT,
            link TEXT,
            image_url TEXT,
            author TEXT,
            owner_name TEXT,
            author_email TEXT,
            extra BLOB
        );

        CREATE INDEX IF NOT EXISTS idx_podcasts_url ON podcasts (url);

        CREATE TABLE IF NOT EXISTS podcast_episodes (
            podcast_database_id INTEGER NOT NULL,
            title TEXT,
            description TEXT,
            author TEXT,
            publication_date INTEGER,
            duration_secs INTEGER,
            url TEXT,
            listened INTEGER NOT NULL DEFAULT 0,
            downloaded INTEGER NOT NULL DEFAULT 0,
            local_url TEXT,
            extra BLOB
        );

        CREATE INDEX IF NOT EXISTS idx_podcast_episodes_podcast_database_id
            ON podcast_episodes (podcast_database_id);

        COMMIT;",
    )
    .context("Failed to create schema")
}
