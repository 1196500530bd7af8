//! Database module for SQLite operations
//!
//! This module handles all database interactions including:
//! - Schema creation and team seeding
//! - Per-user totals, profiles, and request log queries
//! - The precomputed team averages view
//! - Table-keyed change notifications

pub mod changes;
pub mod queries;
pub mod schema;

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;

use changes::{ChangeFeed, TableChange};

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database not initialized")]
    NotInitialized,

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
    changes: ChangeFeed,
}

impl Database {
    /// Create a new database connection
    pub fn new(path: PathBuf) -> Result<Self, DbError> {
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, path)
    }

    /// Create a private in-memory database
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, DbError> {
        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let changes = ChangeFeed::default();
        changes.install(&conn);

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            changes,
        })
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        schema::create_tables(&conn)?;
        schema::seed_teams(&conn)?;
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Subscribe to row changes on any table
    pub fn subscribe(&self) -> Receiver<TableChange> {
        self.changes.subscribe()
    }

    /// Execute a query with the database connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }
}

/// Get the default database path
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("carbonsight").join("carbonsight.db")
}
