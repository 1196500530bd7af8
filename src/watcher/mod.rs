//! File watcher module
//!
//! Watches the SQLite database file for writes made by other processes.
//! In-process writes are seen earlier through `db::changes`.

pub mod handler;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

/// Watcher errors
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The database or one of its journal files was written
    DatabaseModified { path: PathBuf },
    /// The database file was removed
    DatabaseRemoved { path: PathBuf },
}

/// Database file watcher
pub struct DatabaseWatcher {
    watcher: RecommendedWatcher,
    db_path: PathBuf,
    watch_dir: PathBuf,
    rx: Receiver<Result<Event, notify::Error>>,
}

impl DatabaseWatcher {
    /// Create a watcher for the given database file
    pub fn new(db_path: PathBuf) -> Result<Self, WatcherError> {
        let (tx, rx) = channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        // Journal files are siblings of the database, so watch the directory
        let watch_dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            watcher,
            db_path,
            watch_dir,
            rx,
        })
    }

    /// Start watching
    pub fn start(&mut self) -> Result<(), WatcherError> {
        if !self.db_path.exists() {
            return Err(WatcherError::PathNotFound(self.db_path.clone()));
        }

        self.watcher.watch(&self.watch_dir, RecursiveMode::NonRecursive)?;

        tracing::info!("Started watching: {:?}", self.db_path);

        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) -> Result<(), WatcherError> {
        self.watcher.unwatch(&self.watch_dir)?;
        Ok(())
    }

    /// Poll for new events (non-blocking)
    pub fn poll(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(event) => {
                    if let Some(watch_event) = handler::handle_event(event, &self.db_path) {
                        events.push(watch_event);
                    }
                }
                Err(e) => {
                    tracing::error!("Watch error: {:?}", e);
                }
            }
        }

        events
    }
}
