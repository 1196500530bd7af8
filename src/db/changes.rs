//! Table change feed
//!
//! Forwards SQLite row changes to any number of subscribers, keyed by table
//! name. Changes are held until their transaction commits and discarded if it
//! rolls back. Subscribers whose receiver was dropped are pruned on the next
//! delivery.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use rusqlite::hooks::Action;
use rusqlite::Connection;
use serde::Serialize;

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
    Unknown,
}

impl From<Action> for ChangeAction {
    fn from(action: Action) -> Self {
        match action {
            Action::SQLITE_INSERT => ChangeAction::Insert,
            Action::SQLITE_UPDATE => ChangeAction::Update,
            Action::SQLITE_DELETE => ChangeAction::Delete,
            _ => ChangeAction::Unknown,
        }
    }
}

/// A single row change on a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableChange {
    pub table: String,
    pub action: ChangeAction,
    pub rowid: i64,
}

/// Fan-out of committed table changes to subscribers
#[derive(Clone, Default)]
pub struct ChangeFeed {
    subscribers: Arc<Mutex<Vec<Sender<TableChange>>>>,
    pending: Arc<Mutex<Vec<TableChange>>>,
}

impl ChangeFeed {
    /// Register the feed's update, commit, and rollback hooks
    pub fn install(&self, conn: &Connection) {
        let pending = Arc::clone(&self.pending);
        conn.update_hook(Some(
            move |action: Action, _db: &str, table: &str, rowid: i64| {
                if let Ok(mut pending) = pending.lock() {
                    pending.push(TableChange {
                        table: table.to_string(),
                        action: action.into(),
                        rowid,
                    });
                }
            },
        ));

        let pending = Arc::clone(&self.pending);
        let subscribers = Arc::clone(&self.subscribers);
        conn.commit_hook(Some(move || {
            let changes: Vec<TableChange> = match pending.lock() {
                Ok(mut pending) => pending.drain(..).collect(),
                Err(_) => Vec::new(),
            };
            if !changes.is_empty() {
                if let Ok(mut subs) = subscribers.lock() {
                    subs.retain(|tx| changes.iter().all(|c| tx.send(c.clone()).is_ok()));
                }
            }
            // false lets the commit proceed
            false
        }));

        let pending = Arc::clone(&self.pending);
        conn.rollback_hook(Some(move || {
            if let Ok(mut pending) = pending.lock() {
                pending.clear();
            }
        }));
    }

    /// Subscribe to all future changes
    pub fn subscribe(&self) -> Receiver<TableChange> {
        let (tx, rx) = channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
