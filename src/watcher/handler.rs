//! File change event handlers
//!
//! Processes notify events and converts them to WatchEvents

use std::ffi::OsString;
use std::path::Path;

use notify::{Event, EventKind};

use super::WatchEvent;

/// SQLite side files that also carry committed writes
const JOURNAL_SUFFIXES: [&str; 2] = ["-wal", "-journal"];

/// Handle a file system event
pub fn handle_event(event: Event, db_path: &Path) -> Option<WatchEvent> {
    let path = event.paths.iter().find(|p| is_database_file(p, db_path))?;

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(WatchEvent::DatabaseModified {
            path: path.to_path_buf(),
        }),
        EventKind::Remove(_) if path.file_name() == db_path.file_name() => {
            Some(WatchEvent::DatabaseRemoved {
                path: path.to_path_buf(),
            })
        }
        _ => None,
    }
}

/// Check whether a path is the database or one of its journal files
fn is_database_file(path: &Path, db_path: &Path) -> bool {
    let (Some(name), Some(db_name)) = (path.file_name(), db_path.file_name()) else {
        return false;
    };

    if name == db_name {
        return true;
    }

    JOURNAL_SUFFIXES.iter().any(|suffix| {
        let mut side = OsString::from(db_name);
        side.push(suffix);
        name == side.as_os_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_is_database_file() {
        let db = Path::new("/data/carbonsight.db");
        assert!(is_database_file(Path::new("/data/carbonsight.db"), db));
        assert!(is_database_file(Path::new("/data/carbonsight.db-wal"), db));
        assert!(is_database_file(Path::new("/data/carbonsight.db-journal"), db));
        assert!(!is_database_file(Path::new("/data/carbonsight.db-shm"), db));
        assert!(!is_database_file(Path::new("/data/other.db"), db));
    }

    #[test]
    fn test_modify_and_create_map_to_modified() {
        let db = Path::new("/data/carbonsight.db");

        let modified = handle_event(event(EventKind::Modify(ModifyKind::Any), "/data/carbonsight.db-wal"), db);
        assert_eq!(
            modified,
            Some(WatchEvent::DatabaseModified {
                path: PathBuf::from("/data/carbonsight.db-wal")
            })
        );

        let created = handle_event(event(EventKind::Create(CreateKind::File), "/data/carbonsight.db"), db);
        assert!(matches!(created, Some(WatchEvent::DatabaseModified { .. })));
    }

    #[test]
    fn test_remove_only_reported_for_database() {
        let db = Path::new("/data/carbonsight.db");

        let removed = handle_event(event(EventKind::Remove(RemoveKind::File), "/data/carbonsight.db"), db);
        assert!(matches!(removed, Some(WatchEvent::DatabaseRemoved { .. })));

        // Journal files come and go with every transaction
        let journal = handle_event(event(EventKind::Remove(RemoveKind::File), "/data/carbonsight.db-journal"), db);
        assert_eq!(journal, None);
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let db = Path::new("/data/carbonsight.db");
        assert_eq!(handle_event(event(EventKind::Modify(ModifyKind::Any), "/data/notes.txt"), db), None);
        assert_eq!(handle_event(Event::new(EventKind::Modify(ModifyKind::Any)), db), None);
    }
}
