//! Append-only SQLite log of closed events.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Row};
use tracing::{info, warn};

use crate::model::{format_timestamp, parse_timestamp, Event};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Single-writer handle on the event table. Closing consumes the handle, so
/// there is no way to use it afterwards.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open (creating if needed) the database at `path`, including missing
    /// parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Ensure the schema exists. Safe to run on every start.
    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = FULL;

CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  app TEXT,
  title TEXT,
  start TEXT,
  "end" TEXT
);
CREATE INDEX IF NOT EXISTS idx_events_start ON events(start);
"#,
        )?;
        Ok(())
    }

    /// Every stored event in insertion order. Rows whose `start` or `end`
    /// cannot be read as a timestamp are skipped.
    pub fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT app, title, start, "end" FROM events ORDER BY id ASC"#)?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows.next()? {
            match event_from_row(row) {
                Some(e) => out.push(e),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("skipped {skipped} event rows with unreadable timestamps");
        }
        Ok(out)
    }

    /// Commit one closed event. A single autocommit INSERT under
    /// `synchronous = FULL`: the row is durable once this returns.
    pub fn append(&self, e: &Event) -> Result<(), StoreError> {
        self.conn.execute(
            r#"INSERT INTO events (app, title, start, "end") VALUES (?1, ?2, ?3, ?4)"#,
            (
                &e.app,
                &e.title,
                format_timestamp(e.start),
                format_timestamp(e.end),
            ),
        )?;
        Ok(())
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Database(err))?;
        info!("event store closed");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

// Column type mismatches are treated like unparseable text.
fn text_column(row: &Row<'_>, idx: usize) -> Option<String> {
    row.get::<_, Option<String>>(idx).ok().flatten()
}

fn event_from_row(row: &Row<'_>) -> Option<Event> {
    let start = parse_timestamp(&text_column(row, 2)?)?;
    let end = parse_timestamp(&text_column(row, 3)?)?;
    Some(Event {
        app: text_column(row, 0).unwrap_or_default(),
        title: text_column(row, 1).unwrap_or_default(),
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use tempfile::tempdir;

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs)
    }

    fn ev(app: &str, title: &str, start: i64, end: i64) -> Event {
        Event {
            app: app.to_string(),
            title: title.to_string(),
            start: t(start),
            end: t(end),
        }
    }

    fn row_count(store: &EventStore) -> i64 {
        store
            .connection()
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn init_is_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        store.init().unwrap();
        store.init().unwrap();
        let count: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='events'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn appended_events_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("usage.db");
        let events = vec![
            ev("Code", "main.rs", 0, 30),
            ev("Firefox", "Docs", 31, 90),
            ev("Code", "lib.rs", 91, 91),
            Event {
                start: t(92) + TimeDelta::microseconds(250_001),
                ..ev("Terminal", "bash", 92, 95)
            },
        ];

        {
            let store = EventStore::open(&path).unwrap();
            store.init().unwrap();
            for e in &events {
                store.append(e).unwrap();
            }
            store.close().unwrap();
        }

        let store = EventStore::open(&path).unwrap();
        store.init().unwrap();
        assert_eq!(store.load_all().unwrap(), events);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let store = EventStore::open_in_memory().unwrap();
        store.init().unwrap();
        for i in 0..5 {
            store.append(&ev("Code", "main.rs", i * 10, i * 10 + 5)).unwrap();
        }
        store
            .connection()
            .execute(
                r#"INSERT INTO events (app, title, start, "end") VALUES ('Code', 'x', 'not-a-date', '2026-02-15T09:00:00')"#,
                [],
            )
            .unwrap();
        store
            .connection()
            .execute(
                r#"INSERT INTO events (app, title, start, "end") VALUES ('Code', 'x', '2026-02-15T09:00:00', NULL)"#,
                [],
            )
            .unwrap();
        store
            .connection()
            .execute(
                r#"INSERT INTO events (app, title, start, "end") VALUES ('Code', 'x', 42, '2026-02-15T09:00:00')"#,
                [],
            )
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 5);
        assert_eq!(row_count(&store), 8);
    }

    #[test]
    fn fully_corrupt_store_loads_empty() {
        let store = EventStore::open_in_memory().unwrap();
        store.init().unwrap();
        store
            .connection()
            .execute_batch(
                r#"INSERT INTO events (app, title, start, "end") VALUES ('Code', 'x', 'garbage', 'garbage');
                   INSERT INTO events (app, title, start, "end") VALUES ('Mail', 'y', NULL, '2026-02-15T09:00:00');
                   INSERT INTO events (app, title, start, "end") VALUES ('Chat', 'z', '2026-02-15T09:00:00', 'later');"#,
            )
            .unwrap();

        assert_eq!(store.load_all().unwrap(), Vec::<Event>::new());
        assert_eq!(row_count(&store), 3);
    }

    #[test]
    fn null_labels_load_as_empty_strings() {
        let store = EventStore::open_in_memory().unwrap();
        store.init().unwrap();
        store
            .connection()
            .execute(
                r#"INSERT INTO events (app, title, start, "end") VALUES (NULL, NULL, '2026-02-15T09:00:00', '2026-02-15T09:00:10')"#,
                [],
            )
            .unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![ev("", "", 0, 10)]);
        assert_eq!(loaded[0].app_label(), "Unknown");
    }

    #[test]
    fn open_fails_when_path_is_unusable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = EventStore::open(&blocker.join("usage.db"));
        assert!(err.is_err());
    }
}
