//! Bookmark persistence for per-file watermarks.
//!
//! Bookmarks are keyed by stream name and file base name. Snapshots use the
//! partitioned bookmark layout downstream loaders expect:
//!
//! ```json
//! {"bookmarks": {"roads": {"partitions": [
//!     {"context": {"_sdc_filename": "roads.shp"},
//!      "replication_key": "_sdc_last_modified",
//!      "replication_key_value": "2024-05-01T12:00:00Z"}
//! ]}}}
//! ```

use std::collections::BTreeMap;

use camino::Utf8Path;
use geotap_core::{SDC_FILENAME, SDC_INCREMENTAL_KEY};
use geotap_fs::ensure_parent_dir;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Errors raised by state stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// Preparing the database location failed.
    #[error("failed to prepare state database at {path}: {source}")]
    Prepare {
        /// Database path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A SQLite operation failed.
    #[error("state database error during {operation}: {source}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },
}

/// Storage of per-file watermarks between runs.
pub trait StateStore {
    /// Watermark committed for `file` in `stream`, as stored.
    fn bookmark(&self, stream: &str, file: &str) -> Result<Option<String>, StateError>;

    /// Record `value` as the watermark of `file` in `stream`.
    fn commit(&mut self, stream: &str, file: &str, value: &str) -> Result<(), StateError>;

    /// Every bookmark in partitioned form.
    fn snapshot(&self) -> Result<Value, StateError>;
}

/// Volatile bookmarks held in memory.
///
/// # Examples
/// ```
/// use geotap_data::{MemoryState, StateStore};
///
/// let mut state = MemoryState::default();
/// state.commit("roads", "roads.shp", "2024-05-01T12:00:00Z").expect("commit");
/// assert_eq!(
///     state.bookmark("roads", "roads.shp").expect("lookup").as_deref(),
///     Some("2024-05-01T12:00:00Z")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    bookmarks: BTreeMap<(String, String), String>,
}

impl MemoryState {
    /// Load bookmarks from a partitioned snapshot, ignoring malformed entries.
    pub fn from_snapshot(snapshot: &Value) -> Self {
        let mut state = Self::default();
        let Some(streams) = snapshot.get("bookmarks").and_then(Value::as_object) else {
            return state;
        };
        for (stream, bookmark) in streams {
            let partitions = bookmark
                .get("partitions")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for partition in partitions {
                let file = partition
                    .get("context")
                    .and_then(|context| context.get(SDC_FILENAME))
                    .and_then(Value::as_str);
                let value = partition
                    .get("replication_key_value")
                    .and_then(Value::as_str);
                if let (Some(file), Some(value)) = (file, value) {
                    state
                        .bookmarks
                        .insert((stream.clone(), file.to_owned()), value.to_owned());
                }
            }
        }
        state
    }
}

impl StateStore for MemoryState {
    fn bookmark(&self, stream: &str, file: &str) -> Result<Option<String>, StateError> {
        Ok(self
            .bookmarks
            .get(&(stream.to_owned(), file.to_owned()))
            .cloned())
    }

    fn commit(&mut self, stream: &str, file: &str, value: &str) -> Result<(), StateError> {
        self.bookmarks
            .insert((stream.to_owned(), file.to_owned()), value.to_owned());
        Ok(())
    }

    fn snapshot(&self) -> Result<Value, StateError> {
        Ok(render_snapshot(
            self.bookmarks
                .iter()
                .map(|((stream, file), value)| (stream.as_str(), file.as_str(), value.as_str())),
        ))
    }
}

/// Bookmarks persisted in a SQLite database.
#[derive(Debug)]
pub struct SqliteState {
    connection: Connection,
}

impl SqliteState {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self, StateError> {
        ensure_parent_dir(path).map_err(|source| StateError::Prepare {
            path: path.to_string(),
            source,
        })?;
        let connection = Connection::open(path).map_err(|source| StateError::Sqlite {
            operation: "open database",
            source,
        })?;
        Self::initialise(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StateError> {
        let connection = Connection::open_in_memory().map_err(|source| StateError::Sqlite {
            operation: "open in-memory database",
            source,
        })?;
        Self::initialise(connection)
    }

    fn initialise(connection: Connection) -> Result<Self, StateError> {
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS bookmarks (
                    stream TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (stream, file_name)
                )",
                [],
            )
            .map_err(|source| StateError::Sqlite {
                operation: "create bookmarks table",
                source,
            })?;
        Ok(Self { connection })
    }
}

impl StateStore for SqliteState {
    fn bookmark(&self, stream: &str, file: &str) -> Result<Option<String>, StateError> {
        self.connection
            .query_row(
                "SELECT value FROM bookmarks WHERE stream = ?1 AND file_name = ?2",
                params![stream, file],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StateError::Sqlite {
                operation: "read bookmark",
                source,
            })
    }

    fn commit(&mut self, stream: &str, file: &str, value: &str) -> Result<(), StateError> {
        self.connection
            .execute(
                "INSERT INTO bookmarks (stream, file_name, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (stream, file_name) DO UPDATE SET value = excluded.value",
                params![stream, file, value],
            )
            .map_err(|source| StateError::Sqlite {
                operation: "write bookmark",
                source,
            })?;
        Ok(())
    }

    fn snapshot(&self) -> Result<Value, StateError> {
        let sqlite_error = |source| StateError::Sqlite {
            operation: "list bookmarks",
            source,
        };
        let mut statement = self
            .connection
            .prepare("SELECT stream, file_name, value FROM bookmarks ORDER BY stream, file_name")
            .map_err(sqlite_error)?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(sqlite_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_error)?;
        Ok(render_snapshot(rows.iter().map(|(stream, file, value)| {
            (stream.as_str(), file.as_str(), value.as_str())
        })))
    }
}

fn render_snapshot<'a>(entries: impl Iterator<Item = (&'a str, &'a str, &'a str)>) -> Value {
    let mut streams: Map<String, Value> = Map::new();
    for (stream, file, value) in entries {
        let bookmark = streams
            .entry(stream.to_owned())
            .or_insert_with(|| json!({"partitions": []}));
        if let Some(partitions) = bookmark
            .get_mut("partitions")
            .and_then(Value::as_array_mut)
        {
            partitions.push(json!({
                "context": {SDC_FILENAME: file},
                "replication_key": SDC_INCREMENTAL_KEY,
                "replication_key_value": value,
            }));
        }
    }
    json!({"bookmarks": streams})
}
