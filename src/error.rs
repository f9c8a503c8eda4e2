//! Error types for the weight log

use thiserror::Error;

/// Errors surfaced by the persistent store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or is not a recognizable store.
    #[error("cannot open database at {path}: {source}")]
    OpenFailed {
        /// Path that failed to open.
        path: String,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },

    /// A write was attempted before a required schema upgrade.
    #[error("schema version {found} requires an upgrade to {required} before writing")]
    SchemaMismatch {
        /// Version found on disk.
        found: i32,
        /// Version this build requires.
        required: i32,
    },

    /// The store has been closed; reopen it before use.
    #[error("database is closed")]
    Closed,

    /// A batched commit failed; dirty state is preserved for retry.
    #[error("commit failed: {0}")]
    CommitFailed(#[source] rusqlite::Error),

    /// Any other SQLite failure.
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Errors surfaced through a render job's completion channel.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The store failed while the job was reading day data.
    #[error("store error during rendering: {0}")]
    Store(#[from] StoreError),

    /// The raster backend rejected a drawing operation.
    #[error("drawing failed: {0}")]
    Drawing(String),
}

/// Result type alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
