//! Unified error types for the game-data cache.
//!
//! Messages carry a stable code prefix (`CODE: detail`) so callers can log or
//! match on them without depending on variant layout.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the stores, the resolver and the fetcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persisted store could not be opened or reached.
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// The SQLite schema could not be brought up to date.
    #[error("CACHE_ERROR: schema migration failed: {0}")]
    SchemaMigration(String),

    /// A stored value could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),

    /// A cache migration step failed; the cursor was left before it.
    #[error("MIGRATION_FAILED: step {ordinal}: {reason}")]
    MigrationFailed { ordinal: u32, reason: String },

    /// The migration table has gaps, duplicates or does not start at 1.
    #[error("INVALID_MIGRATION_TABLE: {0}")]
    InvalidMigrationTable(String),

    /// Transport-level failure (DNS, connect, reset, body read).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP_ERROR: {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// The response body could not be decoded into the requested shape.
    #[error("DECODE_FAILED: {0}")]
    Decode(String),

    /// Neither the network nor the cache could provide `url`.
    #[error("FETCH_FAILED: {url}: {source}")]
    FetchFailed { url: String, source: Box<Error> },

    /// A data category could not be loaded for a version.
    #[error("DATA_UNAVAILABLE: {what}: {source}")]
    DataUnavailable { what: String, source: Box<Error> },
}

impl Error {
    /// Wrap a failed fetch with the URL that was requested.
    pub fn fetch_failed(url: impl Into<String>, source: Error) -> Self {
        Error::FetchFailed { url: url.into(), source: Box::new(source) }
    }

    /// Wrap a failure with a description of what was being loaded.
    pub fn data_unavailable(what: impl Into<String>, source: Error) -> Self {
        Error::DataUnavailable { what: what.into(), source: Box::new(source) }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
