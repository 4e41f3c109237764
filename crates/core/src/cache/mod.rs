//! Persistent stores behind the game-data cache.
//!
//! This module provides:
//!
//! - Store traits for the scalar store and the namespaced content store
//! - A SQLite implementation of both (tokio-rusqlite, WAL mode)
//! - In-memory implementations used as the degraded fallback
//! - Bulk invalidation by URL predicate
//! - The forward migration runner for persisted cache state

pub mod connection;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod purge;
pub mod responses;
pub mod schema;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::{MemoryCacheStorage, MemoryKv};
pub use migrations::{Migration, MigrationContext, MigrationRunner, MigrationStep};
pub use purge::{purge_matching, starts_with_any, try_purge_matching};
pub use responses::SqliteResponseCache;
pub use store::{CacheStorage, KeyValueStore, RawResponse, ResponseCache, UnavailableStorage};
