//! Core types and shared functionality for the game-data cache.
//!
//! This crate provides:
//! - Persisted stores (SQLite and in-memory) for scalars and responses
//! - The cache migration runner and bulk invalidation
//! - Version descriptors and resolution of the floating version
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod version;

pub use cache::{CacheDb, CacheStorage, KeyValueStore, RawResponse, ResponseCache, UnavailableStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use version::{LATEST_VERSION, VersionDescriptor, VersionResolver};
