//! Network side of the game-data cache.
//!
//! This crate provides the HTTP transport, response decoders, the
//! read-through fetcher with its per-process refresh tracking, the content
//! source URL layout and the [`DataService`] tying them to the stores in
//! `gamedata-core`.

pub mod decode;
pub mod fetch;
pub mod service;
pub mod source;

#[cfg(test)]
mod testing;

pub use fetch::{
    FetchConfig, Freshness, HttpTransport, NetworkOutcome, ReadThroughFetcher, RefreshTracker, Transport,
};
pub use service::{DataService, Registries};
pub use source::{ContentSource, DataCategory, UrlBuilder, VersionMeta};
