//! Forward migrations of persisted cache state.
//!
//! Migrations form an explicit table of `(ordinal, step)` pairs validated at
//! construction: ordinals must be exactly `1..=N`. The scalar store records the
//! ordinal of the last step that completed (`misode_cache_patch`). Each run
//! applies the steps above that cursor in order, persisting the cursor after
//! every success and stopping at the first failure.
//!
//! A crash between a step finishing and its cursor write re-runs that step on
//! the next start, so every step must be safe to apply twice.

use async_trait::async_trait;

use super::purge::{starts_with_any, try_purge_matching};
use super::store::{CacheStorage, KeyValueStore};
use crate::Error;

/// Scalar key holding the migration cursor.
pub const CURSOR_KEY: &str = "misode_cache_patch";

/// Namespace used by releases before the current layout.
pub const LEGACY_NAMESPACE: &str = "misode-v1";

/// Scalar keys written by releases that cached whole data sets in the scalar store.
pub const LEGACY_KEYS: &[&str] = &[
    "cache_1.15",
    "cache_1.16",
    "cache_1.17",
    "cached_mcdata_master",
    "cached_vanilla_datapack_summary",
];

/// Content roots served by the retired data source.
pub const LEGACY_SOURCE_PREFIXES: &[&str] = &[
    "https://raw.githubusercontent.com/Arcensoth/mcdata/",
    "https://raw.githubusercontent.com/SPGoding/vanilla-datapack/",
];

/// Stores a migration step may touch.
pub struct MigrationContext<'a> {
    pub kv: &'a dyn KeyValueStore,
    pub storage: &'a dyn CacheStorage,
    /// Namespace of the active content cache.
    pub namespace: &'a str,
}

/// One unit of forward-only upgrade logic.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn description(&self) -> &str;

    /// Must be safe to run again after it already succeeded.
    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<(), Error>;
}

/// A step bound to its position in the table.
pub struct Migration {
    pub ordinal: u32,
    pub step: Box<dyn MigrationStep>,
}

impl Migration {
    pub fn new(ordinal: u32, step: impl MigrationStep + 'static) -> Self {
        Self { ordinal, step: Box::new(step) }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("ordinal", &self.ordinal)
            .field("description", &self.step.description())
            .finish()
    }
}

/// Applies pending migrations against the scalar and content stores.
#[derive(Debug, Default)]
pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    /// Build a runner from an unordered table.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMigrationTable` if the ordinals, once sorted, are
    /// not exactly `1, 2, ..., N`.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self, Error> {
        migrations.sort_by_key(|m| m.ordinal);

        for (index, migration) in migrations.iter().enumerate() {
            let expected = index as u32 + 1;
            if migration.ordinal != expected {
                return Err(Error::InvalidMigrationTable(format!(
                    "expected ordinal {expected}, found {} ({})",
                    migration.ordinal,
                    migration.step.description()
                )));
            }
        }

        Ok(Self { migrations })
    }

    /// The built-in table shipped with this release.
    pub fn with_defaults() -> Self {
        Self { migrations: default_migrations() }
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Apply every step whose ordinal is above the persisted cursor.
    ///
    /// Returns the number of steps applied. An unreadable or malformed cursor
    /// is treated as 0; a failed cursor write is logged and the run continues.
    ///
    /// # Errors
    ///
    /// Returns `Error::MigrationFailed` for the first failing step. The cursor
    /// stays at the last successful ordinal and later steps do not run.
    pub async fn apply_pending(&self, ctx: &MigrationContext<'_>) -> Result<usize, Error> {
        let cursor = read_cursor(ctx.kv).await;
        let mut applied = 0;

        for migration in self.migrations.iter().filter(|m| m.ordinal > cursor) {
            migration
                .step
                .apply(ctx)
                .await
                .map_err(|e| Error::MigrationFailed { ordinal: migration.ordinal, reason: e.to_string() })?;

            if let Err(e) = ctx.kv.set(CURSOR_KEY, &migration.ordinal.to_string()).await {
                tracing::warn!(ordinal = migration.ordinal, error = %e, "failed to persist migration cursor");
            }

            tracing::info!(
                ordinal = migration.ordinal,
                description = migration.step.description(),
                "applied cache migration"
            );
            applied += 1;
        }

        Ok(applied)
    }
}

async fn read_cursor(kv: &dyn KeyValueStore) -> u32 {
    match kv.get(CURSOR_KEY).await {
        Ok(Some(value)) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "ignoring malformed migration cursor");
            0
        }),
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read migration cursor, assuming none applied");
            0
        }
    }
}

/// Delete obsolete scalar keys.
#[derive(Debug, Clone)]
pub struct RemoveKeys {
    pub keys: Vec<String>,
}

#[async_trait]
impl MigrationStep for RemoveKeys {
    fn description(&self) -> &str {
        "remove obsolete scalar keys"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
        for key in &self.keys {
            ctx.kv.remove(key).await?;
        }
        Ok(())
    }
}

/// Drop a retired content namespace.
#[derive(Debug, Clone)]
pub struct DeleteNamespace {
    pub namespace: String,
}

#[async_trait]
impl MigrationStep for DeleteNamespace {
    fn description(&self) -> &str {
        "delete retired cache namespace"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
        let existed = ctx.storage.delete_namespace(&self.namespace).await?;
        tracing::debug!(namespace = %self.namespace, existed, "deleted cache namespace");
        Ok(())
    }
}

/// Delete entries of the active namespace under defunct URL prefixes.
#[derive(Debug, Clone)]
pub struct PurgePrefixes {
    pub prefixes: Vec<String>,
}

#[async_trait]
impl MigrationStep for PurgePrefixes {
    fn description(&self) -> &str {
        "purge entries under defunct URL prefixes"
    }

    async fn apply(&self, ctx: &MigrationContext<'_>) -> Result<(), Error> {
        try_purge_matching(ctx.storage, ctx.namespace, starts_with_any(&self.prefixes)).await?;
        Ok(())
    }
}

/// The migrations every release carries, in order.
pub fn default_migrations() -> Vec<Migration> {
    vec![
        Migration::new(1, RemoveKeys { keys: LEGACY_KEYS.iter().map(|k| k.to_string()).collect() }),
        Migration::new(2, DeleteNamespace { namespace: LEGACY_NAMESPACE.to_string() }),
        Migration::new(
            3,
            PurgePrefixes { prefixes: LEGACY_SOURCE_PREFIXES.iter().map(|p| p.to_string()).collect() },
        ),
    ]
}
