//! SQLite schema versioning.
//!
//! Tracks applied schema versions in a `_migrations` table. This is the
//! storage engine's own table layout; the cache-content migrations that run
//! before every version resolution live in [`super::migrations`].

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema list: (version, SQL).
///
/// Applied in order; every statement uses `CREATE ... IF NOT EXISTS`.
const SCHEMA: &[(&str, &str)] = &[
    ("1", include_str!("../../migrations/001_responses.sql")),
    ("2", include_str!("../../migrations/002_kv.sql")),
];

/// Apply any schema versions newer than the one recorded in `_migrations`.
///
/// # Errors
///
/// Returns an error if a schema batch fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for (version, sql) in SCHEMA {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::SchemaMigration(e.to_string()))?;
            if version_num > current {
                conn.execute_batch(sql)
                    .map_err(|e| Error::SchemaMigration(format!("version {version_num}: {e}")))?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
                tracing::debug!(version = version_num, "applied cache schema version");
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let has_tables: (bool, bool) = conn
            .call(|conn| -> Result<(bool, bool), tokio_rusqlite::rusqlite::Error> {
                let responses = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='responses')",
                    [],
                    |row| row.get(0),
                )?;
                let kv = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='kv')",
                    [],
                    |row| row.get(0),
                )?;
                Ok((responses, kv))
            })
            .await
            .unwrap();

        assert_eq!(has_tables, (true, true));
    }

    #[tokio::test]
    async fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, SCHEMA.len() as i64);
    }
}
