//! Response CRUD operations and the SQLite-backed [`CacheStorage`].
//!
//! Each namespace is a row in `cache_namespaces`; entries in `responses` are
//! keyed by `(namespace, url)` and cascade away with their namespace.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::{CacheStorage, RawResponse, ResponseCache};
use crate::Error;

impl CacheDb {
    /// Register a namespace if it does not exist yet.
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every namespace currently stored.
    pub async fn namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_namespaces ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let names = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a namespace and, through the cascade, all of its responses.
    pub async fn remove_namespace(&self, namespace: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_namespaces WHERE name = ?1", params![namespace])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the stored response for `url`, if any.
    pub async fn get_response(&self, namespace: &str, url: &str) -> Result<Option<RawResponse>, Error> {
        let namespace = namespace.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<RawResponse>, Error> {
                let mut stmt = conn
                    .prepare("SELECT status, headers_json, body FROM responses WHERE namespace = ?1 AND url = ?2")?;

                let result = stmt.query_row(params![namespace, url], |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(RawResponse { status, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the stored response for `url`.
    pub async fn put_response(&self, namespace: &str, url: &str, response: &RawResponse) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let url = url.to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)",
                    params![&namespace, &stored_at],
                )?;
                conn.execute(
                    "INSERT INTO responses (namespace, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(namespace, url) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![namespace, url, status, headers_json, body.as_ref(), stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every URL stored under `namespace`.
    pub async fn response_urls(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM responses WHERE namespace = ?1 ORDER BY url")?;
                let rows = stmt.query_map(params![namespace], |row| row.get::<_, String>(0))?;
                let urls = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the stored response for `url`.
    pub async fn delete_response(&self, namespace: &str, url: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM responses WHERE namespace = ?1 AND url = ?2",
                    params![namespace, url],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

/// One namespace of a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct SqliteResponseCache {
    db: CacheDb,
    namespace: String,
}

impl SqliteResponseCache {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl ResponseCache for SqliteResponseCache {
    async fn lookup(&self, url: &str) -> Result<Option<RawResponse>, Error> {
        self.db.get_response(&self.namespace, url).await
    }

    async fn put(&self, url: &str, response: RawResponse) -> Result<(), Error> {
        self.db.put_response(&self.namespace, url, &response).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.response_urls(&self.namespace).await
    }

    async fn delete(&self, url: &str) -> Result<bool, Error> {
        self.db.delete_response(&self.namespace, url).await
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn ResponseCache>, Error> {
        self.ensure_namespace(namespace).await?;
        Ok(Arc::new(SqliteResponseCache { db: self.clone(), namespace: namespace.to_string() }))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        self.remove_namespace(namespace).await
    }
}
