//! Cached entry CRUD operations.
//!
//! Entries live inside a namespace and are keyed by the hash of their request
//! identity. Writes are UPSERTs: the last writer for a key wins.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::request::ResponseSnapshot;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response stored in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub namespace: String,
    pub method: String,
    pub url: String,
    pub response: ResponseSnapshot,
    /// RFC 3339 timestamp of the last write.
    pub stored_at: String,
}

/// One row of a batch write.
#[derive(Debug, Clone)]
pub struct EntryWrite {
    pub method: String,
    pub url: String,
    pub response: ResponseSnapshot,
}

struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(method: &str, url: &str, response: &ResponseSnapshot) -> Result<Self, Error> {
        Ok(Self {
            key_hash: compute_request_key(method, url),
            method: method.to_uppercase(),
            url: url.to_string(),
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

const UPSERT_SQL: &str = "INSERT INTO entries (
        namespace, key_hash, method, url, status, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(namespace, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status = excluded.status,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

impl CacheDb {
    /// Insert or overwrite the entry for a request identity.
    pub async fn upsert_entry(
        &self, namespace: &str, method: &str, url: &str, response: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let row = EntryRow::new(method, url, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    UPSERT_SQL,
                    params![
                        &namespace,
                        &row.key_hash,
                        &row.method,
                        &row.url,
                        row.status,
                        &row.headers_json,
                        &row.body,
                        &now,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in one transaction: either all land or none do.
    pub async fn upsert_entries(&self, namespace: &str, writes: &[EntryWrite]) -> Result<usize, Error> {
        let namespace = namespace.to_string();
        let rows = writes
            .iter()
            .map(|w| EntryRow::new(&w.method, &w.url, &w.response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(UPSERT_SQL)?;
                    for row in &rows {
                        stmt.execute(params![
                            &namespace,
                            &row.key_hash,
                            &row.method,
                            &row.url,
                            row.status,
                            &row.headers_json,
                            &row.body,
                            &now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for a request identity.
    ///
    /// Returns None if the namespace holds no entry for it.
    pub async fn get_entry(&self, namespace: &str, method: &str, url: &str) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let key_hash = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT namespace, method, url, status, headers_json, body, stored_at
                     FROM entries WHERE namespace = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![namespace, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                match result {
                    Ok((namespace, method, url, status, headers_json, body, stored_at)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(CachedEntry {
                            namespace,
                            method,
                            url,
                            response: ResponseSnapshot::new(status, headers, body),
                            stored_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a request identity.
    pub async fn delete_entry(&self, namespace: &str, method: &str, url: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key_hash = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a namespace, sorted.
    pub async fn entry_urls(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE namespace = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
