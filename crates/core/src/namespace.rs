//! Versioned cache namespaces.
//!
//! Every role owns exactly one live namespace, named
//! `{prefix}-{role}-{version}`. The [`NamespaceManager`] is the only component
//! that creates or deletes namespaces; everything else works through the
//! [`CacheStore`] handles it hands out.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheDb, CachedEntry, EntryWrite};
use crate::request::{RequestDescriptor, ResponseSnapshot};

/// Logical bucket a cached entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    Static,
    Image,
    Api,
}

impl CacheRole {
    pub const ALL: [CacheRole; 3] = [CacheRole::Static, CacheRole::Image, CacheRole::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRole::Static => "static",
            CacheRole::Image => "image",
            CacheRole::Api => "api",
        }
    }
}

impl fmt::Display for CacheRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the role to namespace mapping for one cache version.
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    db: CacheDb,
    prefix: String,
    version: String,
}

impl NamespaceManager {
    pub fn new(db: CacheDb, prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { db, prefix: prefix.into(), version: version.into() }
    }

    /// Name of the current-version namespace for a role.
    pub fn namespace_name(&self, role: CacheRole) -> String {
        format!("{}-{}-{}", self.prefix, role, self.version)
    }

    /// Open the store for a role, creating its namespace if absent.
    ///
    /// Safe to call concurrently: every caller ends up with a handle to the
    /// same namespace row.
    pub async fn open(&self, role: CacheRole) -> Result<CacheStore, Error> {
        let name = self.namespace_name(role);
        if self.db.create_namespace(&name).await? {
            tracing::debug!(namespace = %name, "created cache namespace");
        }
        Ok(CacheStore { db: self.db.clone(), name })
    }

    /// Handle to the store for a role without touching storage.
    ///
    /// Reads from a namespace that does not exist yet find nothing; the first
    /// write creates it.
    pub fn store(&self, role: CacheRole) -> CacheStore {
        CacheStore { db: self.db.clone(), name: self.namespace_name(role) }
    }

    /// Every namespace currently in storage, including stale versions.
    pub async fn list(&self) -> Result<Vec<String>, Error> {
        self.db.namespace_names().await
    }

    /// Delete every namespace that is not the current-version namespace of an
    /// active role.
    ///
    /// Deletion is best-effort: a failure is logged and the remaining names are
    /// still processed. Returns the names actually deleted.
    pub async fn reconcile(&self, active_roles: &[CacheRole]) -> Result<Vec<String>, Error> {
        let keep: HashSet<String> = active_roles.iter().map(|r| self.namespace_name(*r)).collect();
        let mut deleted = Vec::new();

        for name in self.db.namespace_names().await? {
            if keep.contains(&name) {
                continue;
            }
            match self.db.delete_namespace(&name).await {
                Ok(true) => {
                    tracing::info!(namespace = %name, "deleted stale cache namespace");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(namespace = %name, error = %e, "failed to delete stale cache namespace"),
            }
        }

        Ok(deleted)
    }

    /// Delete all namespaces regardless of role or version.
    ///
    /// Returns the number deleted; clearing an empty storage is a no-op.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let deleted = self.db.delete_all_namespaces().await?;
        tracing::info!(deleted, "cleared all cache namespaces");
        Ok(deleted)
    }
}

/// Handle to one namespace.
///
/// Holds no state besides the name, so handles for the same role are
/// interchangeable.
#[derive(Debug, Clone)]
pub struct CacheStore {
    db: CacheDb,
    name: String,
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, request: &RequestDescriptor) -> Result<Option<CachedEntry>, Error> {
        self.db.get_entry(&self.name, &request.method, request.url.as_str()).await
    }

    pub async fn put(&self, request: &RequestDescriptor, response: &ResponseSnapshot) -> Result<(), Error> {
        self.db.create_namespace(&self.name).await?;
        self.db
            .upsert_entry(&self.name, &request.method, request.url.as_str(), response)
            .await
    }

    /// Store a batch atomically.
    pub async fn put_all(&self, batch: Vec<(RequestDescriptor, ResponseSnapshot)>) -> Result<usize, Error> {
        let writes: Vec<EntryWrite> = batch
            .into_iter()
            .map(|(req, response)| EntryWrite { method: req.method, url: req.url.to_string(), response })
            .collect();
        self.db.create_namespace(&self.name).await?;
        self.db.upsert_entries(&self.name, &writes).await
    }

    pub async fn delete(&self, request: &RequestDescriptor) -> Result<bool, Error> {
        self.db
            .delete_entry(&self.name, &request.method, request.url.as_str())
            .await
    }

    /// URLs of every entry in this store.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.entry_urls(&self.name).await
    }
}
