//! In-Memory Store Implementations
//!
//! Thread-safe, in-memory implementations of the `DocumentStore` and
//! `KeyValueStore` ports. Used when no `DATABASE_URL` is configured and in
//! tests. Data is lost on restart.

use crate::domain::ports::{DocumentFilter, DocumentStore, KeyValueStore, SortSpec, apply_query};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Collections of JSON documents held in memory
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        sort: Option<&SortSpec>,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        let docs = collections.get(collection).cloned().unwrap_or_default();
        Ok(apply_query(docs, filter, sort, limit))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }
}

/// String key/value map with optional per-entry expiry
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, (String, Option<Instant>)>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires)) if expires.is_none_or(|t| t > now) => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }
        // Expired: drop lazily
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires = ttl.map(|d| Instant::now() + d);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires)| expires.is_none_or(|t| t > now));
        Ok(before - entries.len())
    }
}
