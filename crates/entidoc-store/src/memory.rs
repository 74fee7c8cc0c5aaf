//! In-memory entity store
//!
//! Shared ordered map from key to entity. Cloned handles (and handles derived
//! with [`EntityStore::with_config`]) see the same data, which makes the store
//! usable both in tests and as a lightweight embedded backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use entidoc_config::ClientConfig;
use entidoc_core::{
    ConversionResult, Entity, EntityStore, Key, KeyBuilder, Mutation, PathSegment, Query,
    StoreError, StoreResult, WriteBatch,
};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

/// Operation counters, for test assertions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub gets: usize,
    pub puts: usize,
    pub deletes: usize,
    pub queries: usize,
    pub commits: usize,
    /// User agent of the handle that issued the most recent operation
    pub last_user_agent: Option<String>,
}

struct Shared {
    entities: RwLock<BTreeMap<Key, Entity>>,
    next_id: AtomicI64,
    stats: Mutex<MemoryStoreStats>,
}

/// Thread-safe in-memory entity store
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    config: ClientConfig,
}

impl MemoryStore {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_client_config(ClientConfig::default())
    }

    /// Create an empty store with `config`
    pub fn with_client_config(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                entities: RwLock::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                stats: Mutex::new(MemoryStoreStats::default()),
            }),
            config,
        }
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.shared.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the operation counters
    pub fn stats(&self) -> MemoryStoreStats {
        self.shared.stats.lock().clone()
    }

    fn record<F>(&self, update: F)
    where
        F: FnOnce(&mut MemoryStoreStats),
    {
        let mut stats = self.shared.stats.lock();
        update(&mut stats);
        stats.last_user_agent = self.config.user_agent.clone();
    }

    /// Complete `key` with a fresh id unless it is already complete
    fn resolve_key(&self, key: &Key, entities: &BTreeMap<Key, Entity>) -> StoreResult<Key> {
        if key.is_complete() {
            return Ok(key.clone());
        }
        loop {
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            let candidate = key.completed_with(id)?;
            if !entities.contains_key(&candidate) {
                trace!(key = %candidate, "Allocated id");
                return Ok(candidate);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBuilder for MemoryStore {
    fn key(&self, flat_path: &[PathSegment]) -> ConversionResult<Key> {
        Key::from_flat_path(flat_path)
    }

    fn incomplete_key(&self, kind: &str) -> ConversionResult<Key> {
        Key::incomplete(kind, None)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn with_config(&self, config: ClientConfig) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            config,
        }
    }

    async fn get(&self, key: &Key) -> StoreResult<Option<Entity>> {
        self.record(|s| s.gets += 1);
        Ok(self.shared.entities.read().get(key).cloned())
    }

    async fn put(&self, mut entity: Entity) -> StoreResult<Key> {
        self.record(|s| s.puts += 1);
        let mut entities = self.shared.entities.write();
        let key = self.resolve_key(&entity.key, &entities)?;
        entity.key = key.clone();
        entities.insert(key.clone(), entity);
        Ok(key)
    }

    async fn delete(&self, key: &Key) -> StoreResult<()> {
        self.record(|s| s.deletes += 1);
        if !key.is_complete() {
            return Err(StoreError::InvalidOperation(format!(
                "cannot delete incomplete key {}",
                key
            )));
        }
        self.shared.entities.write().remove(key);
        Ok(())
    }

    fn fetch<'a>(&'a self, query: &Query) -> BoxStream<'a, StoreResult<Entity>> {
        self.record(|s| s.queries += 1);
        let limit = query.limit.unwrap_or(usize::MAX);
        let matched: Vec<Entity> = self
            .shared
            .entities
            .read()
            .values()
            .filter(|entity| query.matches(&entity.key))
            .take(limit)
            .cloned()
            .collect();

        debug!(kind = %query.kind, count = matched.len(), "Query executed");
        stream::iter(matched.into_iter().map(Ok)).boxed()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<Vec<Key>> {
        self.record(|s| s.commits += 1);

        if let Some(Mutation::Delete(key)) = batch
            .mutations()
            .iter()
            .find(|m| matches!(m, Mutation::Delete(key) if !key.is_complete()))
        {
            return Err(StoreError::InvalidOperation(format!(
                "cannot delete incomplete key {}",
                key
            )));
        }

        let mutation_count = batch.len();
        let mut entities = self.shared.entities.write();

        // Resolve every key before touching the map so a failure leaves it unchanged
        let mut resolved = Vec::with_capacity(mutation_count);
        let mut reserved = BTreeSet::new();
        for mutation in batch.into_mutations() {
            match mutation {
                Mutation::Put(mut entity) => {
                    let key = loop {
                        let key = self.resolve_key(&entity.key, &entities)?;
                        if entity.key.is_complete() || !reserved.contains(&key) {
                            break key;
                        }
                    };
                    reserved.insert(key.clone());
                    entity.key = key;
                    resolved.push(Mutation::Put(entity));
                }
                Mutation::Delete(key) => resolved.push(Mutation::Delete(key)),
            }
        }

        let mut put_keys = Vec::new();
        for mutation in resolved {
            match mutation {
                Mutation::Put(entity) => {
                    put_keys.push(entity.key.clone());
                    entities.insert(entity.key.clone(), entity);
                }
                Mutation::Delete(key) => {
                    entities.remove(&key);
                }
            }
        }

        debug!(
            mutations = mutation_count,
            puts = put_keys.len(),
            "Committed batch"
        );
        Ok(put_keys)
    }
}
