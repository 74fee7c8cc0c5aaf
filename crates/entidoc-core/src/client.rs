//! Entity store collaborator traits
//!
//! The converters only need to mint keys ([`KeyBuilder`]). The loader, saver
//! and chat history glue additionally read, write and query through
//! [`EntityStore`]. Implementations own connection handling, auth, query
//! execution and batching; this crate never performs I/O itself.

use async_trait::async_trait;
use entidoc_config::ClientConfig;
use futures::stream::BoxStream;

use crate::error::{ConversionResult, StoreResult};
use crate::key::{Key, PathSegment};
use crate::value::Entity;

/// Mints key handles and entity shells
///
/// Called read-only from converters, possibly from many threads at once.
pub trait KeyBuilder: Send + Sync {
    /// Mint a complete key from a flat `[kind, id, kind, id, ...]` path
    fn key(&self, flat_path: &[PathSegment]) -> ConversionResult<Key>;

    /// Mint a key of `kind` whose id the store allocates on commit
    fn incomplete_key(&self, kind: &str) -> ConversionResult<Key>;

    /// Empty entity at `key`, to be filled before it is persisted
    fn entity(&self, key: Key) -> Entity {
        Entity::new(key)
    }
}

impl<T: KeyBuilder + ?Sized> KeyBuilder for &T {
    fn key(&self, flat_path: &[PathSegment]) -> ConversionResult<Key> {
        (**self).key(flat_path)
    }

    fn incomplete_key(&self, kind: &str) -> ConversionResult<Key> {
        (**self).incomplete_key(kind)
    }

    fn entity(&self, key: Key) -> Entity {
        (**self).entity(key)
    }
}

/// Query over entities of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: String,
    pub ancestor: Option<Key>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: None,
            limit: None,
        }
    }

    /// Restrict results to descendants of `ancestor`
    pub fn with_ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Return at most `limit` entities
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an entity stored at `key` satisfies the kind and ancestor filters
    pub fn matches(&self, key: &Key) -> bool {
        key.kind() == self.kind
            && self
                .ancestor
                .as_ref()
                .map_or(true, |ancestor| key.has_ancestor(ancestor))
    }
}

impl From<&str> for Query {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for Query {
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Put(Entity),
    Delete(Key),
}

/// Mutations applied together by [`EntityStore::commit`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an upsert of `entity`
    pub fn put(&mut self, entity: Entity) {
        self.mutations.push(Mutation::Put(entity));
    }

    /// Queue a delete of `key`
    pub fn delete(&mut self, key: Key) {
        self.mutations.push(Mutation::Delete(key));
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Read/write access to an entity store
///
/// Handles are cheap to derive: [`EntityStore::with_config`] returns another
/// handle to the same data carrying a different immutable configuration.
#[async_trait]
pub trait EntityStore: KeyBuilder {
    /// Configuration this handle was built with
    fn config(&self) -> &ClientConfig;

    /// Another handle to the same store with `config`
    fn with_config(&self, config: ClientConfig) -> Self
    where
        Self: Sized;

    /// Look up the entity stored at `key`
    async fn get(&self, key: &Key) -> StoreResult<Option<Entity>>;

    /// Upsert a single entity, returning its (completed) key
    async fn put(&self, entity: Entity) -> StoreResult<Key>;

    /// Delete the entity at `key`; deleting a missing entity is not an error
    async fn delete(&self, key: &Key) -> StoreResult<()>;

    /// Run `query`, yielding entities as they are read
    fn fetch<'a>(&'a self, query: &Query) -> BoxStream<'a, StoreResult<Entity>>;

    /// Start an empty batch
    fn begin_batch(&self) -> WriteBatch {
        WriteBatch::new()
    }

    /// Apply every mutation in `batch` atomically
    ///
    /// Returns the keys of the put entities in batch order, with
    /// incomplete keys completed.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<Vec<Key>>;
}
