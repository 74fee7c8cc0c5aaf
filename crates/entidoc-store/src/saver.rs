//! Document saver
//!
//! Writes documents as entities and deletes them again. Work is split into
//! batches of at most `write_batch_size` mutations; each batch is one commit.

use entidoc_core::{
    document_to_entity, ConversionError, Document, Entity, EntityStore, Key, PathSegment,
    StoreResult,
};
use tracing::{debug, info};

use crate::VERSION;

/// Upsert and delete documents in a store
pub struct DocumentSaver<S> {
    store: S,
    kind: Option<String>,
}

impl<S: EntityStore> DocumentSaver<S> {
    pub fn new(store: &S) -> Self {
        let agent = format!("entidoc:document_saver/{}", VERSION);
        Self {
            store: store.with_config(store.config().with_user_agent(&agent)),
            kind: None,
        }
    }

    /// Store every document under a fresh key of `kind`
    ///
    /// Takes precedence over any key carried in document metadata.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Store handle used by this saver
    pub fn store(&self) -> &S {
        &self.store
    }

    fn batch_size(&self) -> usize {
        self.store.config().write_batch_size.max(1)
    }

    /// Convert and write `documents`, returning their stored keys in order
    ///
    /// Every document is converted before the first batch is committed, so a
    /// document without a resolvable key fails the call without partial writes.
    pub async fn upsert_documents(&self, documents: &[Document]) -> StoreResult<Vec<Key>> {
        let entities = documents
            .iter()
            .map(|document| self.to_entity(document))
            .collect::<StoreResult<Vec<Entity>>>()?;

        let mut keys = Vec::with_capacity(entities.len());
        let mut batches = 0usize;
        for chunk in entities.chunks(self.batch_size()) {
            let mut batch = self.store.begin_batch();
            for entity in chunk {
                batch.put(entity.clone());
            }
            debug!(mutations = batch.len(), "Committing upsert batch");
            keys.extend(self.store.commit(batch).await?);
            batches += 1;
        }

        info!(documents = documents.len(), batches, "Upserted documents");
        Ok(keys)
    }

    /// Delete the entities behind `documents` and/or explicit key paths
    ///
    /// Documents and paths are paired by position; the longer list decides
    /// how many deletes are issued. A non-empty explicit path wins over the
    /// key carried in the paired document's metadata.
    pub async fn delete_documents(
        &self,
        documents: &[Document],
        key_paths: Option<&[Vec<PathSegment>]>,
    ) -> StoreResult<()> {
        let key_paths = key_paths.unwrap_or_default();
        let count = documents.len().max(key_paths.len());

        let keys = (0..count)
            .map(|i| self.delete_key(documents.get(i), key_paths.get(i)))
            .collect::<StoreResult<Vec<Key>>>()?;

        let mut batches = 0usize;
        for chunk in keys.chunks(self.batch_size()) {
            let mut batch = self.store.begin_batch();
            for key in chunk {
                batch.delete(key.clone());
            }
            debug!(mutations = batch.len(), "Committing delete batch");
            self.store.commit(batch).await?;
            batches += 1;
        }

        info!(deleted = keys.len(), batches, "Deleted documents");
        Ok(())
    }

    fn to_entity(&self, document: &Document) -> StoreResult<Entity> {
        let payload = document_to_entity(document, &self.store)?;
        let key = match (&self.kind, payload.key) {
            (Some(kind), _) => self.store.incomplete_key(kind)?,
            (None, Some(key)) => key,
            (None, None) => return Err(ambiguous(document).into()),
        };

        let mut entity = self.store.entity(key);
        entity.update(payload.properties);
        Ok(entity)
    }

    fn delete_key(
        &self,
        document: Option<&Document>,
        key_path: Option<&Vec<PathSegment>>,
    ) -> StoreResult<Key> {
        if let Some(path) = key_path.filter(|path| !path.is_empty()) {
            return Ok(self.store.key(path)?);
        }

        let Some(document) = document else {
            return Err(ConversionError::AmbiguousKey {
                document: "<none>".to_string(),
            }
            .into());
        };
        match document_to_entity(document, &self.store)?.key {
            Some(key) => Ok(key),
            None => Err(ambiguous(document).into()),
        }
    }
}

fn ambiguous(document: &Document) -> ConversionError {
    ConversionError::AmbiguousKey {
        document: format!("{:?}", document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use entidoc_core::{ClientConfig, PropertyValue, StoreError};
    use serde_json::json;

    fn key_metadata(kind: &str, name: &str) -> serde_json::Value {
        json!({"path": [kind, name], "datastore_type": "key"})
    }

    fn path(kind: &str, name: &str) -> Vec<PathSegment> {
        vec![PathSegment::from(kind), PathSegment::from(name)]
    }

    #[tokio::test]
    async fn test_upsert_with_kind_allocates_keys() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store).with_kind("Note");

        let docs = vec![Document::new("first"), Document::new("second")];
        let keys = saver.upsert_documents(&docs).await.unwrap();

        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.is_complete() && k.kind() == "Note"));

        let stored = store.get(&keys[0]).await.unwrap().unwrap();
        assert_eq!(
            stored.get("page_content"),
            Some(&PropertyValue::from("first"))
        );
    }

    #[tokio::test]
    async fn test_upsert_uses_metadata_key() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store);

        let doc = Document::new(r#"{"title": "Hi"}"#)
            .with_metadata_entry("key", key_metadata("Article", "a1"))
            .with_metadata_entry("views", json!(3));
        let keys = saver.upsert_documents(&[doc]).await.unwrap();

        let expected = Key::from_flat_path(&path("Article", "a1")).unwrap();
        assert_eq!(keys, vec![expected.clone()]);

        let stored = store.get(&expected).await.unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&PropertyValue::from("Hi")));
        assert_eq!(stored.get("views"), Some(&PropertyValue::Integer(3)));
        assert!(stored.get("key").is_none());
    }

    #[tokio::test]
    async fn test_kind_takes_precedence_over_metadata_key() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store).with_kind("Other");

        let doc = Document::new("x").with_metadata_entry("key", key_metadata("Article", "a1"));
        let keys = saver.upsert_documents(&[doc]).await.unwrap();

        assert_eq!(keys[0].kind(), "Other");
    }

    #[tokio::test]
    async fn test_upsert_without_key_is_ambiguous() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store);

        let docs = vec![
            Document::new("ok").with_metadata_entry("key", key_metadata("Foo", "ok")),
            Document::new("no key"),
        ];
        let err = saver.upsert_documents(&docs).await.unwrap_err();

        match err {
            StoreError::Conversion(e) => assert!(e.is_ambiguous_key()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_chunks_by_batch_size() {
        let store =
            MemoryStore::with_client_config(ClientConfig::new().with_write_batch_size(2));
        let saver = DocumentSaver::new(&store).with_kind("Note");

        let docs: Vec<Document> = (0..5).map(|i| Document::new(format!("doc {i}"))).collect();
        saver.upsert_documents(&docs).await.unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.stats().commits, 3);
    }

    #[tokio::test]
    async fn test_delete_by_document_and_explicit_path() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store);
        let docs = vec![
            Document::new("a").with_metadata_entry("key", key_metadata("Foo", "a")),
            Document::new("b").with_metadata_entry("key", key_metadata("Foo", "b")),
            Document::new("c").with_metadata_entry("key", key_metadata("Foo", "c")),
        ];
        saver.upsert_documents(&docs).await.unwrap();

        // explicit path for position 0 overrides doc "a"; position 2 has no doc
        let paths = vec![path("Foo", "b"), Vec::new(), path("Foo", "c")];
        saver
            .delete_documents(&docs[..2], Some(paths.as_slice()))
            .await
            .unwrap();

        let remaining = Key::from_flat_path(&path("Foo", "a")).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&remaining).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_without_key_is_ambiguous() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store);

        let err = saver
            .delete_documents(&[Document::new("orphan")], None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Conversion(ConversionError::AmbiguousKey { .. })
        ));
        assert_eq!(store.stats().commits, 0);
    }

    #[tokio::test]
    async fn test_delete_rejects_malformed_path() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store);

        let paths = vec![vec![PathSegment::from("Foo")]];
        let err = saver.delete_documents(&[], Some(paths.as_slice())).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Conversion(ConversionError::KeyConstruction(_))
        ));
    }

    #[tokio::test]
    async fn test_saver_stamps_user_agent() {
        let store = MemoryStore::new();
        let saver = DocumentSaver::new(&store).with_kind("Note");

        saver.upsert_documents(&[Document::new("x")]).await.unwrap();

        let agent = store.stats().last_user_agent.unwrap();
        assert!(agent.starts_with("entidoc:document_saver/"));
    }
}
