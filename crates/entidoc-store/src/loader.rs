//! Document loader
//!
//! Streams the entities matched by a query and converts each into a
//! [`Document`].

use entidoc_core::{entity_to_document, Document, EntityStore, PropertyRouting, Query, StoreResult};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::VERSION;

/// Load documents from a kind or query
///
/// ```rust,ignore
/// let loader = DocumentLoader::new(&store, "Articles")
///     .with_page_properties(["title", "body"]);
/// let docs = loader.load().await?;
/// ```
pub struct DocumentLoader<S> {
    store: S,
    query: Query,
    routing: PropertyRouting,
}

impl<S: EntityStore> DocumentLoader<S> {
    /// Create a loader reading `source` (a kind name or a [`Query`])
    pub fn new(store: &S, source: impl Into<Query>) -> Self {
        let agent = format!("entidoc:document_loader/{}", VERSION);
        Self {
            store: store.with_config(store.config().with_user_agent(&agent)),
            query: source.into(),
            routing: PropertyRouting::default(),
        }
    }

    /// Properties written to page content; all others go to metadata
    pub fn with_page_properties<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.routing = self.routing.with_page_properties(names);
        self
    }

    /// Properties written to metadata
    pub fn with_metadata_properties<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.routing = self.routing.with_metadata_properties(names);
        self
    }

    pub fn with_routing(mut self, routing: PropertyRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Store handle used by this loader
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Convert entities to documents as the query yields them
    pub fn lazy_load(&self) -> BoxStream<'_, StoreResult<Document>> {
        debug!(kind = %self.query.kind, "Loading documents");
        self.store
            .fetch(&self.query)
            .map_ok(move |entity| entity_to_document(&entity, &self.routing))
            .boxed()
    }

    /// Load every matching document
    pub async fn load(&self) -> StoreResult<Vec<Document>> {
        let documents: Vec<Document> = self.lazy_load().try_collect().await?;
        info!(kind = %self.query.kind, count = documents.len(), "Loaded documents");
        Ok(documents)
    }
}
