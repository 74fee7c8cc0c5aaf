//! Entity store glue for Entidoc
//!
//! This crate provides the I/O side of the document/entity adapter: loading
//! documents from queries, saving and deleting documents in batches, and
//! persisting chat message histories. All of it goes through the
//! [`EntityStore`](entidoc_core::EntityStore) trait, so any backend works.
//!
//! ## Features
//!
//! - **DocumentLoader**: Stream documents out of a kind or query
//! - **DocumentSaver**: Batched upsert/delete of documents
//! - **ChatMessageHistory**: One entity per chat session
//! - **MemoryStore**: In-process store for tests and embedding
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entidoc_store::{DocumentLoader, DocumentSaver, MemoryStore};
//! use entidoc_core::Document;
//!
//! let store = MemoryStore::new();
//! let saver = DocumentSaver::new(&store).with_kind("Notes");
//! saver.upsert_documents(&[Document::new("hello")]).await?;
//!
//! let docs = DocumentLoader::new(&store, "Notes").load().await?;
//! assert_eq!(docs[0].page_content, "hello");
//! ```

pub mod chat_history;
pub mod loader;
pub mod memory;
pub mod saver;

// Re-exports
pub use chat_history::{
    ChatMessage, ChatMessageHistory, MessageContent, MessageConverter, MessageKind,
};
pub use loader::DocumentLoader;
pub use memory::{MemoryStore, MemoryStoreStats};
pub use saver::DocumentSaver;

/// Version string used in component user agents
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");
