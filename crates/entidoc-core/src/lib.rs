//! Core data model and conversions for Entidoc
//!
//! This crate maps between two data models:
//!
//! - **Entities**: a hierarchical [`Key`] plus a property bag of
//!   [`PropertyValue`]s (scalars, sequences, mappings, geo points, keys and
//!   nested entities), as held by a schemaless key-value entity store.
//! - **Documents**: free-form page content plus a flat JSON metadata bag, as
//!   consumed by document and chat oriented applications.
//!
//! ## Modules
//!
//! - **wire**: recursive transcoder between property values and tagged JSON
//! - **convert**: entity to document and document to entity conversion
//! - **client**: collaborator traits a store implementation provides
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entidoc_core::{document_to_entity, entity_to_document, PropertyRouting};
//!
//! let document = entity_to_document(&entity, &PropertyRouting::default());
//! let payload = document_to_entity(&document, &store)?;
//! assert_eq!(payload.key.as_ref(), Some(&entity.key));
//! ```
//!
//! Conversions are pure and synchronous; they can run concurrently from any
//! number of threads. The only collaborator they call is the store's
//! [`KeyBuilder`], which is read-only.

pub mod client;
pub mod convert;
pub mod document;
pub mod error;
pub mod key;
pub mod value;
pub mod wire;

// Re-exports
pub use client::{EntityStore, KeyBuilder, Mutation, Query, WriteBatch};
pub use convert::{document_to_entity, entity_to_document, EntityPayload, PropertyRouting};
pub use document::Document;
pub use entidoc_config::ClientConfig;
pub use error::{ConversionError, ConversionResult, StoreError, StoreResult};
pub use key::{Key, PathSegment};
pub use value::{Entity, GeoPoint, PropertyMap, PropertyValue};
