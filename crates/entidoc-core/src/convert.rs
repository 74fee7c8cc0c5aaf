//! Entity <-> document conversion
//!
//! ## Routing
//!
//! [`entity_to_document`] splits an entity's properties between page content
//! and metadata using two optional name lists:
//!
//! - page set = `page_properties`, or every property not in `metadata_properties`
//! - metadata set = `metadata_properties`, or every property not in the page set
//!
//! A name listed in both goes to both destinations. Names without a matching
//! property are skipped. The entity key is always written to metadata under
//! `key` as a tagged key; a property named `key` bound for metadata is moved
//! to page content instead.
//!
//! ## Page content
//!
//! One routed property is written as its plain text (strings unquoted);
//! zero or several are written as a JSON object. [`document_to_entity`]
//! reverses this: a JSON object is merged into the property bag, any other
//! text becomes a single `page_content` property.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::client::KeyBuilder;
use crate::document::Document;
use crate::error::ConversionResult;
use crate::key::Key;
use crate::value::{Entity, PropertyMap, PropertyValue};
use crate::wire::{self, WireTag};

/// Metadata entry holding the entity key
pub const KEY_METADATA: &str = "key";

/// Property receiving page content that is not a JSON object
pub const PAGE_CONTENT_PROPERTY: &str = "page_content";

/// Which properties go to page content and which to metadata
///
/// Empty lists mean "unconstrained"; see the module docs for the rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRouting {
    pub page_properties: Vec<String>,
    pub metadata_properties: Vec<String>,
}

impl PropertyRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties written to page content
    pub fn with_page_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_properties = names.into_iter().map(Into::into).collect();
        self
    }

    /// Properties written to metadata
    pub fn with_metadata_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_properties = names.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve the page and metadata name sets for `properties`
    fn resolve<'a>(&'a self, properties: &'a PropertyMap) -> (BTreeSet<&'a str>, BTreeSet<&'a str>) {
        let all: BTreeSet<&str> = properties.keys().map(String::as_str).collect();
        let requested_meta: BTreeSet<&str> =
            self.metadata_properties.iter().map(String::as_str).collect();

        let page: BTreeSet<&str> = if self.page_properties.is_empty() {
            all.difference(&requested_meta).copied().collect()
        } else {
            self.page_properties.iter().map(String::as_str).collect()
        };

        let meta = if requested_meta.is_empty() {
            all.difference(&page).copied().collect()
        } else {
            requested_meta
        };

        (page, meta)
    }
}

/// Key and property bag recovered from a document
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPayload {
    /// Key from the document's `key` metadata, if it held a tagged key
    pub key: Option<Key>,
    pub properties: PropertyMap,
}

/// Convert a stored entity into a document
///
/// Deterministic for a given entity and routing: names are visited in
/// lexicographic order.
///
/// The metadata slot `key` always holds the entity key. A property named
/// `key` routed to metadata is written to page content instead, and page
/// content is then always a JSON object so the property survives a round
/// trip through [`document_to_entity`].
pub fn entity_to_document(entity: &Entity, routing: &PropertyRouting) -> Document {
    let (page_names, meta_names) = routing.resolve(&entity.properties);

    let mut metadata = Map::new();
    metadata.insert(KEY_METADATA.to_string(), wire::key_to_wire(&entity.key));

    let mut page = Map::new();
    let mut displaced_key = false;
    for name in meta_names {
        let Some(value) = entity.properties.get(name) else {
            continue;
        };
        if name == KEY_METADATA {
            warn!(key = %entity.key, "Property named `key` collides with the entity key, moving it to page content");
            page.insert(name.to_string(), wire::to_wire(value));
            displaced_key = true;
            continue;
        }
        metadata.insert(name.to_string(), wire::to_wire(value));
    }

    for name in page_names {
        if let Some(value) = entity.properties.get(name) {
            page.insert(name.to_string(), wire::to_wire(value));
        }
    }

    let page_content = if page.len() == 1 && !displaced_key {
        page.values().next().map(wire::to_page_text).unwrap_or_default()
    } else {
        wire::to_page_json(&Value::Object(page))
    };

    trace!(
        key = %entity.key,
        metadata_entries = metadata.len(),
        page_len = page_content.len(),
        "Converted entity to document"
    );

    Document {
        page_content,
        metadata,
    }
}

/// Convert a document back into a key and property bag
///
/// Page-content entries take precedence over metadata entries of the same
/// name. Fails only when a tagged key cannot be built.
pub fn document_to_entity<B>(document: &Document, builder: &B) -> ConversionResult<EntityPayload>
where
    B: KeyBuilder + ?Sized,
{
    let mut metadata = document.metadata.clone();

    let key = match metadata.get(KEY_METADATA) {
        Some(Value::Object(object)) if WireTag::of(object) == Some(WireTag::Key) => {
            Some(wire::key_from_wire(object, builder)?)
        }
        _ => None,
    };
    if key.is_some() {
        metadata.remove(KEY_METADATA);
    }

    let mut properties = wire::map_from_wire(&metadata, builder)?;

    if !document.page_content.is_empty() {
        match serde_json::from_str::<Value>(&document.page_content) {
            Ok(Value::Object(content)) => {
                properties.extend(wire::map_from_wire(&content, builder)?);
            }
            _ => {
                properties.insert(
                    PAGE_CONTENT_PROPERTY.to_string(),
                    PropertyValue::String(document.page_content.clone()),
                );
            }
        }
    }

    trace!(
        has_key = key.is_some(),
        properties = properties.len(),
        "Converted document to entity payload"
    );

    Ok(EntityPayload { key, properties })
}
