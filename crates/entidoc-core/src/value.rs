//! Store-native property values and entities

use std::collections::BTreeMap;

use crate::key::Key;

/// Property bag of an entity, ordered by property name
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single property value as held by the entity store
///
/// Values nest: arrays and maps hold further values, and an entity value
/// carries its own key and property bag. Stored entities never reference
/// themselves, so the nesting is always finite.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    GeoPoint(GeoPoint),
    Key(Key),
    Entity(Box<Entity>),
    Array(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl PropertyValue {
    /// Short name of the variant, for logs and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::GeoPoint(_) => "geopoint",
            Self::Key(_) => "key",
            Self::Entity(_) => "entity",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<GeoPoint> for PropertyValue {
    fn from(v: GeoPoint) -> Self {
        Self::GeoPoint(v)
    }
}

impl From<Key> for PropertyValue {
    fn from(v: Key) -> Self {
        Self::Key(v)
    }
}

impl From<Entity> for PropertyValue {
    fn from(v: Entity) -> Self {
        Self::Entity(Box::new(v))
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        Self::Array(v)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        Self::Map(v)
    }
}

/// A record in the store: a key plus its property bag
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: Key,
    pub properties: PropertyMap,
}

impl Entity {
    /// Create an empty entity at `key`
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: PropertyMap::new(),
        }
    }

    /// Set a property, builder style
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property, returning the previous value
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(name.into(), value.into())
    }

    /// Merge a property bag into this entity, replacing same-named properties
    pub fn update(&mut self, properties: PropertyMap) {
        self.properties.extend(properties);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}
