//! Structural value transcoder
//!
//! Converts [`PropertyValue`]s to and from a JSON-safe representation. Scalars,
//! arrays and maps map onto their JSON counterparts; keys, geo points and
//! nested entities become tagged objects carrying a `datastore_type` field:
//!
//! ```json
//! {"path": ["Foo", "bar"], "datastore_type": "key"}
//! {"latitude": 1.0, "longitude": 2.0, "datastore_type": "geopoint"}
//! {"key": ["Foo", "bar"], "properties": {...}, "datastore_type": "entity"}
//! ```
//!
//! Decoding only treats an object as tagged when the discriminator holds one
//! of the three known tags; any other object is an ordinary map.

use std::io;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::client::KeyBuilder;
use crate::error::{ConversionError, ConversionResult};
use crate::key::{flat_path_from_json, Key};
use crate::value::{Entity, GeoPoint, PropertyMap, PropertyValue};

/// Name of the discriminator field on tagged objects
pub const DATASTORE_TYPE: &str = "datastore_type";

const PATH_FIELD: &str = "path";
const KEY_FIELD: &str = "key";
const PROPERTIES_FIELD: &str = "properties";
const LATITUDE_FIELD: &str = "latitude";
const LONGITUDE_FIELD: &str = "longitude";

/// Known discriminator values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireTag {
    Key,
    GeoPoint,
    Entity,
}

impl WireTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::GeoPoint => "geopoint",
            Self::Entity => "entity",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "key" => Some(Self::Key),
            "geopoint" => Some(Self::GeoPoint),
            "entity" => Some(Self::Entity),
            _ => None,
        }
    }

    /// Tag carried by `object`, if it is one of the known tags
    pub fn of(object: &Map<String, Value>) -> Option<Self> {
        object
            .get(DATASTORE_TYPE)
            .and_then(Value::as_str)
            .and_then(Self::parse)
    }
}

// ============================================================================
// Store -> Wire
// ============================================================================

/// Encode a property value as JSON
pub fn to_wire(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Integer(i) => Value::from(*i),
        // Non-finite doubles have no JSON form and collapse to null
        PropertyValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        PropertyValue::String(s) => Value::String(s.clone()),
        PropertyValue::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
        PropertyValue::GeoPoint(point) => geopoint_to_wire(point),
        PropertyValue::Key(key) => key_to_wire(key),
        PropertyValue::Entity(entity) => entity_to_wire(entity),
        PropertyValue::Array(items) => Value::Array(items.iter().map(to_wire).collect()),
        PropertyValue::Map(map) => Value::Object(map_to_wire(map)),
    }
}

/// Encode every value of a property map, keeping the names
pub fn map_to_wire(map: &PropertyMap) -> Map<String, Value> {
    map.iter()
        .map(|(name, value)| (name.clone(), to_wire(value)))
        .collect()
}

/// Tagged form of a key: `{"path": [...], "datastore_type": "key"}`
pub fn key_to_wire(key: &Key) -> Value {
    let mut object = Map::new();
    object.insert(PATH_FIELD.to_string(), key.path_to_json());
    object.insert(DATASTORE_TYPE.to_string(), WireTag::Key.as_str().into());
    Value::Object(object)
}

fn geopoint_to_wire(point: &GeoPoint) -> Value {
    let mut object = Map::new();
    object.insert(
        LATITUDE_FIELD.to_string(),
        Number::from_f64(point.latitude).map_or(Value::Null, Value::Number),
    );
    object.insert(
        LONGITUDE_FIELD.to_string(),
        Number::from_f64(point.longitude).map_or(Value::Null, Value::Number),
    );
    object.insert(DATASTORE_TYPE.to_string(), WireTag::GeoPoint.as_str().into());
    Value::Object(object)
}

fn entity_to_wire(entity: &Entity) -> Value {
    let mut object = Map::new();
    object.insert(KEY_FIELD.to_string(), entity.key.path_to_json());
    object.insert(
        PROPERTIES_FIELD.to_string(),
        Value::Object(map_to_wire(&entity.properties)),
    );
    object.insert(DATASTORE_TYPE.to_string(), WireTag::Entity.as_str().into());
    Value::Object(object)
}

// ============================================================================
// Wire -> Store
// ============================================================================

/// Decode a JSON value into a property value
///
/// Keys are minted through `builder`; a tagged key or entity whose path the
/// builder rejects fails with [`ConversionError::KeyConstruction`].
pub fn from_wire<B>(value: &Value, builder: &B) -> ConversionResult<PropertyValue>
where
    B: KeyBuilder + ?Sized,
{
    Ok(match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Number(n) => number_from_wire(n),
        Value::String(s) => PropertyValue::String(s.clone()),
        Value::Array(items) => PropertyValue::Array(
            items
                .iter()
                .map(|item| from_wire(item, builder))
                .collect::<ConversionResult<_>>()?,
        ),
        Value::Object(object) => object_from_wire(object, builder)?,
    })
}

/// Decode every value of a JSON object, keeping the names
pub fn map_from_wire<B>(object: &Map<String, Value>, builder: &B) -> ConversionResult<PropertyMap>
where
    B: KeyBuilder + ?Sized,
{
    object
        .iter()
        .map(|(name, value)| Ok((name.clone(), from_wire(value, builder)?)))
        .collect()
}

/// Decode a `key`-tagged object into a key
///
/// The path is read from `path`, or from `key` for objects written by older
/// encoders that used that field name.
pub fn key_from_wire<B>(object: &Map<String, Value>, builder: &B) -> ConversionResult<Key>
where
    B: KeyBuilder + ?Sized,
{
    let path = object
        .get(PATH_FIELD)
        .or_else(|| object.get(KEY_FIELD))
        .ok_or_else(|| ConversionError::key_construction("key-tagged value has no path"))?;
    builder.key(&flat_path_from_json(path)?)
}

fn object_from_wire<B>(object: &Map<String, Value>, builder: &B) -> ConversionResult<PropertyValue>
where
    B: KeyBuilder + ?Sized,
{
    match WireTag::of(object) {
        Some(WireTag::Key) => return key_from_wire(object, builder).map(PropertyValue::Key),
        Some(WireTag::GeoPoint) => {
            if let Some(point) = geopoint_from_wire(object) {
                return Ok(PropertyValue::GeoPoint(point));
            }
            trace!("geopoint tag without numeric coordinates, decoding as map");
        }
        Some(WireTag::Entity) => {
            if let Some(entity) = entity_from_wire(object, builder)? {
                return Ok(PropertyValue::Entity(Box::new(entity)));
            }
            trace!("entity tag with non-object properties, decoding as map");
        }
        None => {}
    }

    map_from_wire(object, builder).map(PropertyValue::Map)
}

fn geopoint_from_wire(object: &Map<String, Value>) -> Option<GeoPoint> {
    let latitude = object.get(LATITUDE_FIELD)?.as_f64()?;
    let longitude = object.get(LONGITUDE_FIELD)?.as_f64()?;
    Some(GeoPoint::new(latitude, longitude))
}

fn entity_from_wire<B>(object: &Map<String, Value>, builder: &B) -> ConversionResult<Option<Entity>>
where
    B: KeyBuilder + ?Sized,
{
    let properties = match object.get(PROPERTIES_FIELD) {
        None => PropertyMap::new(),
        Some(Value::Object(properties)) => map_from_wire(properties, builder)?,
        Some(_) => return Ok(None),
    };

    let path = object
        .get(KEY_FIELD)
        .ok_or_else(|| ConversionError::key_construction("entity-tagged value has no key"))?;
    let key = builder.key(&flat_path_from_json(path)?)?;

    let mut entity = builder.entity(key);
    entity.update(properties);
    Ok(Some(entity))
}

fn number_from_wire(n: &Number) -> PropertyValue {
    match n.as_i64() {
        Some(i) => PropertyValue::Integer(i),
        None => PropertyValue::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

// ============================================================================
// Page content text
// ============================================================================

/// JSON formatter writing `", "` between elements and `": "` after keys
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize a wire value as page-content JSON text
pub fn to_page_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// Plain textual form of a single wire value
///
/// Strings are written as is; everything else as JSON text.
pub fn to_page_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => to_page_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::PathSegment;
    use serde_json::json;

    /// Builder accepting any path the key type accepts
    struct PlainKeys;

    impl KeyBuilder for PlainKeys {
        fn key(&self, flat_path: &[PathSegment]) -> ConversionResult<Key> {
            Key::from_flat_path(flat_path)
        }

        fn incomplete_key(&self, kind: &str) -> ConversionResult<Key> {
            Key::incomplete(kind, None)
        }
    }

    fn key(kind: &str, name: &str) -> Key {
        Key::from_flat_path(&[PathSegment::from(kind), PathSegment::from(name)]).unwrap()
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(to_wire(&PropertyValue::Null), Value::Null);
        assert_eq!(to_wire(&PropertyValue::Bool(true)), json!(true));
        assert_eq!(to_wire(&PropertyValue::Integer(-4)), json!(-4));
        assert_eq!(to_wire(&PropertyValue::Double(1.5)), json!(1.5));
        assert_eq!(to_wire(&PropertyValue::from("text")), json!("text"));

        assert_eq!(from_wire(&json!(null), &PlainKeys).unwrap(), PropertyValue::Null);
        assert_eq!(from_wire(&json!(7), &PlainKeys).unwrap(), PropertyValue::Integer(7));
        assert_eq!(from_wire(&json!(7.25), &PlainKeys).unwrap(), PropertyValue::Double(7.25));
        assert_eq!(from_wire(&json!("s"), &PlainKeys).unwrap(), PropertyValue::from("s"));
    }

    #[test]
    fn test_non_finite_double_becomes_null() {
        assert_eq!(to_wire(&PropertyValue::Double(f64::NAN)), Value::Null);
        assert_eq!(to_wire(&PropertyValue::Double(f64::INFINITY)), Value::Null);
    }

    #[test]
    fn test_bytes_encode_as_base64() {
        let value = PropertyValue::Bytes(b"hello".to_vec());
        assert_eq!(to_wire(&value), json!("aGVsbG8="));
    }

    #[test]
    fn test_key_encoding() {
        let wire = to_wire(&PropertyValue::Key(key("Foo", "bar")));
        assert_eq!(wire, json!({"path": ["Foo", "bar"], "datastore_type": "key"}));

        let decoded = from_wire(&wire, &PlainKeys).unwrap();
        assert_eq!(decoded, PropertyValue::Key(key("Foo", "bar")));
    }

    #[test]
    fn test_legacy_key_field_accepted() {
        let wire = json!({"key": ["abc", "xyz"], "datastore_type": "key"});
        let decoded = from_wire(&wire, &PlainKeys).unwrap();
        assert_eq!(decoded, PropertyValue::Key(key("abc", "xyz")));
    }

    #[test]
    fn test_geopoint_encoding() {
        let wire = to_wire(&PropertyValue::GeoPoint(GeoPoint::new(1.0, 2.0)));
        assert_eq!(
            wire,
            json!({"latitude": 1.0, "longitude": 2.0, "datastore_type": "geopoint"})
        );

        // integer coordinates decode too
        let decoded = from_wire(
            &json!({"latitude": 1, "longitude": 0, "datastore_type": "geopoint"}),
            &PlainKeys,
        )
        .unwrap();
        assert_eq!(decoded, PropertyValue::GeoPoint(GeoPoint::new(1.0, 0.0)));
    }

    #[test]
    fn test_nested_entity_encoding() {
        let inner = Entity::new(key("Inner", "i1")).with_property("where", GeoPoint::new(3.0, 4.0));
        let outer = Entity::new(key("NestedKind", "n1"))
            .with_property("child", inner.clone())
            .with_property("tags", vec![PropertyValue::from("a"), PropertyValue::from("b")]);

        let wire = to_wire(&PropertyValue::from(outer.clone()));
        assert_eq!(
            wire,
            json!({
                "key": ["NestedKind", "n1"],
                "properties": {
                    "child": {
                        "key": ["Inner", "i1"],
                        "properties": {
                            "where": {"latitude": 3.0, "longitude": 4.0, "datastore_type": "geopoint"}
                        },
                        "datastore_type": "entity"
                    },
                    "tags": ["a", "b"]
                },
                "datastore_type": "entity"
            })
        );

        let decoded = from_wire(&wire, &PlainKeys).unwrap();
        assert_eq!(decoded, PropertyValue::from(outer));
    }

    #[test]
    fn test_entity_without_properties_field() {
        let decoded = from_wire(
            &json!({"key": ["NestedKind", 123], "datastore_type": "entity"}),
            &PlainKeys,
        )
        .unwrap();
        let expected_key =
            Key::from_flat_path(&[PathSegment::from("NestedKind"), PathSegment::Id(123)]).unwrap();
        assert_eq!(decoded, PropertyValue::from(Entity::new(expected_key)));
    }

    #[test]
    fn test_unrecognized_tag_is_plain_map() {
        let wire = json!({"datastore_type": "unknown_tag", "x": 1});
        let decoded = from_wire(&wire, &PlainKeys).unwrap();

        let mut expected = PropertyMap::new();
        expected.insert("datastore_type".to_string(), PropertyValue::from("unknown_tag"));
        expected.insert("x".to_string(), PropertyValue::Integer(1));
        assert_eq!(decoded, PropertyValue::Map(expected));
    }

    #[test]
    fn test_non_string_tag_is_plain_map() {
        let decoded = from_wire(&json!({"datastore_type": 3, "path": ["a", "b"]}), &PlainKeys)
            .unwrap();
        assert!(matches!(decoded, PropertyValue::Map(_)));
    }

    #[test]
    fn test_geopoint_tag_without_coordinates_is_plain_map() {
        let decoded = from_wire(
            &json!({"latitude": "north", "datastore_type": "geopoint"}),
            &PlainKeys,
        )
        .unwrap();
        assert!(matches!(decoded, PropertyValue::Map(_)));
    }

    #[test]
    fn test_malformed_key_path_is_error() {
        let err = from_wire(&json!({"path": ["Foo"], "datastore_type": "key"}), &PlainKeys)
            .unwrap_err();
        assert!(matches!(err, ConversionError::KeyConstruction(_)));

        let err = from_wire(&json!({"datastore_type": "key"}), &PlainKeys).unwrap_err();
        assert!(matches!(err, ConversionError::KeyConstruction(_)));
    }

    #[test]
    fn test_keys_inside_arrays_and_maps() {
        let wire = json!([
            "data",
            2,
            {"nested": {"path": ["abc", "xyz"], "datastore_type": "key"}}
        ]);
        let decoded = from_wire(&wire, &PlainKeys).unwrap();

        let mut nested = PropertyMap::new();
        nested.insert("nested".to_string(), PropertyValue::Key(key("abc", "xyz")));
        assert_eq!(
            decoded,
            PropertyValue::Array(vec![
                PropertyValue::from("data"),
                PropertyValue::Integer(2),
                PropertyValue::Map(nested),
            ])
        );
        assert_eq!(to_wire(&decoded), wire);
    }

    #[test]
    fn test_page_json_spacing() {
        let value = json!({"x": "hi", "y": [1, 2]});
        assert_eq!(to_page_json(&value), r#"{"x": "hi", "y": [1, 2]}"#);
        assert_eq!(to_page_json(&json!({})), "{}");
    }

    #[test]
    fn test_page_text() {
        assert_eq!(to_page_text(&json!("plain")), "plain");
        assert_eq!(to_page_text(&json!(2)), "2");
        assert_eq!(to_page_text(&json!(true)), "true");
        assert_eq!(to_page_text(&json!(["a", 1])), r#"["a", 1]"#);
    }
}
