use crate::core::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key of a store entry. Hashable, equality-comparable identifiers only.
///
/// JSON formats narrow every key to text on disk; integer keys come back
/// as `Key::Text` after a JSON round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Integer(i64),
    Text(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Payload of a value the store cannot compare: an application type frozen
/// into MessagePack bytes together with a caller-chosen tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaquePayload {
    pub type_tag: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Opaque(Arc<OpaquePayload>),
}

/// Change-tracking classification of a value.
///
/// `Immutable` and `MutableEq` values support equality comparison;
/// `Opaque` values do not and are conservatively treated as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Immutable,
    MutableEq,
    Opaque,
}

/// Tag naming a value's concrete variant; the target selector for auto-cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
    Bytes,
    List,
    Map,
    Opaque,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Opaque => "opaque",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Value {
    /// Wrap an arbitrary serializable application value as an opaque payload.
    pub fn opaque<T: Serialize>(type_tag: impl Into<String>, value: &T) -> Result<Self> {
        let data = rmp_serde::to_vec(value)
            .map_err(|e| StoreError::Encode(format!("Failed to freeze opaque value: {}", e)))?;
        Ok(Self::Opaque(Arc::new(OpaquePayload {
            type_tag: type_tag.into(),
            data,
        })))
    }

    /// Thaw an opaque payload back into a concrete type.
    pub fn downcast<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::Opaque(payload) => rmp_serde::from_slice(&payload.data)
                .map_err(|e| StoreError::Decode(format!("Failed to thaw opaque value: {}", e))),
            other => Err(StoreError::Decode(format!(
                "Not an opaque value: {}",
                other.type_tag()
            ))),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null
            | Self::Boolean(_)
            | Self::Integer(_)
            | Self::Float(_)
            | Self::Text(_)
            | Self::Bytes(_) => ValueKind::Immutable,
            Self::List(_) | Self::Map(_) => ValueKind::MutableEq,
            Self::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Boolean(_) => TypeTag::Boolean,
            Self::Integer(_) => TypeTag::Integer,
            Self::Float(_) => TypeTag::Float,
            Self::Text(_) => TypeTag::Text,
            Self::Bytes(_) => TypeTag::Bytes,
            Self::List(_) => TypeTag::List,
            Self::Map(_) => TypeTag::Map,
            Self::Opaque(_) => TypeTag::Opaque,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// True when `self` and `other` are the same opaque payload object,
    /// not merely equal content. The only identity notion the store has.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Narrow to the JSON data model. Integer keys of nested maps are
    /// already text; bytes become number arrays, non-finite floats become
    /// null. Opaque values have no JSON rendition and fail.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;
        match self {
            Self::Null => Ok(Json::Null),
            Self::Boolean(b) => Ok(Json::Bool(*b)),
            Self::Integer(i) => Ok(Json::from(*i)),
            Self::Float(f) => Ok(serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null)),
            Self::Text(s) => Ok(Json::String(s.clone())),
            Self::Bytes(b) => Ok(Json::Array(b.iter().map(|byte| Json::from(*byte)).collect())),
            Self::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Ok(Json::Array(out))
            }
            Self::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(Json::Object(out))
            }
            Self::Opaque(payload) => Err(StoreError::Encode(format!(
                "Opaque value '{}' is not representable in JSON",
                payload.type_tag
            ))),
        }
    }

    /// Lift a JSON value into the store data model. Whole numbers become
    /// integers, everything else maps one to one.
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Boolean(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::Text(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                // NaN compares equal to NaN so redundant reassignment of a
                // NaN slot does not dirty the store forever.
                (a.is_nan() && b.is_nan()) || a == b
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Self::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Self::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Self::Bytes(b) => {
                5u8.hash(state);
                b.hash(state);
            }
            Self::List(items) => {
                6u8.hash(state);
                items.hash(state);
            }
            Self::Map(map) => {
                7u8.hash(state);
                map.hash(state);
            }
            Self::Opaque(payload) => {
                8u8.hash(state);
                payload.type_tag.hash(state);
                payload.data.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::List(items) => write!(f, "<list of {}>", items.len()),
            Self::Map(map) => write!(f, "<map of {}>", map.len()),
            Self::Opaque(payload) => write!(f, "<opaque {}>", payload.type_tag),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

/// Injectable text-to-type coercion used by auto-cast: given the incoming
/// text and the tag of the value it replaces, produce the rehydrated value.
pub type CastFn = fn(&str, TypeTag) -> Result<Value>;

/// Default cast: parses integers, floats and booleans; text bytes become
/// UTF-8 bytes; list and map targets parse the text as a JSON fragment.
pub fn default_cast(text: &str, target: TypeTag) -> Result<Value> {
    let fail = |detail: &str| {
        StoreError::Cast(format!(
            "Cannot cast '{}' to {}: {}",
            text, target, detail
        ))
    };

    match target {
        TypeTag::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| fail(&e.to_string())),
        TypeTag::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| fail(&e.to_string())),
        TypeTag::Boolean => match text.trim() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(fail("expected true/false/1/0")),
        },
        TypeTag::Text => Ok(Value::Text(text.to_string())),
        TypeTag::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
        TypeTag::List | TypeTag::Map => {
            let json: serde_json::Value =
                serde_json::from_str(text).map_err(|e| fail(&e.to_string()))?;
            let value = Value::from_json(json);
            if value.type_tag() == target {
                Ok(value)
            } else {
                Err(fail("JSON fragment has a different shape"))
            }
        }
        TypeTag::Null | TypeTag::Opaque => Err(fail("no cast exists for this target")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Value::Integer(1).kind(), ValueKind::Immutable);
        assert_eq!(Value::Text("x".into()).kind(), ValueKind::Immutable);
        assert_eq!(Value::Bytes(vec![1, 2]).kind(), ValueKind::Immutable);
        assert_eq!(Value::List(vec![]).kind(), ValueKind::MutableEq);
        assert_eq!(Value::Map(BTreeMap::new()).kind(), ValueKind::MutableEq);
        let opaque = Value::opaque("point", &(1i32, 2i32)).unwrap();
        assert_eq!(opaque.kind(), ValueKind::Opaque);
    }

    #[test]
    fn test_nan_equality() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Float(2.0));
        assert_eq!(Value::Float(3.5), Value::Float(3.5));
    }

    #[test]
    fn test_same_object_is_identity_not_equality() {
        let a = Value::opaque("point", &(1i32, 2i32)).unwrap();
        let b = Value::opaque("point", &(1i32, 2i32)).unwrap();
        assert_eq!(a, b);
        assert!(!a.same_object(&b));
        assert!(a.same_object(&a.clone()));
    }

    #[test]
    fn test_opaque_downcast_round_trip() {
        let original = (42u32, "hello".to_string());
        let value = Value::opaque("pair", &original).unwrap();
        let thawed: (u32, String) = value.downcast().unwrap();
        assert_eq!(thawed, original);
    }

    #[test]
    fn test_default_cast_parses_primitives() {
        assert_eq!(
            default_cast("7", TypeTag::Integer).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(
            default_cast("2.5", TypeTag::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            default_cast("true", TypeTag::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            default_cast("[1,2]", TypeTag::List).unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn test_default_cast_failure() {
        assert!(matches!(
            default_cast("not a number", TypeTag::Integer),
            Err(StoreError::Cast(_))
        ));
        assert!(matches!(
            default_cast("anything", TypeTag::Opaque),
            Err(StoreError::Cast(_))
        ));
    }

    #[test]
    fn test_json_narrowing() {
        let bytes = Value::Bytes(vec![1, 2, 3]);
        assert_eq!(bytes.to_json().unwrap(), serde_json::json!([1, 2, 3]));

        let nan = Value::Float(f64::NAN);
        assert_eq!(nan.to_json().unwrap(), serde_json::Value::Null);

        let opaque = Value::opaque("point", &(1i32, 2i32)).unwrap();
        assert!(matches!(opaque.to_json(), Err(StoreError::Encode(_))));
    }

    #[test]
    fn test_from_json_whole_numbers_become_integers() {
        let value = Value::from_json(serde_json::json!({"a": 1, "b": 2.5}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["a"], Value::Integer(1));
        assert_eq!(map["b"], Value::Float(2.5));
    }
}
