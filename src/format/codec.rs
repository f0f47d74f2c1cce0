use crate::core::{Key, Result, StoreError, Value};

/// Entries of a snapshot on their way to or from disk.
pub type Entries = Vec<(Key, Value)>;

/// Encode path selector. `Fast` serializes the whole snapshot in one call.
/// `Safe` is the registry-independent path used for teardown-time saves of
/// the binary format: each entry is encoded on its own and the container
/// framing is written by hand, so no encoder state is shared across
/// entries. Both paths produce identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    Fast,
    Safe,
}

/// Encode/decode capability of a file format. The store calls through this
/// interface only; byte-level layout is the codec's business.
pub trait Codec: Send + Sync {
    fn encode(&self, entries: &[(Key, Value)], mode: EncodeMode) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Entries>;
}

// ============================================================================
// Binary object graph (MessagePack)
// ============================================================================

pub struct BinaryCodec;

impl BinaryCodec {
    /// MessagePack array header for `len` elements, written by hand so the
    /// safe path can frame independently encoded entries.
    fn array_header(len: usize) -> Result<Vec<u8>> {
        if len < 16 {
            Ok(vec![0x90 | len as u8])
        } else if len <= u16::MAX as usize {
            let mut header = vec![0xdc];
            header.extend_from_slice(&(len as u16).to_be_bytes());
            Ok(header)
        } else if len <= u32::MAX as usize {
            let mut header = vec![0xdd];
            header.extend_from_slice(&(len as u32).to_be_bytes());
            Ok(header)
        } else {
            Err(StoreError::Encode(format!(
                "Snapshot too large for MessagePack: {} entries",
                len
            )))
        }
    }
}

impl Codec for BinaryCodec {
    fn encode(&self, entries: &[(Key, Value)], mode: EncodeMode) -> Result<Vec<u8>> {
        match mode {
            EncodeMode::Fast => rmp_serde::to_vec(&entries)
                .map_err(|e| StoreError::Encode(format!("MessagePack encode failed: {}", e))),
            EncodeMode::Safe => {
                let mut out = Self::array_header(entries.len())?;
                for entry in entries {
                    let encoded = rmp_serde::to_vec(entry).map_err(|e| {
                        StoreError::Encode(format!(
                            "MessagePack encode failed for key '{}': {}",
                            entry.0, e
                        ))
                    })?;
                    out.extend_from_slice(&encoded);
                }
                Ok(out)
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entries> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| StoreError::Decode(format!("MessagePack decode failed: {}", e)))
    }
}

// ============================================================================
// Verbose text object graph (YAML)
// ============================================================================

pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, entries: &[(Key, Value)], _mode: EncodeMode) -> Result<Vec<u8>> {
        serde_yaml::to_string(&entries)
            .map(String::into_bytes)
            .map_err(|e| StoreError::Encode(format!("YAML encode failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entries> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| StoreError::Decode(format!("YAML decode failed: {}", e)))
    }
}

// ============================================================================
// Structured text (JSON), compact and pretty
// ============================================================================

/// Lossy by design: every key is narrowed to text, values are restricted to
/// the JSON data model (see `Value::to_json` for the narrowing rules).
pub struct JsonCodec {
    pub pretty: bool,
}

impl Codec for JsonCodec {
    fn encode(&self, entries: &[(Key, Value)], _mode: EncodeMode) -> Result<Vec<u8>> {
        let mut object = serde_json::Map::with_capacity(entries.len());
        for (key, value) in entries {
            object.insert(key.to_string(), value.to_json()?);
        }
        let object = serde_json::Value::Object(object);
        let result = if self.pretty {
            serde_json::to_vec_pretty(&object)
        } else {
            serde_json::to_vec(&object)
        };
        result.map_err(|e| StoreError::Encode(format!("JSON encode failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Entries> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Decode(format!("JSON decode failed: {}", e)))?;
        match json {
            serde_json::Value::Object(object) => Ok(object
                .into_iter()
                .map(|(k, v)| (Key::Text(k), Value::from_json(v)))
                .collect()),
            other => Err(StoreError::Decode(format!(
                "Expected a JSON object at the top level, got {}",
                match other {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    _ => "null",
                }
            ))),
        }
    }
}
