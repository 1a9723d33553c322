use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Encoder tag assigned to nodes that do not pick one.
pub const DEFAULT_ENCODER: &str = "cbor";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// A named `(encode, decode)` pair, applied when outputs are recorded and
/// at every edge crossing.
pub trait ValueCodec: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Binary self-describing codec; accepts any in-memory value.
pub struct CborCodec;

impl ValueCodec for CborCodec {
    fn name(&self) -> &str {
        "cbor"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(value, &mut buf)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        ciborium::de::from_reader(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// UTF-8 text codec; values must be JSON-representable.
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Maps encoder tags to codecs. Built-ins are registered up front; the
/// registry is treated as read-only once a graph starts running against it.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ValueCodec>>,
}

impl CodecRegistry {
    /// Registry with the built-in `cbor` and `json` codecs.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(Arc::new(CborCodec));
        registry.register(Arc::new(JsonCodec));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn ValueCodec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn ValueCodec>> {
        self.codecs.get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
