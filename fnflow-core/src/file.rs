use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Built-in payload for passing file contents through a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub data: Vec<u8>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl File {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
