use fnflow_core::{CodecRegistry, Error, Result, Value};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

struct FunctionOutputs {
    encoder: String,
    elements: Vec<Vec<u8>>,
}

/// Per-invocation record of each function's produced elements. Elements are
/// stored as bytes under the producing function's codec tag and decoded on
/// retrieval; readers observe a monotonically growing list.
pub struct OutputStore {
    entries: Mutex<HashMap<String, FunctionOutputs>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn append(&self, function: &str, bytes: Vec<u8>, encoder: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(function.to_string())
            .or_insert_with(|| FunctionOutputs {
                encoder: encoder.to_string(),
                elements: Vec::new(),
            })
            .elements
            .push(bytes);
    }

    /// Decoded elements in recorded order; `None` when the function never
    /// produced anything in this invocation.
    pub fn decoded(
        &self,
        function: &str,
        registry: &CodecRegistry,
    ) -> Option<Result<Vec<Value>>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let outputs = entries.get(function)?;
        let Some(codec) = registry.get(&outputs.encoder) else {
            return Some(Err(Error::InvalidEncoder(outputs.encoder.clone())));
        };
        let mut values = Vec::with_capacity(outputs.elements.len());
        for bytes in &outputs.elements {
            match codec.decode(bytes) {
                Ok(value) => values.push(value),
                Err(e) => return Some(Err(Error::InvocationFailed(e.into()))),
            }
        }
        Some(Ok(values))
    }
}

impl Default for OutputStore {
    fn default() -> Self {
        Self::new()
    }
}
