//! # fnflow Context
//!
//! Per-invocation identity and scratch state shared across the functions of
//! one graph invocation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Lifecycle state of one graph invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    Running,
    Finished,
    Failed(String),
}

impl InvocationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvocationStatus::Running)
    }
}

/// Handle to the state of a single invocation.
///
/// Cloning is cheap; all clones share the same scratch store. Scratches of
/// different invocations are disjoint and are dropped with the invocation
/// handle.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    invocation_id: String,
    graph_name: String,
    graph_version: String,
    scratch: Arc<Mutex<HashMap<String, Value>>>,
}

impl InvocationContext {
    /// Creates a context with a freshly minted invocation id.
    pub fn new(
        graph_name: impl Into<String>,
        graph_version: impl Into<String>,
    ) -> Self {
        Self::with_invocation_id(
            Uuid::new_v4().to_string(),
            graph_name,
            graph_version,
        )
    }

    pub fn with_invocation_id(
        invocation_id: impl Into<String>,
        graph_name: impl Into<String>,
        graph_version: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            graph_name: graph_name.into(),
            graph_version: graph_version.into(),
            scratch: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    pub fn graph_version(&self) -> &str {
        &self.graph_version
    }

    /// Stores a value in the invocation scratch.
    pub fn set_state_key(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        tracing::debug!(invocation_id = %self.invocation_id, key = %key, "set state key");
        self.scratch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Reads a value from the invocation scratch. Absent keys read as `None`.
    pub fn get_state_key(&self, key: &str) -> Option<Value> {
        self.scratch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns the context of the function body currently executing on this
    /// task, if the executor has installed one.
    pub fn current() -> Option<InvocationContext> {
        CURRENT_CONTEXT.try_with(InvocationContext::clone).ok()
    }

    /// Runs `f` with this context installed as the task-local current
    /// context. Function bodies are synchronous, so a sync scope suffices.
    pub fn enter_sync<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_CONTEXT.sync_scope(self.clone(), f)
    }
}

tokio::task_local! {
    /// Context of the invocation the executor is currently driving. Nested
    /// or concurrent invocations each observe their own scope; there is no
    /// process-global fallback.
    static CURRENT_CONTEXT: InvocationContext;
}
