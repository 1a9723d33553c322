use crate::executor::Executor;
use crate::output::OutputStore;
use fnflow_context::{InvocationContext, InvocationStatus};
use fnflow_core::{Error, Graph, Inputs, Pipeline, Result, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on a blocking `run`; `None` waits indefinitely. Applies
    /// only at this outer level — individual tasks are never timed out.
    pub run_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            run_timeout: Some(Duration::from_secs(30)),
        }
    }
}

struct InvocationState {
    outputs: Arc<OutputStore>,
    status: watch::Receiver<InvocationStatus>,
}

/// A graph deployed in-process: owns the per-invocation state table and
/// drives the executor. This is the user-facing `run`/`output` surface.
pub struct LocalGraph {
    graph: Arc<Graph>,
    config: ExecutorConfig,
    invocations: Mutex<HashMap<String, InvocationState>>,
}

impl LocalGraph {
    pub fn new(graph: Graph) -> Result<Self> {
        Self::with_config(graph, ExecutorConfig::default())
    }

    pub fn with_config(graph: Graph, config: ExecutorConfig) -> Result<Self> {
        graph.validate()?;
        Ok(Self {
            graph: Arc::new(graph),
            config,
            invocations: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_pipeline(pipeline: Pipeline) -> Result<Self> {
        Self::new(pipeline.into_graph()?)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Submits one invocation and returns its id. Submit-time validation
    /// runs synchronously; with `block_until_done` the call also waits for
    /// the terminal state and surfaces a failed invocation as an error.
    pub async fn run(
        &self,
        inputs: Inputs,
        block_until_done: bool,
    ) -> Result<String> {
        let executor = Executor::new(self.graph.clone());
        executor.check_submit(&inputs)?;

        let ctx =
            InvocationContext::new(self.graph.name(), self.graph.version());
        let invocation_id = ctx.invocation_id().to_string();
        let outputs = Arc::new(OutputStore::new());
        let (status_tx, status_rx) = watch::channel(InvocationStatus::Running);
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                invocation_id.clone(),
                InvocationState {
                    outputs: outputs.clone(),
                    status: status_rx,
                },
            );

        let handle = tokio::spawn(async move {
            let result = executor.execute(&ctx, &outputs, inputs);
            let status = match &result {
                Ok(()) => InvocationStatus::Finished,
                Err(e) => {
                    tracing::error!(
                        invocation_id = %ctx.invocation_id(),
                        error = %e,
                        "invocation failed"
                    );
                    InvocationStatus::Failed(e.to_string())
                }
            };
            let _ = status_tx.send(status);
            result
        });

        if block_until_done {
            let joined = match self.config.run_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            self.invocations
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .remove(&invocation_id);
                            return Err(Error::InvocationFailed(
                                anyhow::anyhow!(
                                    "invocation `{invocation_id}` timed out after {limit:?}"
                                ),
                            ));
                        }
                    }
                }
                None => handle.await,
            };
            joined.map_err(|e| {
                Error::InvocationFailed(anyhow::anyhow!(
                    "executor task failed: {e}"
                ))
            })??;
        }
        Ok(invocation_id)
    }

    /// Waits for an invocation to reach a terminal state.
    pub async fn wait(&self, invocation_id: &str) -> Result<InvocationStatus> {
        let mut status = self
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(invocation_id)
            .map(|state| state.status.clone())
            .ok_or_else(|| {
                Error::InvocationFailed(anyhow::anyhow!(
                    "no such invocation `{invocation_id}`"
                ))
            })?;
        loop {
            let current = status.borrow().clone();
            if current.is_terminal() {
                return Ok(current);
            }
            status.changed().await.map_err(|_| {
                Error::InvocationFailed(anyhow::anyhow!(
                    "invocation `{invocation_id}` was dropped before finishing"
                ))
            })?;
        }
    }

    /// Ordered outputs recorded for `function` in the given invocation.
    pub fn output(
        &self,
        invocation_id: &str,
        function: &str,
    ) -> Result<Vec<Value>> {
        let no_results = || Error::NoResults {
            function: function.to_string(),
            graph: self.graph.name().to_string(),
        };
        let outputs = self
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(invocation_id)
            .map(|state| state.outputs.clone())
            .ok_or_else(no_results)?;
        outputs
            .decoded(function, self.graph.registry())
            .ok_or_else(no_results)?
    }
}
