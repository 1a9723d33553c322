use crate::local::{ExecutorConfig, LocalGraph};
use fnflow_context::InvocationStatus;
use fnflow_core::{Error, Graph, Inputs, Pipeline, Result, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A deployment peer honoring the same invocation contract as the local
/// executor. Transports are external; this crate ships only the in-process
/// implementation used to exercise the adapter path.
pub trait RemoteBackend: Send + Sync {
    async fn deploy(&self, graph: Graph) -> Result<()>;

    async fn run(
        &self,
        graph_name: &str,
        inputs: Inputs,
        block_until_done: bool,
    ) -> Result<String>;

    async fn output(
        &self,
        graph_name: &str,
        invocation_id: &str,
        function: &str,
    ) -> Result<Vec<Value>>;

    async fn wait(
        &self,
        graph_name: &str,
        invocation_id: &str,
    ) -> Result<InvocationStatus>;
}

/// Handle to a graph deployed on a backend; same surface as [`LocalGraph`].
pub struct RemoteGraph<B: RemoteBackend> {
    name: String,
    backend: Arc<B>,
}

impl<B: RemoteBackend> RemoteGraph<B> {
    /// Deploys `graph` to the backend and returns a handle to it.
    pub async fn deploy(graph: Graph, backend: Arc<B>) -> Result<Self> {
        let name = graph.name().to_string();
        backend.deploy(graph).await?;
        Ok(Self { name, backend })
    }

    /// Deploys a pipeline's underlying graph.
    pub async fn deploy_pipeline(
        pipeline: Pipeline,
        backend: Arc<B>,
    ) -> Result<Self> {
        Self::deploy(pipeline.into_graph()?, backend).await
    }

    /// Handle to an already-deployed graph. Nothing is checked here; a
    /// missing graph surfaces when the handle is first used.
    pub fn by_name(name: impl Into<String>, backend: Arc<B>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn run(
        &self,
        inputs: Inputs,
        block_until_done: bool,
    ) -> Result<String> {
        self.backend.run(&self.name, inputs, block_until_done).await
    }

    pub async fn output(
        &self,
        invocation_id: &str,
        function: &str,
    ) -> Result<Vec<Value>> {
        self.backend
            .output(&self.name, invocation_id, function)
            .await
    }

    pub async fn wait(&self, invocation_id: &str) -> Result<InvocationStatus> {
        self.backend.wait(&self.name, invocation_id).await
    }
}

/// In-process backend: deployed graphs run on the local executor.
pub struct InProcBackend {
    config: ExecutorConfig,
    graphs: Mutex<HashMap<String, Arc<LocalGraph>>>,
}

impl InProcBackend {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            config,
            graphs: Mutex::new(HashMap::new()),
        }
    }

    fn deployed(&self, name: &str) -> Result<Arc<LocalGraph>> {
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                Error::InvocationFailed(anyhow::anyhow!(
                    "graph `{name}` is not deployed"
                ))
            })
    }
}

impl Default for InProcBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteBackend for InProcBackend {
    async fn deploy(&self, graph: Graph) -> Result<()> {
        let name = graph.name().to_string();
        tracing::info!(graph = %name, "deploying graph in process");
        let local = LocalGraph::with_config(graph, self.config.clone())?;
        self.graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(local));
        Ok(())
    }

    async fn run(
        &self,
        graph_name: &str,
        inputs: Inputs,
        block_until_done: bool,
    ) -> Result<String> {
        self.deployed(graph_name)?
            .run(inputs, block_until_done)
            .await
    }

    async fn output(
        &self,
        graph_name: &str,
        invocation_id: &str,
        function: &str,
    ) -> Result<Vec<Value>> {
        self.deployed(graph_name)?.output(invocation_id, function)
    }

    async fn wait(
        &self,
        graph_name: &str,
        invocation_id: &str,
    ) -> Result<InvocationStatus> {
        self.deployed(graph_name)?.wait(invocation_id).await
    }
}
