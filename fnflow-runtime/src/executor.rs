use crate::output::OutputStore;
use fnflow_context::InvocationContext;
use fnflow_core::{
    Error, FunctionOutput, FunctionSpec, Graph, Inputs, Node, Result, Value,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// One unit of work: a node plus the argument bundle it will receive.
struct Task {
    node: String,
    inputs: Inputs,
}

/// Drives a single invocation of a graph over a FIFO task queue. Elements
/// headed for a reducer are buffered and folded sequentially once every
/// upstream producer has gone quiet.
pub struct Executor {
    graph: Arc<Graph>,
    ancestors: HashMap<String, HashSet<String>>,
}

impl Executor {
    pub fn new(graph: Arc<Graph>) -> Self {
        let ancestors = graph.ancestors();
        Self { graph, ancestors }
    }

    /// Submit-time validation, run before any task is dispatched: every
    /// encoder tag must be registered and the start arguments must agree
    /// with the start node's parameter record.
    pub fn check_submit(&self, start_inputs: &Inputs) -> Result<()> {
        for node in self.graph.nodes() {
            if !self.graph.registry().contains(node.encoder()) {
                return Err(Error::InvalidEncoder(node.encoder().to_string()));
            }
        }
        let start = self.graph.start_node();
        let node = self
            .graph
            .node(start)
            .ok_or_else(|| Error::UnknownNode(start.to_string()))?;
        let declared: Vec<&str> = match node {
            Node::Function(f) if f.is_reducer() => f
                .params()
                .iter()
                .skip(1)
                .map(|p| p.name.as_str())
                .collect(),
            Node::Function(f) => {
                f.params().iter().map(|p| p.name.as_str()).collect()
            }
            Node::Router(r) => {
                r.params().iter().map(|p| p.name.as_str()).collect()
            }
        };
        for name in start_inputs.names() {
            if !declared.contains(&name) {
                return Err(Error::TypeMismatch(format!(
                    "unknown argument `{name}` for fn `{start}`"
                )));
            }
        }
        for name in &declared {
            if start_inputs.value(name).is_none() {
                return Err(Error::TypeMismatch(format!(
                    "missing argument `{name}` for fn `{start}`"
                )));
            }
        }
        Ok(())
    }

    /// Runs the task loop until the queue and every reducer buffer drain.
    pub fn execute(
        &self,
        ctx: &InvocationContext,
        outputs: &OutputStore,
        start_inputs: Inputs,
    ) -> Result<()> {
        tracing::info!(
            invocation_id = %ctx.invocation_id(),
            graph = %self.graph.name(),
            "invocation started"
        );
        let mut queue = VecDeque::new();
        let mut buffers: HashMap<String, VecDeque<Value>> = HashMap::new();
        let start = self.graph.start_node().to_string();
        let start_inputs = self.encode_start_inputs(&start, start_inputs)?;
        queue.push_back(Task {
            node: start,
            inputs: start_inputs,
        });
        loop {
            while let Some(task) = queue.pop_front() {
                self.dispatch(ctx, outputs, task, &mut queue, &mut buffers)?;
            }
            match self.ready_reducer(&buffers) {
                Some(name) => {
                    let elements = buffers.remove(&name).unwrap_or_default();
                    self.fold(
                        ctx,
                        outputs,
                        &name,
                        elements,
                        &mut queue,
                        &mut buffers,
                    )?;
                }
                None => break,
            }
        }
        tracing::info!(
            invocation_id = %ctx.invocation_id(),
            graph = %self.graph.name(),
            "invocation finished"
        );
        Ok(())
    }

    /// Invocation inputs pass through the start node's codec like any edge
    /// value.
    fn encode_start_inputs(
        &self,
        start: &str,
        inputs: Inputs,
    ) -> Result<Inputs> {
        let node = self
            .graph
            .node(start)
            .ok_or_else(|| Error::UnknownNode(start.to_string()))?;
        let codec = self
            .graph
            .registry()
            .get(node.encoder())
            .ok_or_else(|| Error::InvalidEncoder(node.encoder().to_string()))?;
        let mut encoded = Inputs::new();
        for (name, value) in inputs.iter() {
            let bytes = codec
                .encode(value)
                .map_err(|e| Error::InvocationFailed(e.into()))?;
            let value = codec
                .decode(&bytes)
                .map_err(|e| Error::InvocationFailed(e.into()))?;
            encoded.push_value(name, value);
        }
        Ok(encoded)
    }

    fn dispatch(
        &self,
        ctx: &InvocationContext,
        outputs: &OutputStore,
        task: Task,
        queue: &mut VecDeque<Task>,
        buffers: &mut HashMap<String, VecDeque<Value>>,
    ) -> Result<()> {
        let node = self
            .graph
            .node(&task.node)
            .ok_or_else(|| Error::UnknownNode(task.node.clone()))?;
        tracing::debug!(
            invocation_id = %ctx.invocation_id(),
            node = %task.node,
            "dispatching task"
        );
        match node {
            Node::Router(router) => {
                let targets = ctx
                    .enter_sync(|| router.route(ctx, &task.inputs))
                    .map_err(Error::InvocationFailed)?;
                let element = router
                    .input_param()
                    .and_then(|p| task.inputs.value(&p.name))
                    .cloned()
                    .ok_or_else(|| {
                        Error::TypeMismatch(format!(
                            "router `{}` received no input",
                            router.name()
                        ))
                    })?;
                let candidates =
                    self.graph.router_candidates(router.name());
                for target in targets {
                    if !candidates.iter().any(|c| c == &target) {
                        return Err(Error::UnknownRoute {
                            router: router.name().to_string(),
                            target,
                        });
                    }
                    tracing::debug!(
                        router = %router.name(),
                        target = %target,
                        "routed element"
                    );
                    self.feed(
                        &target,
                        element.clone(),
                        router.encoder(),
                        queue,
                        buffers,
                    )?;
                }
            }
            Node::Function(f) => {
                let inputs = self.with_seed_if_reducer(f, task.inputs);
                let output = ctx
                    .enter_sync(|| f.invoke(ctx, &inputs))
                    .map_err(Error::InvocationFailed)?;
                self.record_and_propagate(
                    ctx, outputs, f, output, queue, buffers,
                )?;
            }
        }
        Ok(())
    }

    /// A reducer reached directly as the start node still needs its
    /// accumulator slot filled from the seed.
    fn with_seed_if_reducer(
        &self,
        f: &FunctionSpec,
        inputs: Inputs,
    ) -> Inputs {
        let Some(accumulator) = f.accumulator() else {
            return inputs;
        };
        let Some(acc_param) = f.params().first() else {
            return inputs;
        };
        if inputs.value(&acc_param.name).is_some() {
            return inputs;
        }
        let mut seeded = Inputs::new();
        seeded.push_value(acc_param.name.clone(), (accumulator.seed)());
        for (name, value) in inputs.iter() {
            seeded.push_value(name, value.clone());
        }
        seeded
    }

    /// Records produced elements under the node's codec and hands each one
    /// to every successor. `Skip` and null elements are filtered out.
    fn record_and_propagate(
        &self,
        ctx: &InvocationContext,
        outputs: &OutputStore,
        f: &FunctionSpec,
        output: FunctionOutput,
        queue: &mut VecDeque<Task>,
        buffers: &mut HashMap<String, VecDeque<Value>>,
    ) -> Result<()> {
        let value = match output {
            FunctionOutput::Skip => {
                tracing::debug!(node = %f.name(), "element filtered");
                return Ok(());
            }
            FunctionOutput::Value(value) => value,
        };
        let elements = if f.output().is_seq() {
            match value {
                Value::Array(items) => items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .collect(),
                other => {
                    return Err(Error::InvocationFailed(anyhow::anyhow!(
                        "fn `{}` declares {} but returned a non-sequence value: {other}",
                        f.name(),
                        f.output()
                    )))
                }
            }
        } else if value.is_null() {
            Vec::new()
        } else {
            vec![value]
        };
        let codec = self
            .graph
            .registry()
            .get(f.encoder())
            .ok_or_else(|| Error::InvalidEncoder(f.encoder().to_string()))?;
        for element in &elements {
            let bytes = codec
                .encode(element)
                .map_err(|e| Error::InvocationFailed(e.into()))?;
            outputs.append(f.name(), bytes, f.encoder());
        }
        tracing::debug!(
            invocation_id = %ctx.invocation_id(),
            node = %f.name(),
            produced = elements.len(),
            "recorded outputs"
        );
        for element in elements {
            for successor in self.graph.successors(f.name()) {
                self.feed(
                    successor,
                    element.clone(),
                    f.encoder(),
                    queue,
                    buffers,
                )?;
            }
        }
        Ok(())
    }

    /// Enqueues one element for a consumer, buffering it when the consumer
    /// is a reducer.
    fn feed(
        &self,
        target: &str,
        element: Value,
        producer_tag: &str,
        queue: &mut VecDeque<Task>,
        buffers: &mut HashMap<String, VecDeque<Value>>,
    ) -> Result<()> {
        let node = self
            .graph
            .node(target)
            .ok_or_else(|| Error::UnknownNode(target.to_string()))?;
        let element =
            self.translate(element, producer_tag, node.encoder())?;
        match node {
            Node::Function(f) if f.is_reducer() => {
                buffers
                    .entry(f.name().to_string())
                    .or_default()
                    .push_back(element);
            }
            _ => {
                let param = node.input_param().ok_or_else(|| {
                    Error::TypeMismatch(format!(
                        "fn `{target}` takes no input"
                    ))
                })?;
                let mut inputs = Inputs::new();
                inputs.push_value(param.name.clone(), element);
                queue.push_back(Task {
                    node: target.to_string(),
                    inputs,
                });
            }
        }
        Ok(())
    }

    /// Values crossing between differently-encoded nodes are round-tripped
    /// through the consumer's codec, surfacing lossy conversions.
    fn translate(&self, value: Value, from: &str, to: &str) -> Result<Value> {
        if from == to {
            return Ok(value);
        }
        let codec = self
            .graph
            .registry()
            .get(to)
            .ok_or_else(|| Error::InvalidEncoder(to.to_string()))?;
        let bytes = codec
            .encode(&value)
            .map_err(|e| Error::InvocationFailed(e.into()))?;
        codec
            .decode(&bytes)
            .map_err(|e| Error::InvocationFailed(e.into()))
    }

    /// A reducer whose every ancestor is quiet. With the queue drained, new
    /// elements can only come from another buffered reducer upstream, so a
    /// reducer with no such ancestor is safe to fold.
    fn ready_reducer(
        &self,
        buffers: &HashMap<String, VecDeque<Value>>,
    ) -> Option<String> {
        let mut pending: Vec<&String> = buffers
            .iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(name, _)| name)
            .collect();
        pending.sort();
        pending
            .iter()
            .find(|name| {
                let ancestors = self.ancestors.get(name.as_str());
                pending.iter().all(|other| {
                    other == *name
                        || ancestors
                            .map_or(true, |a| !a.contains(other.as_str()))
                })
            })
            .map(|name| name.to_string())
    }

    /// Folds every buffered element through the reducer in arrival order,
    /// then records and propagates the final accumulator.
    fn fold(
        &self,
        ctx: &InvocationContext,
        outputs: &OutputStore,
        name: &str,
        mut elements: VecDeque<Value>,
        queue: &mut VecDeque<Task>,
        buffers: &mut HashMap<String, VecDeque<Value>>,
    ) -> Result<()> {
        let node = self
            .graph
            .node(name)
            .ok_or_else(|| Error::UnknownNode(name.to_string()))?;
        let not_a_reducer = || {
            Error::TypeMismatch(format!("fn `{name}` is not a reducer"))
        };
        let f = node.as_function().ok_or_else(not_a_reducer)?;
        let accumulator = f.accumulator().ok_or_else(not_a_reducer)?;
        let acc_param = f.params().first().ok_or_else(not_a_reducer)?;
        let data_param = f.input_param().ok_or_else(not_a_reducer)?;
        tracing::debug!(
            invocation_id = %ctx.invocation_id(),
            node = %name,
            elements = elements.len(),
            "folding reducer"
        );
        let mut acc = (accumulator.seed)();
        while let Some(element) = elements.pop_front() {
            let mut inputs = Inputs::new();
            inputs.push_value(acc_param.name.clone(), acc.clone());
            inputs.push_value(data_param.name.clone(), element);
            let step = ctx
                .enter_sync(|| f.invoke(ctx, &inputs))
                .map_err(Error::InvocationFailed)?;
            acc = match step {
                FunctionOutput::Value(value) => value,
                FunctionOutput::Skip => acc,
            };
        }
        self.record_and_propagate(
            ctx,
            outputs,
            f,
            FunctionOutput::Value(acc),
            queue,
            buffers,
        )
    }
}
