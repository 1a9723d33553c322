use crate::codec::CodecRegistry;
use crate::error::{Error, Result};
use crate::function::Node;
use std::collections::{HashMap, HashSet, VecDeque};

/// A typed DAG of function and router descriptors with a distinguished
/// start node. Structure is validated as it is assembled; `validate` checks
/// the whole-graph invariants before an invocation is accepted.
#[derive(Clone)]
pub struct Graph {
    name: String,
    version: String,
    description: String,
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Vec<String>>,
    router_targets: HashMap<String, Vec<String>>,
    start: String,
    registry: CodecRegistry,
}

impl Graph {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        start_node: impl Into<Node>,
    ) -> Self {
        let start_node = start_node.into();
        let start = start_node.name().to_string();
        let mut nodes = HashMap::new();
        nodes.insert(start.clone(), start_node);
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            description: description.into(),
            nodes,
            edges: HashMap::new(),
            router_targets: HashMap::new(),
            start,
            registry: CodecRegistry::with_builtins(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn start_node(&self) -> &str {
        &self.start
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Declared successor list of a node, in edge order.
    pub fn successors(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declared candidate set of a router.
    pub fn router_candidates(&self, name: &str) -> &[String] {
        self.router_targets
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registers a node if it is not in the graph yet. Same-name
    /// registration is idempotent.
    pub fn add_node(&mut self, node: impl Into<Node>) {
        let node = node.into();
        self.nodes.entry(node.name().to_string()).or_insert(node);
    }

    /// Declares an edge, registering either spec if needed. Type
    /// compatibility is checked immediately.
    pub fn add_edge(
        &mut self,
        from: impl Into<Node>,
        to: impl Into<Node>,
    ) -> Result<()> {
        let from = from.into();
        let to = to.into();
        let from_name = from.name().to_string();
        let to_name = to.name().to_string();
        self.add_node(from);
        self.add_node(to);
        self.add_edge_by_name(&from_name, &to_name)
    }

    /// Declares an edge between two already-registered nodes.
    pub fn add_edge_by_name(&mut self, from: &str, to: &str) -> Result<()> {
        let producer = self
            .nodes
            .get(from)
            .ok_or_else(|| Error::UnknownNode(from.to_string()))?;
        let consumer = self
            .nodes
            .get(to)
            .ok_or_else(|| Error::UnknownNode(to.to_string()))?;
        if producer.is_router() {
            return Err(Error::TypeMismatch(format!(
                "router `{from}` successors are declared via route()"
            )));
        }
        check_edge_types(producer, consumer)?;
        tracing::debug!(graph = %self.name, from = %from, to = %to, "added edge");
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        Ok(())
    }

    /// Declares the candidate target set of a router, registering the
    /// router and its candidates.
    pub fn route(
        &mut self,
        router: impl Into<Node>,
        candidates: Vec<Node>,
    ) -> Result<()> {
        let router = router.into();
        let router_name = router.name().to_string();
        if !router.is_router() {
            return Err(Error::TypeMismatch(format!(
                "node `{router_name}` is not a router"
            )));
        }
        self.add_node(router);
        let mut names = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            names.push(candidate.name().to_string());
            self.add_node(candidate);
        }
        let router_node = self
            .nodes
            .get(&router_name)
            .ok_or_else(|| Error::UnknownNode(router_name.clone()))?;
        if !router_node.is_router() {
            return Err(Error::TypeMismatch(format!(
                "node `{router_name}` is already registered as a data function"
            )));
        }
        for name in &names {
            let target = self
                .nodes
                .get(name)
                .ok_or_else(|| Error::UnknownNode(name.clone()))?;
            check_edge_types(router_node, target)?;
        }
        tracing::debug!(graph = %self.name, router = %router_name, candidates = names.len(), "declared route");
        self.router_targets.insert(router_name, names);
        Ok(())
    }

    /// Checks the whole-graph invariants: every edge endpoint exists and
    /// every node hangs off the start node. Disconnected nodes are reported
    /// as unknown because no invocation can ever reach them.
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.start) {
            return Err(Error::UnknownNode(self.start.clone()));
        }
        for (from, successors) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(Error::UnknownNode(from.clone()));
            }
            for to in successors {
                if !self.nodes.contains_key(to) {
                    return Err(Error::UnknownNode(to.clone()));
                }
            }
        }
        for (router, targets) in &self.router_targets {
            if !self.nodes.contains_key(router) {
                return Err(Error::UnknownNode(router.clone()));
            }
            for target in targets {
                if !self.nodes.contains_key(target) {
                    return Err(Error::UnknownNode(target.clone()));
                }
            }
        }

        let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in self.links() {
            undirected.entry(from).or_default().push(to);
            undirected.entry(to).or_default().push(from);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([self.start.as_str()]);
        seen.insert(self.start.as_str());
        while let Some(current) = queue.pop_front() {
            for &next in undirected.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        for name in self.nodes.keys() {
            if !seen.contains(name.as_str()) {
                return Err(Error::UnknownNode(name.clone()));
            }
        }
        Ok(())
    }

    /// Transitive ancestor set per node, following edges and router
    /// candidate links. The executor uses this to order reducer folds.
    pub fn ancestors(&self) -> HashMap<String, HashSet<String>> {
        let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in self.links() {
            parents.entry(to).or_default().push(from);
        }
        let mut result = HashMap::new();
        for name in self.nodes.keys() {
            let mut seen: HashSet<String> = HashSet::new();
            let mut queue = VecDeque::from([name.as_str()]);
            while let Some(current) = queue.pop_front() {
                for &parent in parents.get(current).into_iter().flatten() {
                    if seen.insert(parent.to_string()) {
                        queue.push_back(parent);
                    }
                }
            }
            result.insert(name.clone(), seen);
        }
        result
    }

    /// All directed links: declared edges plus router candidate links.
    fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        let edges = self.edges.iter().flat_map(|(from, successors)| {
            successors.iter().map(move |to| (from.as_str(), to.as_str()))
        });
        let routes = self.router_targets.iter().flat_map(|(router, targets)| {
            targets.iter().map(move |to| (router.as_str(), to.as_str()))
        });
        edges.chain(routes)
    }
}

fn check_edge_types(producer: &Node, consumer: &Node) -> Result<()> {
    let (Some(produced), Some(expected)) =
        (producer.produced_element_type(), consumer.input_param())
    else {
        return Ok(());
    };
    if !produced.compatible_with(&expected.ty) {
        return Err(Error::TypeMismatch(format!(
            "edge {} -> {} produces {} but `{}` expects {}",
            producer.name(),
            consumer.name(),
            produced,
            expected.name,
            expected.ty
        )));
    }
    Ok(())
}
