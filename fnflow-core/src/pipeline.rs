use crate::error::{Error, Result};
use crate::function::Node;
use crate::graph::Graph;

/// Thin linear sugar over [`Graph`]: each added step consumes the previous
/// step's output; the first step becomes the start node.
pub struct Pipeline {
    name: String,
    description: String,
    graph: Option<Graph>,
    last: Option<String>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            graph: None,
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a step behind the previous one.
    pub fn add_step(&mut self, step: impl Into<Node>) -> Result<()> {
        let step = step.into();
        let step_name = step.name().to_string();
        match self.graph.as_mut() {
            None => {
                self.graph = Some(Graph::new(
                    self.name.clone(),
                    self.description.clone(),
                    step,
                ));
            }
            Some(graph) => {
                let last = self
                    .last
                    .clone()
                    .ok_or_else(|| Error::UnknownNode(step_name.clone()))?;
                graph.add_node(step);
                graph.add_edge_by_name(&last, &step_name)?;
            }
        }
        self.last = Some(step_name);
        Ok(())
    }

    /// Builds the underlying graph. A pipeline without steps has no start
    /// node and is rejected.
    pub fn into_graph(self) -> Result<Graph> {
        self.graph
            .ok_or_else(|| Error::UnknownNode("start".to_string()))
    }
}
