use thiserror::Error;

/// Errors surfaced by graph construction, validation and execution.
#[derive(Debug, Error)]
pub enum Error {
    /// A node's encoder tag is not present in the codec registry. Raised
    /// synchronously from `run`, before any task executes.
    #[error("encoder `{0}` is not registered")]
    InvalidEncoder(String),

    /// Edge endpoints, or submitted start arguments, do not agree with the
    /// declared parameter record.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An edge or route referenced an id that is not in the graph.
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    /// A router returned a target outside its declared candidate set.
    #[error("router `{router}` returned unknown route `{target}`")]
    UnknownRoute { router: String, target: String },

    /// `output` was asked for a function that produced nothing in this
    /// invocation.
    #[error("no results found for fn {function} on graph {graph}")]
    NoResults { function: String, graph: String },

    /// A function body failed. The invocation is terminal-failed; outputs
    /// recorded before the failure stay retrievable.
    #[error("invocation failed: {0}")]
    InvocationFailed(#[source] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
