//! # fnflow - Function Graph Execution Engine
//!
//! fnflow executes user-declared directed graphs of typed functions:
//! values propagate along validated edges, sequence outputs fan out over
//! their elements, accumulator nodes fold element streams in order, and
//! routers pick successors at run time.
//!
//! ## Features
//!
//! - `runtime` (default): invocation executor and deployment handles
//!
//! ## Quick Start
//!
//! ```rust
//! use fnflow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let double = FunctionSpec::builder("double")
//!         .param("x", ValueType::Int)
//!         .output(ValueType::Int)
//!         .body(|_ctx, inputs| {
//!             let x: i64 = inputs.get("x")?;
//!             FunctionOutput::value(x * 2)
//!         })
//!         .build()?;
//!
//!     let graph = Graph::new("doubler", "doubles an integer", double);
//!     let graph = LocalGraph::new(graph)?;
//!     let invocation_id =
//!         graph.run(Inputs::new().with("x", 21)?, true).await?;
//!     assert_eq!(
//!         graph.output(&invocation_id, "double")?,
//!         vec![Value::from(42)]
//!     );
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export core functionality
pub use fnflow_context as context;
pub use fnflow_core::*;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use fnflow_runtime as runtime;

/// Initializes a tracing subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Prelude module for easy imports
pub mod prelude {
    pub use fnflow_context::{InvocationContext, InvocationStatus};
    pub use fnflow_core::prelude::*;

    #[cfg(feature = "runtime")]
    #[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
    pub use fnflow_runtime::{
        ExecutorConfig, InProcBackend, LocalGraph, RemoteBackend, RemoteGraph,
    };
}
