//! # fnflow Runtime
//!
//! Invocation scheduling, output retrieval and deployment handles for
//! fnflow graphs.

mod executor;
mod local;
mod output;
mod remote;


pub use executor::Executor;
pub use local::{ExecutorConfig, LocalGraph};
pub use output::OutputStore;
pub use remote::{InProcBackend, RemoteBackend, RemoteGraph};
