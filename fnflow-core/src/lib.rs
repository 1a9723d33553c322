//! # fnflow Core
//!
//! Graph model, value codecs and function descriptors for fnflow.

mod codec;
mod error;
mod file;
mod function;
mod graph;
mod pipeline;
mod types;


pub use codec::{
    CborCodec, CodecError, CodecRegistry, JsonCodec, ValueCodec,
    DEFAULT_ENCODER,
};
pub use error::{Error, Result};
pub use file::File;
pub use function::{
    Accumulator, FunctionBuilder, FunctionOutput, FunctionSpec, Inputs, Node,
    Param, RouterBuilder, RouterSpec,
};
pub use graph::Graph;
pub use pipeline::Pipeline;
pub use types::ValueType;

/// In-memory value currency carried along graph edges.
pub type Value = serde_json::Value;

/// Prelude module for core functionality
pub mod prelude {
    pub use crate::{
        Accumulator, CodecRegistry, Error, File, FunctionOutput, FunctionSpec,
        Graph, Inputs, Node, Param, Pipeline, RouterSpec, Value, ValueType,
    };
    pub use fnflow_context::{InvocationContext, InvocationStatus};
}
