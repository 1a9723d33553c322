use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag carried by function parameters and outputs, checked at every
/// edge when the graph is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    File,
    /// A named struct-like payload.
    Record(String),
    /// A sequence output fans out: each element becomes an independent
    /// downstream input.
    Seq(Box<ValueType>),
}

impl ValueType {
    pub fn record(name: impl Into<String>) -> Self {
        ValueType::Record(name.into())
    }

    pub fn seq(element: ValueType) -> Self {
        ValueType::Seq(Box::new(element))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, ValueType::Seq(_))
    }

    /// The type a downstream consumer sees: the element type for sequences,
    /// the type itself otherwise.
    pub fn element(&self) -> &ValueType {
        match self {
            ValueType::Seq(inner) => inner,
            other => other,
        }
    }

    pub fn compatible_with(&self, other: &ValueType) -> bool {
        self == other
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Str => write!(f, "str"),
            ValueType::Bytes => write!(f, "bytes"),
            ValueType::File => write!(f, "file"),
            ValueType::Record(name) => write!(f, "{name}"),
            ValueType::Seq(inner) => write!(f, "seq<{inner}>"),
        }
    }
}
