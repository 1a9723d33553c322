use crate::codec::DEFAULT_ENCODER;
use crate::types::ValueType;
use anyhow::Result;
use fnflow_context::InvocationContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One named, typed parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered argument bundle handed to a function body.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: Vec<(String, Value)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a serde-serializable argument.
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self> {
        self.values.push((name.into(), serde_json::to_value(value)?));
        Ok(self)
    }

    pub fn push_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.push((name.into(), value));
    }

    /// Typed access by parameter name.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| anyhow::anyhow!("missing argument `{name}`"))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a function body hands back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    /// A produced value; a sequence value fans out downstream.
    Value(Value),
    /// Nothing: the current element is filtered out of the graph.
    Skip,
}

impl FunctionOutput {
    /// Wraps a serde-serializable value.
    pub fn value(value: impl Serialize) -> Result<Self> {
        Ok(FunctionOutput::Value(serde_json::to_value(value)?))
    }
}

pub type FunctionBody = Arc<
    dyn Fn(&InvocationContext, &Inputs) -> Result<FunctionOutput>
        + Send
        + Sync,
>;

pub type RouterBody =
    Arc<dyn Fn(&InvocationContext, &Inputs) -> Result<Vec<String>> + Send + Sync>;

/// Marks a function as a reducer: its first parameter carries the running
/// accumulator, seeded from the factory before the first element.
#[derive(Clone)]
pub struct Accumulator {
    pub ty: ValueType,
    pub seed: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl Accumulator {
    pub fn new(
        ty: ValueType,
        seed: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            ty,
            seed: Arc::new(seed),
        }
    }

    /// Seeds from a type's `Default` instance.
    pub fn of<T: Default + Serialize>(ty: ValueType) -> Result<Self> {
        let seed = serde_json::to_value(T::default())?;
        Ok(Self {
            ty,
            seed: Arc::new(move || seed.clone()),
        })
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator").field("ty", &self.ty).finish()
    }
}

/// A registered unit of computation: identifier, parameter record, output
/// type, encoder tag, optional accumulator and the callable body.
#[derive(Clone)]
pub struct FunctionSpec {
    name: String,
    params: Vec<Param>,
    output: ValueType,
    encoder: String,
    accumulator: Option<Accumulator>,
    body: FunctionBody,
}

impl FunctionSpec {
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder {
            name: name.into(),
            params: Vec::new(),
            output: None,
            encoder: DEFAULT_ENCODER.to_string(),
            accumulator: None,
            body: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn output(&self) -> &ValueType {
        &self.output
    }

    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.accumulator.as_ref()
    }

    pub fn is_reducer(&self) -> bool {
        self.accumulator.is_some()
    }

    /// The first parameter fed from an upstream edge. For reducers that is
    /// the parameter after the accumulator slot.
    pub fn input_param(&self) -> Option<&Param> {
        if self.is_reducer() {
            self.params.get(1)
        } else {
            self.params.first()
        }
    }

    pub fn invoke(
        &self,
        ctx: &InvocationContext,
        inputs: &Inputs,
    ) -> Result<FunctionOutput> {
        (self.body)(ctx, inputs)
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("output", &self.output)
            .field("encoder", &self.encoder)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

/// Fluent construction of a [`FunctionSpec`].
pub struct FunctionBuilder {
    name: String,
    params: Vec<Param>,
    output: Option<ValueType>,
    encoder: String,
    accumulator: Option<Accumulator>,
    body: Option<FunctionBody>,
}

impl FunctionBuilder {
    pub fn param(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn output(mut self, ty: ValueType) -> Self {
        self.output = Some(ty);
        self
    }

    /// Selects the codec tag for this node's outputs and inputs.
    pub fn encoder(mut self, tag: impl Into<String>) -> Self {
        self.encoder = tag.into();
        self
    }

    /// Declares a reducer; the first parameter becomes the running
    /// accumulator.
    pub fn accumulate(mut self, accumulator: Accumulator) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    /// Overrides the identifier picked at `builder` time.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &Inputs) -> Result<FunctionOutput>
            + Send
            + Sync
            + 'static,
    {
        self.body = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<FunctionSpec> {
        let output = self.output.ok_or_else(|| {
            anyhow::anyhow!("function `{}` declares no output type", self.name)
        })?;
        let body = self.body.ok_or_else(|| {
            anyhow::anyhow!("function `{}` has no body", self.name)
        })?;
        if let Some(accumulator) = &self.accumulator {
            let first = self.params.first().ok_or_else(|| {
                anyhow::anyhow!(
                    "reducer `{}` needs an accumulator parameter",
                    self.name
                )
            })?;
            if !first.ty.compatible_with(&accumulator.ty) {
                anyhow::bail!(
                    "reducer `{}` first parameter is {} but the accumulator is {}",
                    self.name,
                    first.ty,
                    accumulator.ty
                );
            }
        }
        Ok(FunctionSpec {
            name: self.name,
            params: self.params,
            output,
            encoder: self.encoder,
            accumulator: self.accumulator,
            body,
        })
    }
}

/// A node whose body picks the successor(s) that receive the current value,
/// by id, from a candidate set declared on the graph.
#[derive(Clone)]
pub struct RouterSpec {
    name: String,
    params: Vec<Param>,
    encoder: String,
    body: RouterBody,
}

impl RouterSpec {
    pub fn builder(name: impl Into<String>) -> RouterBuilder {
        RouterBuilder {
            name: name.into(),
            params: Vec::new(),
            encoder: DEFAULT_ENCODER.to_string(),
            body: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    pub fn input_param(&self) -> Option<&Param> {
        self.params.first()
    }

    pub fn route(
        &self,
        ctx: &InvocationContext,
        inputs: &Inputs,
    ) -> Result<Vec<String>> {
        (self.body)(ctx, inputs)
    }
}

impl fmt::Debug for RouterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("encoder", &self.encoder)
            .finish()
    }
}

/// Fluent construction of a [`RouterSpec`].
pub struct RouterBuilder {
    name: String,
    params: Vec<Param>,
    encoder: String,
    body: Option<RouterBody>,
}

impl RouterBuilder {
    pub fn param(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn encoder(mut self, tag: impl Into<String>) -> Self {
        self.encoder = tag.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext, &Inputs) -> Result<Vec<String>>
            + Send
            + Sync
            + 'static,
    {
        self.body = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<RouterSpec> {
        let body = self.body.ok_or_else(|| {
            anyhow::anyhow!("router `{}` has no body", self.name)
        })?;
        Ok(RouterSpec {
            name: self.name,
            params: self.params,
            encoder: self.encoder,
            body,
        })
    }
}

/// A graph node: either a data function or a router. The split makes "no
/// node is both" structural.
#[derive(Debug, Clone)]
pub enum Node {
    Function(FunctionSpec),
    Router(RouterSpec),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Function(f) => f.name(),
            Node::Router(r) => r.name(),
        }
    }

    pub fn encoder(&self) -> &str {
        match self {
            Node::Function(f) => f.encoder(),
            Node::Router(r) => r.encoder(),
        }
    }

    pub fn is_router(&self) -> bool {
        matches!(self, Node::Router(_))
    }

    pub fn as_function(&self) -> Option<&FunctionSpec> {
        match self {
            Node::Function(f) => Some(f),
            Node::Router(_) => None,
        }
    }

    pub fn as_router(&self) -> Option<&RouterSpec> {
        match self {
            Node::Router(r) => Some(r),
            Node::Function(_) => None,
        }
    }

    /// The parameter fed from an upstream edge.
    pub fn input_param(&self) -> Option<&Param> {
        match self {
            Node::Function(f) => f.input_param(),
            Node::Router(r) => r.input_param(),
        }
    }

    /// Element type offered to downstream consumers. Routers pass their
    /// input element through unchanged.
    pub fn produced_element_type(&self) -> Option<&ValueType> {
        match self {
            Node::Function(f) => Some(f.output().element()),
            Node::Router(r) => r.input_param().map(|p| p.ty.element()),
        }
    }
}

impl From<FunctionSpec> for Node {
    fn from(spec: FunctionSpec) -> Self {
        Node::Function(spec)
    }
}

impl From<RouterSpec> for Node {
    fn from(spec: RouterSpec) -> Self {
        Node::Router(spec)
    }
}
