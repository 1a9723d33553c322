//! End-to-end behaviour tests: graph construction, invocation submission,
//! value propagation and per-function output retrieval, run against the
//! local executor and the in-process deployment backend.

use fnflow::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MyObject {
    x: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Sum {
    val: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ComplexObject {
    invocation_id: String,
    graph_name: String,
    graph_version: String,
}

fn simple_function() -> FunctionSpec {
    FunctionSpec::builder("simple_function")
        .param("x", ValueType::record("MyObject"))
        .output(ValueType::record("MyObject"))
        .body(|_ctx, inputs| {
            let x: MyObject = inputs.get("x")?;
            FunctionOutput::value(MyObject {
                x: format!("{}b", x.x),
            })
        })
        .build()
        .expect("valid spec")
}

fn simple_function_multiple_inputs() -> FunctionSpec {
    FunctionSpec::builder("simple_function_multiple_inputs")
        .param("x", ValueType::record("MyObject"))
        .param("y", ValueType::Int)
        .output(ValueType::record("MyObject"))
        .body(|_ctx, inputs| {
            let x: MyObject = inputs.get("x")?;
            let y: usize = inputs.get("y")?;
            FunctionOutput::value(MyObject {
                x: format!("{}{}", x.x, "b".repeat(y)),
            })
        })
        .build()
        .expect("valid spec")
}

fn simple_function_with_json_encoder() -> FunctionSpec {
    FunctionSpec::builder("simple_function_with_json_encoder")
        .param("x", ValueType::Str)
        .output(ValueType::Str)
        .encoder("json")
        .body(|_ctx, inputs| {
            let x: String = inputs.get("x")?;
            FunctionOutput::value(format!("{x}b"))
        })
        .build()
        .expect("valid spec")
}

fn simple_function_multiple_inputs_json() -> FunctionSpec {
    FunctionSpec::builder("simple_function_multiple_inputs_json")
        .param("x", ValueType::Str)
        .param("y", ValueType::Int)
        .output(ValueType::Str)
        .encoder("json")
        .body(|_ctx, inputs| {
            let x: String = inputs.get("x")?;
            let y: usize = inputs.get("y")?;
            FunctionOutput::value(format!("{x}{}", "b".repeat(y)))
        })
        .build()
        .expect("valid spec")
}

fn simple_function_with_str_as_input() -> FunctionSpec {
    FunctionSpec::builder("simple_function_with_str_as_input")
        .param("x", ValueType::Str)
        .output(ValueType::Str)
        .body(|_ctx, inputs| {
            let x: String = inputs.get("x")?;
            FunctionOutput::value(format!("{x}cc"))
        })
        .build()
        .expect("valid spec")
}

fn simple_function_with_invalid_encoder() -> FunctionSpec {
    FunctionSpec::builder("simple_function_with_invalid_encoder")
        .param("x", ValueType::record("MyObject"))
        .output(ValueType::record("MyObject"))
        .encoder("invalid")
        .body(|_ctx, inputs| {
            let x: MyObject = inputs.get("x")?;
            FunctionOutput::value(x)
        })
        .build()
        .expect("valid spec")
}

fn simple_function_ctx() -> FunctionSpec {
    FunctionSpec::builder("simple_function_ctx")
        .param("x", ValueType::record("MyObject"))
        .output(ValueType::record("ComplexObject"))
        .body(|ctx, inputs| {
            let _x: MyObject = inputs.get("x")?;
            ctx.set_state_key("my_key", json!(10));
            FunctionOutput::value(ComplexObject {
                invocation_id: ctx.invocation_id().to_string(),
                graph_name: ctx.graph_name().to_string(),
                graph_version: ctx.graph_version().to_string(),
            })
        })
        .build()
        .expect("valid spec")
}

fn simple_function_ctx_b() -> FunctionSpec {
    FunctionSpec::builder("simple_function_ctx_b")
        .param("x", ValueType::record("ComplexObject"))
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let _x: ComplexObject = inputs.get("x")?;
            let ctx = InvocationContext::current()
                .ok_or_else(|| anyhow::anyhow!("no current context"))?;
            assert!(ctx.get_state_key("not_present").is_none());
            let val = ctx
                .get_state_key("my_key")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| anyhow::anyhow!("my_key was not set"))?;
            FunctionOutput::value(val + 1)
        })
        .build()
        .expect("valid spec")
}

fn generate_seq() -> FunctionSpec {
    FunctionSpec::builder("generate_seq")
        .param("x", ValueType::Int)
        .output(ValueType::seq(ValueType::Int))
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value((0..x).collect::<Vec<i64>>())
        })
        .build()
        .expect("valid spec")
}

fn square() -> FunctionSpec {
    FunctionSpec::builder("square")
        .param("x", ValueType::Int)
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value(x * x)
        })
        .build()
        .expect("valid spec")
}

fn square_with_json_encoder() -> FunctionSpec {
    FunctionSpec::builder("square_with_json_encoder")
        .param("x", ValueType::Int)
        .output(ValueType::Int)
        .encoder("json")
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value(x * x)
        })
        .build()
        .expect("valid spec")
}

fn sum_accumulator() -> Accumulator {
    Accumulator::of::<Sum>(ValueType::record("Sum")).expect("default seed")
}

fn sum_of_squares() -> FunctionSpec {
    FunctionSpec::builder("sum_of_squares")
        .param("init_value", ValueType::record("Sum"))
        .param("x", ValueType::Int)
        .output(ValueType::record("Sum"))
        .accumulate(sum_accumulator())
        .body(|_ctx, inputs| {
            let mut init_value: Sum = inputs.get("init_value")?;
            let x: i64 = inputs.get("x")?;
            init_value.val += x;
            FunctionOutput::value(init_value)
        })
        .build()
        .expect("valid spec")
}

fn sum_of_squares_with_json_encoding() -> FunctionSpec {
    FunctionSpec::builder("sum_of_squares_with_json_encoding")
        .param("init_value", ValueType::record("Sum"))
        .param("x", ValueType::Int)
        .output(ValueType::record("Sum"))
        .accumulate(sum_accumulator())
        .encoder("json")
        .body(|_ctx, inputs| {
            let mut init_value: Sum = inputs.get("init_value")?;
            let x: i64 = inputs.get("x")?;
            init_value.val += x;
            FunctionOutput::value(init_value)
        })
        .build()
        .expect("valid spec")
}

fn make_it_string() -> FunctionSpec {
    FunctionSpec::builder("make_it_string")
        .param("x", ValueType::record("Sum"))
        .output(ValueType::Str)
        .body(|_ctx, inputs| {
            let x: Sum = inputs.get("x")?;
            FunctionOutput::value(x.val.to_string())
        })
        .build()
        .expect("valid spec")
}

fn add_two() -> FunctionSpec {
    FunctionSpec::builder("add_two")
        .param("x", ValueType::record("Sum"))
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let x: Sum = inputs.get("x")?;
            FunctionOutput::value(x.val + 2)
        })
        .build()
        .expect("valid spec")
}

fn add_three() -> FunctionSpec {
    FunctionSpec::builder("add_three")
        .param("x", ValueType::record("Sum"))
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let x: Sum = inputs.get("x")?;
            FunctionOutput::value(x.val + 3)
        })
        .build()
        .expect("valid spec")
}

fn route_if_even() -> RouterSpec {
    RouterSpec::builder("route_if_even")
        .param("x", ValueType::record("Sum"))
        .body(|_ctx, inputs| {
            let x: Sum = inputs.get("x")?;
            if x.val % 2 == 0 {
                Ok(vec!["add_three".to_string()])
            } else {
                Ok(vec!["add_two".to_string()])
            }
        })
        .build()
        .expect("valid router")
}

fn make_it_string_from_int() -> FunctionSpec {
    FunctionSpec::builder("make_it_string_from_int")
        .param("x", ValueType::Int)
        .output(ValueType::Str)
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value(x.to_string())
        })
        .build()
        .expect("valid spec")
}

fn handle_file() -> FunctionSpec {
    FunctionSpec::builder("handle_file")
        .param("f", ValueType::File)
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let f: File = inputs.get("f")?;
            FunctionOutput::value(f.data.len() as i64)
        })
        .build()
        .expect("valid spec")
}

fn create_map_graph() -> Graph {
    let mut graph = Graph::new("test", "test", generate_seq());
    graph.add_edge(generate_seq(), square()).expect("edge");
    graph
}

fn create_map_reduce_graph() -> Graph {
    let mut graph = Graph::new("test_map_reduce", "test", generate_seq());
    graph.add_edge(generate_seq(), square()).expect("edge");
    graph.add_edge(square(), sum_of_squares()).expect("edge");
    graph
        .add_edge(sum_of_squares(), make_it_string())
        .expect("edge");
    graph
}

fn create_map_reduce_graph_with_json_encoder() -> Graph {
    let mut graph =
        Graph::new("test_map_reduce", "test", square_with_json_encoder());
    graph
        .add_edge(
            square_with_json_encoder(),
            sum_of_squares_with_json_encoding(),
        )
        .expect("edge");
    graph
}

fn create_graph_with_different_encoders() -> Graph {
    let mut graph = Graph::new(
        "test_different_encoders",
        "test",
        simple_function_multiple_inputs_json(),
    );
    graph
        .add_edge(
            simple_function_multiple_inputs_json(),
            simple_function_with_str_as_input(),
        )
        .expect("edge");
    graph
}

fn create_router_graph() -> Graph {
    let mut graph = Graph::new("test_router", "test", generate_seq());
    graph.add_edge(generate_seq(), square()).expect("edge");
    graph.add_edge(square(), sum_of_squares()).expect("edge");
    graph
        .add_edge(sum_of_squares(), route_if_even())
        .expect("edge");
    graph
        .route(
            route_if_even(),
            vec![add_two().into(), add_three().into()],
        )
        .expect("route");
    graph
        .add_edge(add_two(), make_it_string_from_int())
        .expect("edge");
    graph
        .add_edge(add_three(), make_it_string_from_int())
        .expect("edge");
    graph
}

fn create_simple_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new("simple_pipeline", "A simple pipeline");
    pipeline.add_step(generate_seq()).expect("step");
    pipeline.add_step(square()).expect("step");
    pipeline.add_step(sum_of_squares()).expect("step");
    pipeline.add_step(make_it_string()).expect("step");
    pipeline
}

fn typed<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).expect("typed output"))
        .collect()
}

fn sorted_ints(values: Vec<Value>) -> Vec<i64> {
    let mut ints = typed::<i64>(values);
    ints.sort_unstable();
    ints
}

#[tokio::test]
async fn test_simple_function() {
    let graph = Graph::new("test_simple_function", "test", simple_function());
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", MyObject { x: "a".into() })
                .expect("args"),
            true,
        )
        .await
        .expect("run");
    let output = typed::<MyObject>(
        graph.output(&invocation_id, "simple_function").expect("output"),
    );
    assert_eq!(output, vec![MyObject { x: "ab".into() }]);
}

#[tokio::test]
async fn test_remote_graph_by_name() {
    let backend = Arc::new(InProcBackend::new());
    let graph = Graph::new("test_simple_function", "test", simple_function());
    RemoteGraph::deploy(graph, backend.clone())
        .await
        .expect("deploy");

    let graph = RemoteGraph::by_name("test_simple_function", backend);
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", MyObject { x: "a".into() })
                .expect("args"),
            true,
        )
        .await
        .expect("run");
    let output = typed::<MyObject>(
        graph
            .output(&invocation_id, "simple_function")
            .await
            .expect("output"),
    );
    assert_eq!(output, vec![MyObject { x: "ab".into() }]);
}

#[tokio::test]
async fn test_simple_function_multiple_inputs() {
    let graph = Graph::new(
        "test_simple_function2",
        "test",
        simple_function_multiple_inputs(),
    );
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", MyObject { x: "a".into() })
                .and_then(|i| i.with("y", 10))
                .expect("args"),
            true,
        )
        .await
        .expect("run");
    let output = typed::<MyObject>(
        graph
            .output(&invocation_id, "simple_function_multiple_inputs")
            .expect("output"),
    );
    assert_eq!(
        output,
        vec![MyObject {
            x: "abbbbbbbbbb".into()
        }]
    );
}

#[tokio::test]
async fn test_simple_function_multiple_inputs_json() {
    let graph = Graph::new(
        "test_simple_function2_json",
        "test",
        simple_function_multiple_inputs_json(),
    );
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", "a")
                .and_then(|i| i.with("y", 10))
                .expect("args"),
            true,
        )
        .await
        .expect("run");
    assert_eq!(
        graph
            .output(&invocation_id, "simple_function_multiple_inputs_json")
            .expect("output"),
        vec![json!("abbbbbbbbbb")]
    );
}

#[tokio::test]
async fn test_simple_function_with_json_encoding() {
    let graph = Graph::new(
        "test_simple_function_with_json_encoding",
        "test",
        simple_function_with_json_encoder(),
    );
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", "a").expect("args"), true)
        .await
        .expect("run");
    assert_eq!(
        graph
            .output(&invocation_id, "simple_function_with_json_encoder")
            .expect("output"),
        vec![json!("ab")]
    );
}

#[tokio::test]
async fn test_simple_function_with_invalid_encoding() {
    let graph = Graph::new(
        "test_simple_function_with_invalid_encoding",
        "test",
        simple_function_with_invalid_encoder(),
    );
    let graph = LocalGraph::new(graph).expect("valid graph");
    let err = graph
        .run(
            Inputs::new()
                .with("x", MyObject { x: "a".into() })
                .expect("args"),
            true,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidEncoder(tag) if tag == "invalid"));
}

#[tokio::test]
async fn test_map_operation() {
    let graph = LocalGraph::new(create_map_graph()).expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");
    let output_seq =
        graph.output(&invocation_id, "generate_seq").expect("output");
    assert_eq!(sorted_ints(output_seq), vec![0, 1, 2]);
    let output_sq = graph.output(&invocation_id, "square").expect("output");
    assert_eq!(sorted_ints(output_sq), vec![0, 1, 4]);
}

#[tokio::test]
async fn test_map_reduce_operation() {
    let graph =
        LocalGraph::new(create_map_reduce_graph()).expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");
    let output_sum_sq = typed::<Sum>(
        graph.output(&invocation_id, "sum_of_squares").expect("output"),
    );
    assert_eq!(output_sum_sq, vec![Sum { val: 5 }]);
    assert_eq!(
        graph.output(&invocation_id, "make_it_string").expect("output"),
        vec![json!("5")]
    );
}

#[tokio::test]
async fn test_map_reduce_operation_with_json_encoding() {
    let graph = LocalGraph::new(create_map_reduce_graph_with_json_encoder())
        .expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");
    assert_eq!(
        graph
            .output(&invocation_id, "square_with_json_encoder")
            .expect("output"),
        vec![json!(9)]
    );
    let output_sum = typed::<Sum>(
        graph
            .output(&invocation_id, "sum_of_squares_with_json_encoding")
            .expect("output"),
    );
    assert_eq!(output_sum, vec![Sum { val: 9 }]);
}

#[tokio::test]
async fn test_graph_with_different_encoders() {
    let graph = LocalGraph::new(create_graph_with_different_encoders())
        .expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", "a")
                .and_then(|i| i.with("y", 10))
                .expect("args"),
            true,
        )
        .await
        .expect("run");
    assert_eq!(
        graph
            .output(&invocation_id, "simple_function_multiple_inputs_json")
            .expect("output"),
        vec![json!("abbbbbbbbbb")]
    );
    assert_eq!(
        graph
            .output(&invocation_id, "simple_function_with_str_as_input")
            .expect("output"),
        vec![json!("abbbbbbbbbbcc")]
    );
}

#[tokio::test]
async fn test_router_graph_behavior() {
    let graph = LocalGraph::new(create_router_graph()).expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");

    assert_eq!(
        graph.output(&invocation_id, "add_two").expect("output"),
        vec![json!(7)]
    );
    let err = graph.output(&invocation_id, "add_three").unwrap_err();
    assert_eq!(
        err.to_string(),
        "no results found for fn add_three on graph test_router"
    );
    assert_eq!(
        graph
            .output(&invocation_id, "make_it_string_from_int")
            .expect("output"),
        vec![json!("7")]
    );
}

#[tokio::test]
async fn test_invoke_file() {
    let graph = Graph::new("test_handle_file", "test", handle_file());
    let graph = LocalGraph::new(graph).expect("valid graph");
    let file =
        File::from_text("hello world").with_metadata("some_val", json!(2));
    let invocation_id = graph
        .run(Inputs::new().with("f", file).expect("args"), true)
        .await
        .expect("run");
    assert_eq!(
        graph.output(&invocation_id, "handle_file").expect("output"),
        vec![json!(11)]
    );
}

#[tokio::test]
async fn test_pipeline() {
    let pipeline = create_simple_pipeline();
    let graph = LocalGraph::from_pipeline(pipeline).expect("valid pipeline");
    let invocation_id = graph
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");
    assert_eq!(
        graph.output(&invocation_id, "make_it_string").expect("output"),
        vec![json!("5")]
    );
}

#[tokio::test]
async fn test_remote_pipeline() {
    let backend = Arc::new(InProcBackend::new());
    let pipeline =
        RemoteGraph::deploy_pipeline(create_simple_pipeline(), backend)
            .await
            .expect("deploy");
    let invocation_id = pipeline
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");
    assert_eq!(
        pipeline
            .output(&invocation_id, "make_it_string")
            .await
            .expect("output"),
        vec![json!("5")]
    );
}

#[tokio::test]
async fn test_ignore_none_in_map() {
    let gen_seq = FunctionSpec::builder("gen_seq")
        .param("x", ValueType::Int)
        .output(ValueType::seq(ValueType::Int))
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value((0..x).collect::<Vec<i64>>())
        })
        .build()
        .expect("valid spec");
    let ignore_none = FunctionSpec::builder("ignore_none")
        .param("x", ValueType::Int)
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            if x % 2 == 0 {
                FunctionOutput::value(x)
            } else {
                Ok(FunctionOutput::Skip)
            }
        })
        .build()
        .expect("valid spec");
    let add_two = FunctionSpec::builder("add_two")
        .param("x", ValueType::Int)
        .output(ValueType::Int)
        .body(|_ctx, inputs| {
            let x: i64 = inputs.get("x")?;
            FunctionOutput::value(x + 2)
        })
        .build()
        .expect("valid spec");

    let mut graph = Graph::new("test_ignore_none", "test", gen_seq.clone());
    graph.add_edge(gen_seq, ignore_none.clone()).expect("edge");
    graph.add_edge(ignore_none, add_two).expect("edge");
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(Inputs::new().with("x", 5).expect("args"), true)
        .await
        .expect("run");
    let output = graph.output(&invocation_id, "add_two").expect("output");
    assert_eq!(sorted_ints(output), vec![2, 4, 6]);
}

#[tokio::test]
async fn test_graph_context() {
    let mut graph =
        Graph::new("test_context", "test", simple_function_ctx());
    graph
        .add_edge(simple_function_ctx(), simple_function_ctx_b())
        .expect("edge");
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new()
                .with("x", MyObject { x: "a".into() })
                .expect("args"),
            true,
        )
        .await
        .expect("run");

    let ctx_output = typed::<ComplexObject>(
        graph
            .output(&invocation_id, "simple_function_ctx")
            .expect("output"),
    );
    assert_eq!(ctx_output[0].invocation_id, invocation_id);
    assert_eq!(ctx_output[0].graph_name, "test_context");

    assert_eq!(
        graph
            .output(&invocation_id, "simple_function_ctx_b")
            .expect("output"),
        vec![json!(11)]
    );
}

#[tokio::test]
async fn test_graph_router_start_node() {
    let mut graph = Graph::new("test_router", "test", route_if_even());
    graph
        .route(
            route_if_even(),
            vec![add_two().into(), add_three().into()],
        )
        .expect("route");
    let graph = LocalGraph::new(graph).expect("valid graph");
    let invocation_id = graph
        .run(
            Inputs::new().with("x", Sum { val: 2 }).expect("args"),
            true,
        )
        .await
        .expect("run");
    assert_eq!(
        graph.output(&invocation_id, "add_three").expect("output"),
        vec![json!(5)]
    );
}

#[tokio::test]
async fn test_remote_matches_local() {
    let backend = Arc::new(InProcBackend::new());
    let remote = RemoteGraph::deploy(create_map_reduce_graph(), backend)
        .await
        .expect("deploy");
    let remote_inv = remote
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");

    let local =
        LocalGraph::new(create_map_reduce_graph()).expect("valid graph");
    let local_inv = local
        .run(Inputs::new().with("x", 3).expect("args"), true)
        .await
        .expect("run");

    for function in ["sum_of_squares", "make_it_string"] {
        assert_eq!(
            remote
                .output(&remote_inv, function)
                .await
                .expect("remote output"),
            local.output(&local_inv, function).expect("local output"),
            "{function} diverged between backends"
        );
    }
}
