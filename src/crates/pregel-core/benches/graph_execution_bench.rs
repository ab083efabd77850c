use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pregel_core::StateGraph;
use serde_json::json;

fn linear_graph_invoke_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("invoke 3-node linear graph", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut graph = StateGraph::new();
            graph.add_node("a", |state| Box::pin(async move { Ok(state) }));
            graph.add_node("b", |state| Box::pin(async move { Ok(state) }));
            graph.add_node("c", |state| Box::pin(async move { Ok(state) }));
            graph.add_edge("__start__", "a");
            graph.add_edge("a", "b");
            graph.add_edge("b", "c");
            graph.add_edge("c", "__end__");

            let compiled = graph.compile().unwrap();
            compiled.invoke(black_box(json!({"value": 1}))).await.unwrap();
        });
    });
}

fn fan_out_graph_invoke_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("invoke fan-out graph (4 parallel nodes)", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut graph = StateGraph::new();
            graph.add_node("start", |state| Box::pin(async move { Ok(state) }));
            for name in ["w1", "w2", "w3", "w4"] {
                graph.add_node(name, |state| Box::pin(async move { Ok(state) }));
                graph.add_edge("start", name);
                graph.add_edge(name, "__end__");
            }
            graph.add_edge("__start__", "start");

            let compiled = graph.compile().unwrap();
            compiled.invoke(black_box(json!({"value": 1}))).await.unwrap();
        });
    });
}

criterion_group!(benches, linear_graph_invoke_benchmark, fan_out_graph_invoke_benchmark);
criterion_main!(benches);
