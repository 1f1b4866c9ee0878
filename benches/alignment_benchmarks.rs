use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use serene::alignment::convert_karma_graph;
use serene::patterns::read_patterns;

/// A chain of `classes` class nodes, each with two data properties
fn karma_graph(classes: usize) -> Value {
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    for i in 0..classes {
        nodes.push(json!({"id": format!("c{}", i), "type": "InternalNode", "label": {"uri": format!("http://ex.org/onto#Class{}", i)}}));
        for p in 0..2 {
            let data = format!("d{}_{}", i, p);
            nodes.push(json!({"id": data, "type": "ColumnNode"}));
            links.push(json!({
                "id": format!("c{}---http://ex.org/onto#prop{}---{}", i, p, data),
                "type": "DataPropertyLink",
                "weight": 1.0
            }));
        }
        if i > 0 {
            links.push(json!({
                "id": format!("c{}---http://ex.org/onto#next---c{}", i - 1, i),
                "type": "ObjectPropertyLink",
                "weight": 0.5
            }));
        }
    }
    json!({"nodes": nodes, "links": links})
}

/// Benchmark Karma alignment graph conversion
fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_karma_graph");

    for size in [10, 100, 1000].iter() {
        let data = karma_graph(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let graph = convert_karma_graph(data).unwrap();
                criterion::black_box(graph.edge_count());
            });
        });
    }
    group.finish();
}

/// Benchmark joining mined patterns with the alignment graph
fn bench_read_patterns(c: &mut Criterion) {
    let alignment = convert_karma_graph(&karma_graph(200)).unwrap();

    let mut edges = String::new();
    for i in 0..200 {
        edges.push_str(&format!(
            "{{\"id\": {}, \"data\": {{\"alignId\": \"c{}---http://ex.org/onto#prop0---d{}_0\"}}}}\n",
            i, i, i
        ));
    }
    let mut graphs = String::new();
    for i in 0..500 {
        graphs.push_str(&format!(
            "{{\"id\": \"p{}\", \"data\": {{\"support\": {}, \"__variable_mapping\": \"{{__e0={}, __v0=1, __e1={}}}\"}}}}\n",
            i,
            i % 17,
            i % 200,
            (i * 7) % 200
        ));
    }

    c.bench_function("read_patterns", |b| {
        b.iter(|| {
            let rows = read_patterns(&alignment, graphs.as_bytes(), edges.as_bytes()).unwrap();
            criterion::black_box(rows.len());
        });
    });
}

criterion_group!(benches, bench_convert, bench_read_patterns);
criterion_main!(benches);
