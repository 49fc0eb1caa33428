//! End-to-end variable-length edge traversal through the full pipeline.

mod common;

use common::{props, run, run_err, setup};
use graft::core::value::Value;

#[test]
fn fixed_length_vle_paths_are_edge_unique() {
    let (store, graph) = setup();
    let begin = store.create_vertex(graph, "begin", props(&[]));
    let m1 = store.create_vertex(graph, "middle", props(&[]));
    let m2 = store.create_vertex(graph, "middle", props(&[]));
    let end = store.create_vertex(graph, "end", props(&[]));
    store.create_edge(graph, "_edge", begin.id, m1.id, props(&[]));
    // Two parallel edges give two distinct three-hop paths.
    store.create_edge(graph, "_edge", m1.id, m2.id, props(&[]));
    store.create_edge(graph, "_edge", m1.id, m2.id, props(&[]));
    store.create_edge(graph, "_edge", m2.id, end.id, props(&[]));
    // Shortcuts shorter than three hops must not appear.
    store.create_edge(graph, "_edge", begin.id, m2.id, props(&[]));
    store.create_edge(graph, "_edge", m1.id, end.id, props(&[]));

    let result = run(
        &store,
        "MATCH p = (a:begin)-[*3..3]->(b:end) RETURN relationships(p)",
    );
    assert_eq!(result.rows.len(), 2);
    for row in &result.rows {
        let Value::List(edges) = &row[0] else {
            panic!("expected edge list, got {:?}", row[0]);
        };
        assert_eq!(edges.len(), 3);
        let mut ids = std::collections::HashSet::new();
        for edge in edges {
            let Value::Edge(e) = edge else {
                panic!("expected edge, got {:?}", edge);
            };
            assert!(ids.insert(e.id), "edge repeated within a path");
        }
    }
}

#[test]
fn vle_bounds_select_path_lengths() {
    let (store, graph) = setup();
    let mut prev = store.create_vertex(graph, "n", props(&[("i", Value::Int(0))]));
    for i in 1..=4 {
        let next = store.create_vertex(graph, "n", props(&[("i", Value::Int(i))]));
        store.create_edge(graph, "_edge", prev.id, next.id, props(&[]));
        prev = next;
    }

    // From the chain head: lengths 1 through 4.
    let all = run(&store, "MATCH (a {i: 0})-[e*]->(b) RETURN b");
    assert_eq!(all.rows.len(), 4);
    let bounded = run(&store, "MATCH (a {i: 0})-[e*2..3]->(b) RETURN b.i");
    let mut ends = common::ints(&bounded);
    ends.sort();
    assert_eq!(ends, vec![2, 3]);
    // `*n` is exactly n hops.
    let exact = run(&store, "MATCH (a {i: 0})-[e*2]->(b) RETURN b.i");
    assert_eq!(common::ints(&exact), vec![2]);
}

#[test]
fn vle_endpoints_join_to_the_far_vertex() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[("name", Value::from("a"))]));
    let b = store.create_vertex(graph, "n", props(&[("name", Value::from("b"))]));
    let c = store.create_vertex(graph, "n", props(&[("name", Value::from("c"))]));
    store.create_edge(graph, "_edge", a.id, b.id, props(&[]));
    store.create_edge(graph, "_edge", b.id, c.id, props(&[]));

    let result = run(
        &store,
        "MATCH (x {name: \"a\"})-[*1..5]->(y {name: \"c\"}) RETURN y",
    );
    assert_eq!(result.rows.len(), 1);
    match &result.rows[0][0] {
        Value::Vertex(v) => assert_eq!(v.id, c.id),
        other => panic!("expected vertex, got {:?}", other),
    }
}

#[test]
fn vle_edge_label_and_property_constraints() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[("s", Value::Bool(true))]));
    let b = store.create_vertex(graph, "n", props(&[]));
    let c = store.create_vertex(graph, "n", props(&[]));
    store.create_edge(graph, "road", a.id, b.id, props(&[("open", Value::Bool(true))]));
    store.create_edge(graph, "road", b.id, c.id, props(&[("open", Value::Bool(false))]));
    store.create_edge(graph, "rail", a.id, c.id, props(&[]));

    // Label constraint: only road edges are walked.
    let roads = run(&store, "MATCH (x {s: true})-[:road*]->(y) RETURN y");
    assert_eq!(roads.rows.len(), 2);
    // Property constraint prunes the closed segment.
    let open = run(
        &store,
        "MATCH (x {s: true})-[:road* {open: true}]->(y) RETURN y",
    );
    assert_eq!(open.rows.len(), 1);
}

#[test]
fn vle_mixed_with_a_fixed_edge_stays_edge_unique() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[("k", Value::Int(1))]));
    let b = store.create_vertex(graph, "n", props(&[]));
    store.create_edge(graph, "_edge", a.id, b.id, props(&[]));

    // The only edge is consumed by the fixed hop; the VLE that follows
    // backwards over the same edge would repeat it.
    let result = run(&store, "MATCH (x {k: 1})-[e]->(y)-[*1..2]-(z) RETURN z");
    assert_eq!(result.rows.len(), 0);
}

#[test]
fn undirected_vle_crosses_edge_orientation() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[("k", Value::Int(1))]));
    let b = store.create_vertex(graph, "n", props(&[]));
    let c = store.create_vertex(graph, "n", props(&[("k", Value::Int(3))]));
    store.create_edge(graph, "_edge", a.id, b.id, props(&[]));
    store.create_edge(graph, "_edge", c.id, b.id, props(&[]));

    let result = run(
        &store,
        "MATCH (x {k: 1})-[*2..2]-(y {k: 3}) RETURN y",
    );
    assert_eq!(result.rows.len(), 1);
}

#[test]
fn invalid_vle_range_is_a_runtime_error() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[]));
    let b = store.create_vertex(graph, "n", props(&[]));
    store.create_edge(graph, "_edge", a.id, b.id, props(&[]));
    let err = run_err(&store, "MATCH (x)-[*3..2]->(y) RETURN y");
    assert!(err.to_string().contains("invalid variable-length range"));
}

#[test]
fn vle_over_unknown_label_matches_nothing() {
    let (store, graph) = setup();
    let a = store.create_vertex(graph, "n", props(&[]));
    let b = store.create_vertex(graph, "n", props(&[]));
    store.create_edge(graph, "_edge", a.id, b.id, props(&[]));
    let result = run(&store, "MATCH (x)-[:phantom*]->(y) RETURN y");
    assert_eq!(result.rows.len(), 0);
}
