//! End-to-end writer clauses: CREATE, SET, REMOVE, DELETE, MERGE.

mod common;

use common::{props, run, run_err, setup};
use graft::catalog::DEFAULT_VERTEX_LABEL;
use graft::core::error::{GraphError, PlanError};
use graft::core::value::Value;

#[test]
fn create_builds_vertices_and_edges() {
    let (store, graph) = setup();
    let result = run(
        &store,
        "CREATE (a:person {name: \"Ann\"})-[e:knows {since: 1999}]->(b:person {name: \"Bo\"}) RETURN a, e, b",
    );
    assert_eq!(result.rows.len(), 1);
    match (&result.rows[0][0], &result.rows[0][1], &result.rows[0][2]) {
        (Value::Vertex(a), Value::Edge(e), Value::Vertex(b)) => {
            assert_eq!(a.label, "person");
            assert_eq!(e.label, "knows");
            assert_eq!(e.start_id, a.id);
            assert_eq!(e.end_id, b.id);
            assert_eq!(e.properties.get("since"), Some(&Value::Int(1999)));
        }
        other => panic!("expected entities, got {:?}", other),
    }
    assert_eq!(store.scan_vertices(graph, "person").len(), 2);
    assert_eq!(store.scan_edges(graph, "knows").len(), 1);
}

#[test]
fn create_left_arrow_flips_endpoints() {
    let (store, _) = setup();
    let result = run(&store, "CREATE (a)<-[e:r]-(b) RETURN a, e, b");
    match (&result.rows[0][0], &result.rows[0][1], &result.rows[0][2]) {
        (Value::Vertex(a), Value::Edge(e), Value::Vertex(b)) => {
            assert_eq!(e.start_id, b.id);
            assert_eq!(e.end_id, a.id);
        }
        other => panic!("expected entities, got {:?}", other),
    }
}

#[test]
fn create_per_input_row() {
    let (store, graph) = setup();
    run(&store, "CREATE (:seed {n: 1})");
    run(&store, "CREATE (:seed {n: 2})");
    run(&store, "MATCH (s:seed) CREATE (c:copy {n: s.n})");
    let mut ns: Vec<Value> = store
        .scan_vertices(graph, "copy")
        .into_iter()
        .map(|v| v.properties.get("n").cloned().unwrap())
        .collect();
    ns.sort_by(|a, b| a.cmp_ordered(b));
    assert_eq!(ns, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn create_path_variable_holds_the_created_path() {
    let (store, _) = setup();
    let result = run(&store, "CREATE p = (a)-[e:step]->(b) RETURN p");
    match &result.rows[0][0] {
        Value::Path(path) => {
            assert_eq!(path.vertices().len(), 2);
            assert_eq!(path.relationships().len(), 1);
        }
        other => panic!("expected path, got {:?}", other),
    }
}

#[test]
fn create_with_existing_endpoint() {
    let (store, graph) = setup();
    run(&store, "CREATE (:person {name: \"Ann\"})");
    run(
        &store,
        "MATCH (a:person {name: \"Ann\"}) CREATE (a)-[e:owns]->(b:thing)",
    );
    let edges = store.scan_edges(graph, "owns");
    assert_eq!(edges.len(), 1);
    assert_eq!(store.scan_vertices(graph, "person").len(), 1);
    assert_eq!(store.scan_vertices(graph, "thing").len(), 1);
}

#[test]
fn undirected_create_is_rejected() {
    let (store, _) = setup();
    let err = run_err(&store, "CREATE ()-[:X]-() RETURN 1");
    match err {
        GraphError::Plan(PlanError::Semantic { message, .. }) => {
            assert!(message.contains("directed"));
        }
        other => panic!("expected semantic error, got {:?}", other),
    }
}

#[test]
fn create_edge_without_label_is_rejected() {
    let (store, _) = setup();
    let err = run_err(&store, "CREATE ()-[]->()");
    assert!(matches!(err, GraphError::Plan(PlanError::Semantic { .. })));
}

#[test]
fn create_cannot_relabel_an_existing_variable() {
    let (store, _) = setup();
    let err = run_err(&store, "MATCH (a) CREATE (a:fresh)");
    assert!(matches!(err, GraphError::Plan(PlanError::Semantic { .. })));
}

#[test]
fn create_props_cannot_be_a_parameter() {
    let (store, _) = setup();
    let err = run_err(&store, "CREATE (a $props)");
    assert!(matches!(err, GraphError::Plan(PlanError::Semantic { .. })));
}

#[test]
fn set_updates_and_remove_drops_properties() {
    let (store, graph) = setup();
    store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[("k", Value::Int(1))]));

    let result = run(&store, "MATCH (a) SET a.k = 2 RETURN a.k");
    assert_eq!(result.rows[0][0], Value::Int(2));
    let stored = &store.scan_vertices(graph, DEFAULT_VERTEX_LABEL)[0];
    assert_eq!(stored.properties.get("k"), Some(&Value::Int(2)));

    run(&store, "MATCH (a) REMOVE a.k");
    let stored = &store.scan_vertices(graph, DEFAULT_VERTEX_LABEL)[0];
    assert!(stored.properties.get("k").is_none());
}

#[test]
fn set_to_null_removes_the_key() {
    let (store, graph) = setup();
    store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[("k", Value::Int(1))]));
    run(&store, "MATCH (a) SET a.k = NULL");
    let stored = &store.scan_vertices(graph, DEFAULT_VERTEX_LABEL)[0];
    assert!(stored.properties.get("k").is_none());
}

#[test]
fn set_target_must_be_variable_property() {
    let (store, _) = setup();
    let err = run_err(&store, "MATCH (a) SET a.b.c = 1");
    assert!(matches!(err, GraphError::Plan(PlanError::Semantic { .. })));
}

#[test]
fn delete_edge_then_vertex() {
    let (store, graph) = setup();
    let v1 = store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[]));
    let v2 = store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[]));
    store.create_edge(graph, "_edge", v1.id, v2.id, props(&[]));

    run(&store, "MATCH (a)-[r]->(b) DELETE r");
    assert_eq!(store.scan_edges(graph, "_edge").len(), 0);

    run(&store, "MATCH (a) DELETE a");
    assert_eq!(store.scan_vertices(graph, DEFAULT_VERTEX_LABEL).len(), 0);
}

#[test]
fn connected_vertex_needs_detach_delete() {
    let (store, graph) = setup();
    let v1 = store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[]));
    let v2 = store.create_vertex(graph, DEFAULT_VERTEX_LABEL, props(&[]));
    store.create_edge(graph, "_edge", v1.id, v2.id, props(&[]));

    let err = run_err(&store, "MATCH (a) DELETE a");
    assert!(err.to_string().contains("DETACH"));

    run(&store, "MATCH (a) DETACH DELETE a");
    assert_eq!(store.scan_vertices(graph, DEFAULT_VERTEX_LABEL).len(), 0);
    assert_eq!(store.scan_edges(graph, "_edge").len(), 0);
}

#[test]
fn delete_requires_a_bound_variable() {
    let (store, _) = setup();
    let err = run_err(&store, "MATCH (a) DELETE b");
    assert!(matches!(err, GraphError::Plan(PlanError::Binding { .. })));
}

#[test]
fn merge_creates_once_and_then_matches() {
    let (store, graph) = setup();
    let first = run(&store, "MERGE (c:city {name: \"Oslo\"}) RETURN c");
    assert_eq!(first.rows.len(), 1);
    assert_eq!(store.scan_vertices(graph, "city").len(), 1);

    let second = run(&store, "MERGE (c:city {name: \"Oslo\"}) RETURN c");
    assert_eq!(second.rows.len(), 1);
    assert_eq!(store.scan_vertices(graph, "city").len(), 1);

    // A different property map creates a second vertex.
    run(&store, "MERGE (c:city {name: \"Bergen\"}) RETURN c");
    assert_eq!(store.scan_vertices(graph, "city").len(), 2);
}

#[test]
fn merge_relationship_between_bound_vertices() {
    let (store, graph) = setup();
    run(&store, "CREATE (:person {name: \"Ann\"}), (:person {name: \"Bo\"})");
    let merge = "MATCH (a:person {name: \"Ann\"}), (b:person {name: \"Bo\"}) \
                 MERGE (a)-[e:likes]->(b) RETURN e";
    run(&store, merge);
    run(&store, merge);
    assert_eq!(store.scan_edges(graph, "likes").len(), 1);
}

#[test]
fn merge_on_create_actions_are_not_supported() {
    let (store, _) = setup();
    let err = run_err(&store, "MERGE (a:x) ON CREATE SET a.y = 1 RETURN a");
    assert!(matches!(err, GraphError::Plan(PlanError::NotSupported { .. })));
}

#[test]
fn reading_after_a_write_requires_with() {
    let (store, _) = setup();
    let err = run_err(&store, "CREATE (a) MATCH (b) RETURN b");
    assert!(matches!(err, GraphError::Plan(PlanError::Semantic { .. })));
    // WITH re-opens the pipeline for reads.
    run(&store, "CREATE (a) WITH a MATCH (b) RETURN b");
}

#[test]
fn writes_are_visible_to_the_next_statement() {
    let (store, _) = setup();
    run(&store, "CREATE (:item {n: 1})");
    let result = run(&store, "MATCH (i:item) RETURN i.n");
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}
