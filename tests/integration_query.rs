//! End-to-end projection behavior: UNWIND, WITH, UNION, parameters, and
//! expression evaluation through the full pipeline.

mod common;

use common::{ints, props, run, run_err, setup};
use graft::api::cypher;
use graft::core::error::{GraphError, PlanError};
use graft::core::value::{Value, ValueMap};

#[test]
fn unwind_expands_a_literal_list() {
    let (store, _) = setup();
    let result = run(&store, "UNWIND [1, 2, 3] AS i RETURN i");
    assert_eq!(result.columns, vec!["i"]);
    assert_eq!(ints(&result), vec![1, 2, 3]);
}

#[test]
fn nested_unwind_flattens_mixed_lists() {
    let (store, _) = setup();
    let result = run(
        &store,
        "WITH [[1, 2], [3, 4], 5] AS n UNWIND n AS x UNWIND x AS y RETURN y",
    );
    assert_eq!(ints(&result), vec![1, 2, 3, 4, 5]);
}

#[test]
fn unwind_of_null_and_empty_lists_yields_no_rows() {
    let (store, _) = setup();
    assert_eq!(run(&store, "UNWIND [] AS x RETURN x").rows.len(), 0);
    assert_eq!(run(&store, "UNWIND NULL AS x RETURN x").rows.len(), 0);
}

#[test]
fn with_projects_and_filters_downstream() {
    let (store, graph) = setup();
    for k in 1..=5 {
        store.create_vertex(graph, "_vertex", props(&[("k", Value::Int(k))]));
    }
    let result = run(
        &store,
        "MATCH (a) WITH a.k AS k WHERE k > 2 RETURN k ORDER BY k",
    );
    assert_eq!(ints(&result), vec![3, 4, 5]);
}

#[test]
fn with_distinct_deduplicates() {
    let (store, _) = setup();
    let result = run(
        &store,
        "UNWIND [1, 1, 2, 2, 3] AS x WITH DISTINCT x AS y RETURN y ORDER BY y",
    );
    assert_eq!(ints(&result), vec![1, 2, 3]);
}

#[test]
fn union_deduplicates_and_union_all_keeps_everything() {
    let (store, _) = setup();
    let distinct = run(
        &store,
        "RETURN 1 AS x UNION RETURN 1 AS x UNION RETURN 2 AS x",
    );
    let mut values = ints(&distinct);
    values.sort();
    assert_eq!(values, vec![1, 2]);

    let all = run(
        &store,
        "RETURN 1 AS x UNION ALL RETURN 1 AS x UNION ALL RETURN 2 AS x",
    );
    assert_eq!(all.rows.len(), 3);
}

#[test]
fn union_orders_over_output_columns() {
    let (store, _) = setup();
    let result = run(
        &store,
        "RETURN 2 AS x UNION RETURN 3 AS x UNION RETURN 1 AS x ORDER BY x DESC LIMIT 2",
    );
    assert_eq!(ints(&result), vec![3, 2]);
}

#[test]
fn union_branches_over_a_graph() {
    let (store, graph) = setup();
    store.create_vertex(graph, "cat", props(&[("name", Value::from("Mia"))]));
    store.create_vertex(graph, "dog", props(&[("name", Value::from("Rex"))]));
    let result = run(
        &store,
        "MATCH (c:cat) RETURN c.name AS name UNION MATCH (d:dog) RETURN d.name AS name",
    );
    let mut names: Vec<String> = result
        .rows
        .iter()
        .map(|r| match &r[0] {
            Value::String(s) => s.clone(),
            other => panic!("expected string, got {:?}", other),
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["Mia", "Rex"]);
}

#[test]
fn parameters_reach_patterns_and_expressions() {
    let (store, graph) = setup();
    store.create_vertex(graph, "_vertex", props(&[("k", Value::Int(7))]));
    store.create_vertex(graph, "_vertex", props(&[("k", Value::Int(8))]));

    let mut params = ValueMap::new();
    params.insert("want".to_string(), Value::Int(7));
    let result = cypher(
        &store,
        common::GRAPH,
        "MATCH (a) WHERE a.k = $want RETURN a.k",
        &params,
    )
    .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(7)]]);

    let mut map_params = ValueMap::new();
    let mut template = std::collections::BTreeMap::new();
    template.insert("k".to_string(), Value::Int(8));
    map_params.insert("p".to_string(), Value::Map(template));
    let result = cypher(
        &store,
        common::GRAPH,
        "MATCH (a $p) RETURN a.k",
        &map_params,
    )
    .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(8)]]);
}

#[test]
fn case_list_and_slice_expressions() {
    let (store, _) = setup();
    let result = run(
        &store,
        "UNWIND [1, 2, 3] AS x RETURN CASE WHEN x > 1 THEN \"big\" ELSE \"small\" END AS size",
    );
    assert_eq!(
        common::column(&result),
        vec![Value::from("small"), Value::from("big"), Value::from("big")]
    );

    let result = run(&store, "WITH [1, 2, 3, 4] AS xs RETURN xs[1..3] AS mid");
    assert_eq!(
        result.rows[0][0],
        Value::List(vec![Value::Int(2), Value::Int(3)])
    );
    let result = run(&store, "WITH [1, 2] AS xs RETURN xs[9] AS nothing");
    assert_eq!(result.rows[0][0], Value::Null);
}

#[test]
fn membership_and_typecasts() {
    let (store, _) = setup();
    let result = run(&store, "RETURN 2 IN [1, 2, 3] AS hit, \"5\"::integer AS n");
    assert_eq!(result.rows[0], vec![Value::Bool(true), Value::Int(5)]);

    let err = run_err(&store, "RETURN \"abc\"::integer");
    assert!(matches!(err, GraphError::Exec(_)));
}

#[test]
fn limit_and_skip_accept_parameters_only() {
    let (store, _) = setup();
    let mut params = ValueMap::new();
    params.insert("n".to_string(), Value::Int(2));
    let result = cypher(
        &store,
        common::GRAPH,
        "UNWIND [1, 2, 3, 4] AS x RETURN x LIMIT $n",
        &params,
    )
    .unwrap();
    assert_eq!(result.rows.len(), 2);

    let err = run_err(&store, "UNWIND [1, 2] AS x RETURN x LIMIT x");
    assert!(matches!(err, GraphError::Plan(PlanError::Type { .. })));
}

#[test]
fn return_distinct_over_entities() {
    let (store, graph) = setup();
    let v1 = store.create_vertex(graph, "_vertex", props(&[]));
    let v2 = store.create_vertex(graph, "_vertex", props(&[]));
    store.create_edge(graph, "_edge", v1.id, v2.id, props(&[]));
    store.create_edge(graph, "_edge", v1.id, v2.id, props(&[]));

    let plain = run(&store, "MATCH (a)-[r]->(b) RETURN a");
    assert_eq!(plain.rows.len(), 2);
    let distinct = run(&store, "MATCH (a)-[r]->(b) RETURN DISTINCT a");
    assert_eq!(distinct.rows.len(), 1);
}

#[test]
fn builtin_functions_over_graph_values() {
    let (store, graph) = setup();
    let v1 = store.create_vertex(graph, "person", props(&[("name", Value::from("Ann"))]));
    let v2 = store.create_vertex(graph, "person", props(&[]));
    store.create_edge(graph, "knows", v1.id, v2.id, props(&[]));

    let result = run(
        &store,
        "MATCH (a:person {name: \"Ann\"})-[e]->(b) \
         RETURN label(a), type(e), id(a) = start_id(e), keys(a)",
    );
    let row = &result.rows[0];
    assert_eq!(row[0], Value::from("person"));
    assert_eq!(row[1], Value::from("knows"));
    assert_eq!(row[2], Value::Bool(true));
    assert_eq!(row[3], Value::List(vec![Value::from("name")]));
}

#[test]
fn invalid_regex_fails_at_runtime() {
    let (store, _) = setup();
    let err = run_err(&store, "RETURN \"a\" =~ \"(\"");
    assert!(err.to_string().contains("invalid regular expression"));
}

#[test]
fn aggregates_are_delegated() {
    let (store, _) = setup();
    let err = run_err(&store, "MATCH (a) RETURN count(a)");
    assert!(matches!(err, GraphError::Plan(PlanError::NotSupported { .. })));
}
