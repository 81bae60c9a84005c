//! Boundary behaviors for the routing engine.

mod common;

use walkgraph::CompactGraph;
use walkgraph::Router;

#[test]
fn shortest_path_same_source_and_target_is_trivial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.bin");
    let nodes = vec![common::node(1, 10.0, 10.0), common::node(2, 10.001, 10.0)];
    let edges = vec![common::edge(0, 1, 111.0)];
    common::write_v1(&path, &nodes, &edges);

    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();
    let result = router.shortest_path(&graph, 1, 1).unwrap().unwrap();
    assert_eq!(result.path, vec![1]);
    assert_eq!(result.distance, 0.0);
}

#[test]
fn generate_instructions_on_short_path_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.bin");
    let nodes = vec![common::node(1, 10.0, 10.0)];
    common::write_v2(&path, &nodes, &[]);

    let graph = CompactGraph::load(&path).unwrap();
    assert!(walkgraph::InstructionSynthesizer::generate(&graph, &[1]).is_none());
}

#[test]
fn generate_instructions_on_v1_graph_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.bin");
    let nodes = vec![common::node(1, 10.0, 10.0), common::node(2, 10.001, 10.0)];
    common::write_v1(&path, &nodes, &[common::edge(0, 1, 111.0)]);

    let graph = CompactGraph::load(&path).unwrap();
    assert!(walkgraph::InstructionSynthesizer::generate(&graph, &[1, 2]).is_none());
}

#[test]
fn haversine_of_coincident_points_is_exactly_zero() {
    assert_eq!(walkgraph::geo::haversine(51.5, -0.1, 51.5, -0.1), 0.0);
}

#[test]
fn bearing_is_always_in_range() {
    for &(a, b) in &[(0.0, 0.0), (45.0, 90.0), (-30.0, 170.0), (89.9, -179.0)] {
        let bearing = walkgraph::geo::bearing(0.0, 0.0, a, b);
        assert!((0.0..360.0).contains(&bearing));
    }
}

#[test]
fn unknown_node_id_is_a_lookup_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.bin");
    let nodes = vec![common::node(1, 10.0, 10.0), common::node(2, 10.001, 10.0)];
    common::write_v1(&path, &nodes, &[common::edge(0, 1, 111.0)]);

    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();
    let err = router.shortest_path(&graph, 1, 9999).unwrap_err();
    assert!(matches!(err, walkgraph::RouteError::UnknownNode(9999)));
}

#[test]
fn disconnected_components_report_no_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.bin");
    let nodes = vec![
        common::node(1, 10.0, 10.0),
        common::node(2, 10.001, 10.0),
        common::node(3, 50.0, 50.0),
        common::node(4, 50.001, 50.0),
    ];
    let edges = vec![common::edge(0, 1, 111.0), common::edge(2, 3, 111.0)];
    common::write_v1(&path, &nodes, &edges);

    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();
    assert!(router.shortest_path(&graph, 1, 3).unwrap().is_none());
}
