//! Universal invariants for the routing engine: distance accounting,
//! triangle consistency, novelty/overhead baselines, instruction totals,
//! and KD-tree cache round-tripping.

mod common;

use std::collections::HashSet;

use walkgraph::{CompactGraph, Router};

fn line_graph_v1(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("line.bin");
    let nodes = vec![
        common::node(1, 48.8566, 2.3522),
        common::node(2, 48.8576, 2.3522),
        common::node(3, 48.8586, 2.3522),
        common::node(4, 48.8596, 2.3522),
    ];
    let edges = vec![
        common::edge(0, 1, 111.0),
        common::edge(1, 2, 111.0),
        common::edge(2, 3, 111.0),
    ];
    common::write_v1(&path, &nodes, &edges);
    path
}

#[test]
fn distance_equals_sum_of_edge_weights() {
    let dir = tempfile::tempdir().unwrap();
    let path = line_graph_v1(dir.path());
    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();

    let result = router.shortest_path(&graph, 1, 4).unwrap().unwrap();
    assert_eq!(result.path, vec![1, 2, 3, 4]);
    assert!((result.distance - 333.0).abs() < 1e-3);
}

#[test]
fn triangle_consistency_holds_for_intermediate_node() {
    let dir = tempfile::tempdir().unwrap();
    let path = line_graph_v1(dir.path());
    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();

    let direct = router.shortest_path(&graph, 1, 4).unwrap().unwrap();
    let leg1 = router.shortest_path(&graph, 1, 2).unwrap().unwrap();
    let leg2 = router.shortest_path(&graph, 2, 4).unwrap().unwrap();
    assert!(direct.distance <= leg1.distance + leg2.distance + 1e-6);
}

#[test]
fn novelty_route_with_empty_walked_equals_shortest_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = line_graph_v1(dir.path());
    let graph = CompactGraph::load(&path).unwrap();
    let mut router = Router::new();

    let baseline = router.shortest_path(&graph, 1, 4).unwrap().unwrap();
    let walked = HashSet::new();
    let novel = router
        .novelty_route(&graph, 1, 4, &walked, 0.3, 0.25)
        .unwrap()
        .unwrap();

    assert_eq!(novel.novelty, 1.0);
    assert_eq!(novel.overhead, 0.0);
    assert!((novel.distance - baseline.distance).abs() < 1.0);
}

#[test]
fn instructions_sum_to_total_distance_and_end_in_arrive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v2_line.bin");
    let nodes = vec![
        common::node(1, 48.8566, 2.3522),
        common::node(2, 48.8576, 2.3522),
        common::node(3, 48.8586, 2.3522),
    ];
    let edges = vec![
        common::named_edge(0, 1, 111.0, "Rue de Rivoli", "residential"),
        common::named_edge(1, 2, 111.0, "Rue de Rivoli", "residential"),
    ];
    common::write_v2(&path, &nodes, &edges);

    let graph = CompactGraph::load(&path).unwrap();
    let steps = walkgraph::InstructionSynthesizer::generate(&graph, &[1, 2, 3]).unwrap();

    let last = steps.last().unwrap();
    assert_eq!(last.direction, walkgraph::TurnDirection::Arrive);
    assert_eq!(last.distance, 0.0);

    let total: f64 = steps.iter().rev().skip(1).map(|s| s.distance).sum();
    assert!((total - 222.0).abs() < 1.0);
}

#[test]
fn kdtree_cache_round_trips_and_rejects_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = line_graph_v1(dir.path());
    let graph = CompactGraph::load(&graph_path).unwrap();

    graph.find_nearest_node(48.857, 2.3522); // forces kd-tree build
    let cache_path = dir.path().join("line.kdtr");
    assert!(graph.save_kdtree_cache(&cache_path));

    let graph2 = CompactGraph::load(&graph_path).unwrap();
    assert!(graph2.load_kdtree_cache(&cache_path));

    // A graph with a different file size/fingerprint must reject the cache.
    let other_path = dir.path().join("other.bin");
    common::write_v1(
        &other_path,
        &[common::node(9, 1.0, 1.0), common::node(10, 2.0, 2.0)],
        &[common::edge(0, 1, 5.0)],
    );
    let other_graph = CompactGraph::load(&other_path).unwrap();
    assert!(!other_graph.load_kdtree_cache(&cache_path));
}

#[test]
fn nearest_node_snap_is_exact_among_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let path = line_graph_v1(dir.path());
    let graph = CompactGraph::load(&path).unwrap();

    let (idx, dist) = graph.find_nearest_node(48.8566, 2.3522).unwrap();
    assert_eq!(graph.external_id(idx), 1);
    assert!(dist < 1.0);
}
