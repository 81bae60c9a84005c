//! Shared result and glue types: canonical edge keys, route results, and
//! navigation steps.

use serde::{Deserialize, Serialize};

/// Canonical undirected edge key: an unordered pair of external node ids
/// stored as `(min, max)`. Used exclusively for walked-history membership
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey(pub i64, pub i64);

impl EdgeKey {
    pub fn new(a: i64, b: i64) -> Self {
        if a <= b {
            EdgeKey(a, b)
        } else {
            EdgeKey(b, a)
        }
    }
}

/// One classified turn in a navigation step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Start,
    Straight,
    SlightLeft,
    SlightRight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
    Arrive,
}

/// A single grouped turn-by-turn instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationStep {
    pub direction: TurnDirection,
    /// Signed turn angle in degrees; 0 for `start` and `arrive`.
    pub angle: f64,
    pub instruction: String,
    /// Summed distance of the edges in this group, in meters.
    pub distance: f64,
    /// Coordinates of the group's start node (lat, lon).
    pub lat: f64,
    pub lon: f64,
}

/// The outcome of a shortest-path or novelty-route query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    /// Ordered sequence of external node ids.
    pub path: Vec<i64>,
    /// Ordered sequence of canonical edge keys, one per consecutive pair in `path`.
    pub edges: Vec<EdgeKey>,
    /// Total distance of this route, in meters.
    pub distance: f64,
    /// Shortest-path distance between the same endpoints, in meters.
    pub shortest_distance: f64,
    /// Fraction of `edges` not present in the walked set, in `[0, 1]`.
    pub novelty: f64,
    /// `(distance - shortest_distance) / shortest_distance`.
    pub overhead: f64,
    /// Present iff the graph carries v2 per-edge metadata.
    pub instructions: Option<Vec<NavigationStep>>,
}

/// Build the ordered `EdgeKey` sequence for a path of external ids.
pub fn edges_for_path(path: &[i64]) -> Vec<EdgeKey> {
    path.windows(2).map(|w| EdgeKey::new(w[0], w[1])).collect()
}

/// Fraction of `edges` absent from `walked`; 1.0 if `edges` is empty.
pub fn novelty(edges: &[EdgeKey], walked: &std::collections::HashSet<EdgeKey>) -> f64 {
    if edges.is_empty() {
        return 1.0;
    }
    let novel = edges.iter().filter(|e| !walked.contains(e)).count();
    novel as f64 / edges.len() as f64
}

/// `(distance - baseline) / baseline`, or 0 if `baseline` is 0.
pub fn overhead(distance: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        0.0
    } else {
        (distance - baseline) / baseline
    }
}
