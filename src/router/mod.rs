//! A* shortest path, penalized A*, and the multi-phase novelty-route search.
//!
//! The open-set heap uses lazy deletion of stale entries, and `Router`
//! holds long-lived scratch arrays paired with a per-query version stamp
//! so repeated queries avoid an O(N) reset between them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::error::RouteError;
use crate::geo;
use crate::graph::CompactGraph;
use crate::instructions::InstructionSynthesizer;
use crate::types::{edges_for_path, novelty, overhead, EdgeKey, RouteResult};

/// Result of a plain shortest-path query.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub path: Vec<i64>,
    pub distance: f64,
}

const FIXED_FALLBACK_PENALTIES: [f64; 5] = [1.5, 2.0, 3.0, 5.0, 8.0];
const VIA_WAYPOINT_SCALES: [f64; 11] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.15];
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

struct Entry {
    f: f32,
    g: f32,
    counter: u64,
    node: u32,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g && self.counter == other.counter
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    // Reversed so `BinaryHeap` (a max-heap) pops the lexicographically
    // smallest (f, g, counter) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.g.partial_cmp(&self.g).unwrap_or(Ordering::Equal))
            .then_with(|| other.counter.cmp(&self.counter))
    }
}

/// Owns reusable per-query search scratch so repeated queries against the
/// same graph don't reallocate. Not `Sync`; one `Router` per thread.
pub struct Router {
    g: Vec<f32>,
    parent: Vec<i32>,
    version: Vec<u32>,
    current_version: u32,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Router {
        Router {
            g: Vec::new(),
            parent: Vec::new(),
            version: Vec::new(),
            current_version: 0,
        }
    }

    fn ensure_capacity(&mut self, n: usize) {
        if self.g.len() < n {
            self.g.resize(n, f32::INFINITY);
            self.parent.resize(n, -1);
            self.version.resize(n, 0);
        }
    }

    fn get_g(&self, u: usize) -> f32 {
        if self.version[u] == self.current_version {
            self.g[u]
        } else {
            f32::INFINITY
        }
    }

    fn node_haversine(&self, graph: &CompactGraph, a: u32, b: u32) -> f64 {
        let (lat1, lon1) = graph.lat_lon(a);
        let (lat2, lon2) = graph.lat_lon(b);
        geo::haversine(lat1, lon1, lat2, lon2)
    }

    /// Core A* search with a caller-supplied effective-weight function.
    /// Returns the internal-index path, or `None` if no path exists.
    fn astar_core(
        &mut self,
        graph: &CompactGraph,
        src: u32,
        tgt: u32,
        weight_fn: &dyn Fn(u32, u32, f32) -> f32,
    ) -> Option<Vec<u32>> {
        if src == tgt {
            return Some(vec![src]);
        }

        let n = graph.num_nodes() as usize;
        self.ensure_capacity(n);
        self.current_version += 1;
        let ver = self.current_version;

        self.g[src as usize] = 0.0;
        self.version[src as usize] = ver;
        self.parent[src as usize] = -1;

        let mut heap = BinaryHeap::new();
        let h0 = self.node_haversine(graph, src, tgt) as f32;
        heap.push(Entry {
            f: h0,
            g: 0.0,
            counter: 0,
            node: src,
        });
        let mut counter = 1u64;
        let mut found = false;

        while let Some(Entry { g, node: u, .. }) = heap.pop() {
            if g > self.get_g(u as usize) {
                continue; // stale entry, lazy deletion
            }
            if u == tgt {
                found = true;
                break;
            }
            let (targets, weights) = graph.neighbors(u);
            for (&v_raw, &w) in targets.iter().zip(weights.iter()) {
                let v = v_raw as u32;
                let eff_w = weight_fn(u, v, w);
                let tentative = g + eff_w;
                if tentative < self.get_g(v as usize) {
                    self.g[v as usize] = tentative;
                    self.version[v as usize] = ver;
                    self.parent[v as usize] = u as i32;
                    let hv = self.node_haversine(graph, v, tgt) as f32;
                    heap.push(Entry {
                        f: tentative + hv,
                        g: tentative,
                        counter,
                        node: v,
                    });
                    counter += 1;
                }
            }
        }

        if !found {
            return None;
        }
        let mut path = Vec::new();
        let mut cur = tgt as i32;
        while cur != -1 {
            path.push(cur as u32);
            cur = self.parent[cur as usize];
        }
        path.reverse();
        Some(path)
    }

    /// Translate an internal-index path to external ids and the unpenalized
    /// sum of its edge weights.
    fn finish_path(&self, graph: &CompactGraph, internal_path: &[u32]) -> PathResult {
        let mut distance = 0.0f64;
        for w in internal_path.windows(2) {
            distance += graph.edge_weight(w[0], w[1]).unwrap_or(0.0) as f64;
        }
        let path = internal_path.iter().map(|&u| graph.external_id(u)).collect();
        PathResult { path, distance }
    }

    /// Plain A* shortest path. `src == tgt` returns `([src], 0)` without
    /// searching; no path between components returns `Ok(None)`.
    pub fn shortest_path(
        &mut self,
        graph: &CompactGraph,
        src_ext: i64,
        tgt_ext: i64,
    ) -> Result<Option<PathResult>, RouteError> {
        let src = graph
            .internal_index(src_ext)
            .ok_or(RouteError::UnknownNode(src_ext))?;
        let tgt = graph
            .internal_index(tgt_ext)
            .ok_or(RouteError::UnknownNode(tgt_ext))?;

        let path = self.astar_core(graph, src, tgt, &|_, _, w| w);
        Ok(path.map(|p| self.finish_path(graph, &p)))
    }

    /// A* where walked edges are penalized by `penalty`; the returned
    /// distance is always the unpenalized true sum.
    fn penalized_path(
        &mut self,
        graph: &CompactGraph,
        src: u32,
        tgt: u32,
        walked: &HashSet<EdgeKey>,
        penalty: f32,
    ) -> Option<PathResult> {
        let weight_fn = |u: u32, v: u32, w: f32| {
            let key = EdgeKey::new(graph.external_id(u), graph.external_id(v));
            if walked.contains(&key) {
                w * penalty
            } else {
                w
            }
        };
        let path = self.astar_core(graph, src, tgt, &weight_fn)?;
        Some(self.finish_path(graph, &path))
    }

    /// Multi-phase novelty-preferring route search. See module docs for the
    /// phase breakdown.
    #[allow(clippy::too_many_arguments)]
    pub fn novelty_route(
        &mut self,
        graph: &CompactGraph,
        src_ext: i64,
        tgt_ext: i64,
        walked: &HashSet<EdgeKey>,
        min_novelty: f64,
        max_overhead: f64,
    ) -> Result<Option<RouteResult>, RouteError> {
        // Phase 1 — baseline.
        let baseline = match self.shortest_path(graph, src_ext, tgt_ext)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let d0 = baseline.distance;
        let mut best = package(&baseline.path, baseline.distance, walked, d0);

        // Phase 2 — short-circuit.
        if best.novelty >= min_novelty && max_overhead < 0.30 {
            tracing::debug!("novelty route short-circuited on baseline");
            return Ok(Some(finalize(graph, best, d0)));
        }

        let src = graph
            .internal_index(src_ext)
            .ok_or(RouteError::UnknownNode(src_ext))?;
        let tgt = graph
            .internal_index(tgt_ext)
            .ok_or(RouteError::UnknownNode(tgt_ext))?;

        let mut lo = 1.0f64;
        let mut hi = 10.0f64;

        if !walked.is_empty() {
            // Phase 3 — exponential expansion.
            for _ in 0..5 {
                if hi > 100.0 {
                    break;
                }
                let Some(p) = self.penalized_path(graph, src, tgt, walked, hi as f32) else {
                    break;
                };
                let cand = package(&p.path, p.distance, walked, d0);
                let met = cand.novelty >= min_novelty;
                maybe_update_best(&mut best, cand, min_novelty, max_overhead);
                if met {
                    break;
                }
                hi *= 2.0;
            }

            // Phase 4 — binary search.
            for _ in 0..10 {
                let mid = (lo + hi) / 2.0;
                let Some(p) = self.penalized_path(graph, src, tgt, walked, mid as f32) else {
                    break;
                };
                let cand = package(&p.path, p.distance, walked, d0);
                let (meets_novelty, within_budget) =
                    (cand.novelty >= min_novelty, cand.overhead <= max_overhead);
                maybe_update_best(&mut best, cand, min_novelty, max_overhead);
                if !meets_novelty {
                    lo = mid;
                } else if !within_budget {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }

            // Phase 5 — fixed fallback.
            if best.novelty < min_novelty {
                for &p in &FIXED_FALLBACK_PENALTIES {
                    if let Some(r) = self.penalized_path(graph, src, tgt, walked, p as f32) {
                        let cand = package(&r.path, r.distance, walked, d0);
                        maybe_update_best(&mut best, cand, min_novelty, max_overhead);
                    }
                }
            }
        }

        // Phase 6 — via-waypoint lengthening. Skipped with an empty walked
        // set: lengthening the route can't buy novelty when there's no
        // history to avoid.
        if !walked.is_empty() && best.distance < 0.85 * d0 * (1.0 + max_overhead) {
            if let Some(cand) = self.try_via_waypoint(
                graph,
                src,
                tgt,
                src_ext,
                tgt_ext,
                walked,
                d0,
                max_overhead,
                best.overhead,
            ) {
                best = cand;
            }
        }

        // Phase 7 — worst case: `best` never regresses past the baseline
        // because `maybe_update_best`/phase 6 only ever replace it with a
        // strictly-preferred candidate, so this is already satisfied.
        Ok(Some(finalize(graph, best, d0)))
    }

    #[allow(clippy::too_many_arguments)]
    fn try_via_waypoint(
        &mut self,
        graph: &CompactGraph,
        src: u32,
        tgt: u32,
        src_ext: i64,
        tgt_ext: i64,
        walked: &HashSet<EdgeKey>,
        d0: f64,
        max_overhead: f64,
        current_overhead: f64,
    ) -> Option<Candidate> {
        let (src_lat, src_lon) = graph.lat_lon(src);
        let (tgt_lat, tgt_lon) = graph.lat_lon(tgt);
        let mid_lat = (src_lat + tgt_lat) / 2.0;
        let mid_lon = (src_lon + tgt_lon) / 2.0;
        let cos_mid = mid_lat.to_radians().cos();

        let (sx, sy) = geo::project(src_lat, src_lon, cos_mid);
        let (tx, ty) = geo::project(tgt_lat, tgt_lon, cos_mid);
        let (dx, dy) = (tx - sx, ty - sy);
        let norm = (dx * dx + dy * dy).sqrt();
        if norm == 0.0 {
            return None;
        }
        let (ux, uy) = (dx / norm, dy / norm);
        // Perpendicular to the source->target direction.
        let (perp_x, perp_y) = (-uy, ux);

        let target_total = d0 * (1.0 + max_overhead);
        let h_ideal = if target_total > d0 {
            ((target_total * target_total - d0 * d0).sqrt()) / 2.0
        } else {
            0.3 * d0
        };

        for &scale in &VIA_WAYPOINT_SCALES {
            for &sign in &[1.0f64, -1.0] {
                let offset_m = h_ideal * scale * sign;
                let dlat = (offset_m * perp_x) / METERS_PER_DEGREE_LAT;
                let dlon = (offset_m * perp_y) / (METERS_PER_DEGREE_LAT * cos_mid);
                let wp_lat = mid_lat + dlat;
                let wp_lon = mid_lon + dlon;

                let Some((wp_idx, _)) = graph.find_nearest_node(wp_lat, wp_lon) else {
                    continue;
                };
                if wp_idx == src || wp_idx == tgt {
                    continue;
                }
                let wp_ext = graph.external_id(wp_idx);

                let Ok(Some(leg1)) = self.shortest_path(graph, src_ext, wp_ext) else {
                    continue;
                };
                let Ok(Some(leg2)) = self.shortest_path(graph, wp_ext, tgt_ext) else {
                    continue;
                };

                let combined_distance = leg1.distance + leg2.distance;
                let combined_overhead = overhead(combined_distance, d0);
                if combined_overhead > max_overhead || combined_overhead <= current_overhead {
                    continue;
                }

                let mut path = leg1.path;
                path.extend_from_slice(&leg2.path[1..]);
                tracing::debug!(scale, sign, "via-waypoint lengthening adopted");
                return Some(package(&path, combined_distance, walked, d0));
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    path: Vec<i64>,
    distance: f64,
    novelty: f64,
    overhead: f64,
}

fn package(path: &[i64], distance: f64, walked: &HashSet<EdgeKey>, d0: f64) -> Candidate {
    let edges = edges_for_path(path);
    Candidate {
        novelty: novelty(&edges, walked),
        overhead: overhead(distance, d0),
        distance,
        path: path.to_vec(),
    }
}

/// Dominance rule for the novelty-route search: results over the overhead
/// budget are never recorded; among in-budget results, meeting the novelty
/// target beats not meeting it; ties broken by preferring higher overhead
/// (spend the budget) when novelty is met, or higher novelty when it isn't.
fn maybe_update_best(best: &mut Candidate, candidate: Candidate, min_novelty: f64, max_overhead: f64) {
    if candidate.overhead > max_overhead {
        return;
    }
    let cur_meets = best.novelty >= min_novelty;
    let cand_meets = candidate.novelty >= min_novelty;
    let better = match (cand_meets, cur_meets) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => candidate.overhead > best.overhead,
        (false, false) => candidate.novelty > best.novelty,
    };
    if better {
        *best = candidate;
    }
}

fn finalize(graph: &CompactGraph, candidate: Candidate, d0: f64) -> RouteResult {
    let edges = edges_for_path(&candidate.path);
    let instructions = InstructionSynthesizer::generate(graph, &candidate.path);
    RouteResult {
        path: candidate.path,
        edges,
        distance: candidate.distance,
        shortest_distance: d0,
        novelty: candidate.novelty,
        overhead: candidate.overhead,
        instructions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_prefers_meeting_novelty_within_budget() {
        let mut best = Candidate {
            path: vec![],
            distance: 100.0,
            novelty: 0.1,
            overhead: 0.0,
        };
        let candidate = Candidate {
            path: vec![],
            distance: 120.0,
            novelty: 0.5,
            overhead: 0.2,
        };
        maybe_update_best(&mut best, candidate.clone(), 0.3, 0.25);
        assert_eq!(best.distance, candidate.distance);
    }

    #[test]
    fn dominance_rejects_over_budget() {
        let mut best = Candidate {
            path: vec![],
            distance: 100.0,
            novelty: 0.1,
            overhead: 0.0,
        };
        let over_budget = Candidate {
            path: vec![],
            distance: 200.0,
            novelty: 0.9,
            overhead: 0.5,
        };
        maybe_update_best(&mut best, over_budget, 0.3, 0.25);
        assert_eq!(best.distance, 100.0);
    }

    #[test]
    fn dominance_among_met_prefers_higher_overhead() {
        let mut best = Candidate {
            path: vec![],
            distance: 100.0,
            novelty: 0.5,
            overhead: 0.1,
        };
        let candidate = Candidate {
            path: vec![],
            distance: 110.0,
            novelty: 0.6,
            overhead: 0.2,
        };
        maybe_update_best(&mut best, candidate.clone(), 0.3, 0.25);
        assert_eq!(best.overhead, 0.2);
    }
}
