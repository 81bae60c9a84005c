//! Turn-by-turn instruction synthesis: per-edge bearing/name decoration,
//! grouping of consecutive same-named edges, and turn classification.

use crate::geo;
use crate::graph::CompactGraph;
use crate::types::{NavigationStep, TurnDirection};

const COMPASS: [&str; 8] = [
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

struct EdgeInfo {
    bearing: f64,
    distance: f64,
    effective_name: String,
}

struct Group {
    effective_name: String,
    distance: f64,
    entry_bearing: f64,
    exit_bearing: f64,
    start_node: usize,
}

pub struct InstructionSynthesizer;

impl InstructionSynthesizer {
    /// Produce grouped turn-by-turn steps for `path` (a sequence of external
    /// node ids). Absent if the graph carries no v2 edge metadata, the path
    /// is too short, or any node id can't be resolved.
    pub fn generate(graph: &CompactGraph, path: &[i64]) -> Option<Vec<NavigationStep>> {
        if graph.version() < 2 || path.len() < 2 {
            return None;
        }
        let internal: Vec<u32> = path
            .iter()
            .map(|&ext| graph.internal_index(ext))
            .collect::<Option<Vec<u32>>>()?;

        // Every interior node must have an edge to both its predecessor and
        // successor, so its degree can't be less than 2; a path through a
        // dead end is malformed.
        if internal[1..internal.len() - 1]
            .iter()
            .any(|&u| graph.degree(u) < 2)
        {
            return None;
        }

        let mut edges = Vec::with_capacity(internal.len() - 1);
        let mut last_bearing = 0.0f64;
        for w in internal.windows(2) {
            let (u, v) = (w[0], w[1]);
            let (ulat, ulon) = graph.lat_lon(u);
            let (vlat, vlon) = graph.lat_lon(v);
            let distance = geo::haversine(ulat, ulon, vlat, vlon);
            let bearing = if distance == 0.0 {
                last_bearing
            } else {
                geo::bearing(ulat, ulon, vlat, vlon)
            };
            last_bearing = bearing;

            let raw_name = graph.edge_name(u, v);
            let highway = graph.edge_highway(u, v);
            let effective_name = match raw_name {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => highway_description(highway).to_string(),
            };

            edges.push(EdgeInfo {
                bearing,
                distance,
                effective_name,
            });
        }

        let mut groups: Vec<Group> = Vec::new();
        for (i, e) in edges.iter().enumerate() {
            if let Some(last) = groups.last_mut() {
                if last.effective_name == e.effective_name {
                    last.distance += e.distance;
                    last.exit_bearing = e.bearing;
                    continue;
                }
            }
            groups.push(Group {
                effective_name: e.effective_name.clone(),
                distance: e.distance,
                entry_bearing: e.bearing,
                exit_bearing: e.bearing,
                start_node: i,
            });
        }

        let mut steps = Vec::with_capacity(groups.len() + 1);
        let mut prev_exit_bearing = 0.0f64;
        for (i, g) in groups.iter().enumerate() {
            let (lat, lon) = graph.lat_lon(internal[g.start_node]);
            if i == 0 {
                let compass = compass_point(g.entry_bearing);
                steps.push(NavigationStep {
                    direction: TurnDirection::Start,
                    angle: 0.0,
                    instruction: format!("Head {compass} on {}", g.effective_name),
                    distance: g.distance,
                    lat,
                    lon,
                });
            } else {
                let angle = normalize_signed(g.entry_bearing - prev_exit_bearing);
                let (direction, instruction) = classify_turn(angle, &g.effective_name);
                steps.push(NavigationStep {
                    direction,
                    angle,
                    instruction,
                    distance: g.distance,
                    lat,
                    lon,
                });
            }
            prev_exit_bearing = g.exit_bearing;
        }

        let (last_lat, last_lon) = graph.lat_lon(*internal.last().unwrap());
        steps.push(NavigationStep {
            direction: TurnDirection::Arrive,
            angle: 0.0,
            instruction: "Arrive at destination".to_string(),
            distance: 0.0,
            lat: last_lat,
            lon: last_lon,
        });

        Some(steps)
    }
}

fn highway_description(highway: Option<&str>) -> &'static str {
    match highway {
        Some("footway") => "footpath",
        Some("path") => "path",
        Some("pedestrian") => "pedestrian way",
        Some("steps") => "steps",
        Some("cycleway") => "cycleway",
        Some("service") => "service road",
        Some("track") => "track",
        _ => "road",
    }
}

fn compass_point(bearing: f64) -> &'static str {
    let idx = (((bearing + 22.5).rem_euclid(360.0)) / 45.0).floor() as usize;
    COMPASS[idx.min(7)]
}

/// Normalize a difference of bearings into `[-180, 180]`.
fn normalize_signed(diff: f64) -> f64 {
    let wrapped = diff.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

fn classify_turn(angle: f64, name: &str) -> (TurnDirection, String) {
    let abs = angle.abs();
    let left = angle < 0.0;
    if abs < 15.0 {
        (TurnDirection::Straight, format!("Continue on {name}"))
    } else if abs < 45.0 {
        let dir = if left { TurnDirection::SlightLeft } else { TurnDirection::SlightRight };
        let prefix = if left { "Turn slight left" } else { "Turn slight right" };
        (dir, format!("{prefix} onto {name}"))
    } else if abs < 120.0 {
        let dir = if left { TurnDirection::Left } else { TurnDirection::Right };
        let prefix = if left { "Turn left" } else { "Turn right" };
        (dir, format!("{prefix} onto {name}"))
    } else if abs < 160.0 {
        let dir = if left { TurnDirection::SharpLeft } else { TurnDirection::SharpRight };
        let prefix = if left { "Turn sharp left" } else { "Turn sharp right" };
        (dir, format!("{prefix} onto {name}"))
    } else {
        (TurnDirection::UTurn, format!("Make a U-turn onto {name}"))
    }
}
