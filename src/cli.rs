//! `walkgraph` command-line surface: load a graph, run a query, report the
//! result. Ambient to the core library; not part of its public contract.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use walkgraph::{CompactGraph, EdgeKey, RouteResult, Router};

#[derive(Parser)]
#[command(name = "walkgraph", about = "Pedestrian walking-route engine over a compact street graph")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a route between two points.
    Route {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long, value_parser = parse_latlon)]
        from: (f64, f64),
        #[arg(long, value_parser = parse_latlon)]
        to: (f64, f64),
        /// Prefer a novelty-maximizing route over the plain shortest path.
        #[arg(long)]
        novelty: bool,
        #[arg(long, default_value_t = 0.3)]
        min_novelty: f64,
        #[arg(long, default_value_t = 0.25)]
        max_overhead: f64,
        /// Newline-separated `a,b` external node id pairs already walked.
        #[arg(long)]
        walked: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_latlon(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got {s:?}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let lon = lon.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((lat, lon))
}

fn read_walked(path: &PathBuf) -> Result<HashSet<EdgeKey>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading walked-edge file {}", path.display()))?;
    let mut set = HashSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (a, b) = line
            .split_once(',')
            .with_context(|| format!("malformed walked-edge line: {line:?}"))?;
        let a: i64 = a.trim().parse().with_context(|| format!("bad node id in {line:?}"))?;
        let b: i64 = b.trim().parse().with_context(|| format!("bad node id in {line:?}"))?;
        set.insert(EdgeKey::new(a, b));
    }
    Ok(set)
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Route {
                graph,
                from,
                to,
                novelty,
                min_novelty,
                max_overhead,
                walked,
                json,
            } => {
                let g = CompactGraph::load(&graph)
                    .with_context(|| format!("loading graph {}", graph.display()))?;

                let (src_idx, src_dist) = g
                    .find_nearest_node(from.0, from.1)
                    .context("graph has no nodes to snap --from to")?;
                let (tgt_idx, tgt_dist) = g
                    .find_nearest_node(to.0, to.1)
                    .context("graph has no nodes to snap --to to")?;
                tracing::debug!(src_dist, tgt_dist, "snapped query points to nearest nodes");

                let src_ext = g.external_id(src_idx);
                let tgt_ext = g.external_id(tgt_idx);

                let mut router = Router::new();
                let result = if novelty {
                    let walked_set = match &walked {
                        Some(p) => read_walked(p)?,
                        None => HashSet::new(),
                    };
                    router.novelty_route(&g, src_ext, tgt_ext, &walked_set, min_novelty, max_overhead)?
                } else {
                    router.shortest_path(&g, src_ext, tgt_ext)?.map(|p| {
                        let edges = walkgraph::types::edges_for_path(&p.path);
                        let instructions = walkgraph::InstructionSynthesizer::generate(&g, &p.path);
                        RouteResult {
                            path: p.path,
                            edges,
                            distance: p.distance,
                            shortest_distance: p.distance,
                            novelty: 1.0,
                            overhead: 0.0,
                            instructions,
                        }
                    })
                };

                report(result.as_ref(), json)
            }
        }
    }
}

fn report(result: Option<&RouteResult>, json: bool) -> Result<()> {
    match result {
        None => {
            println!("no route found");
            Ok(())
        }
        Some(r) => {
            if json {
                println!("{}", serde_json::to_string_pretty(r)?);
            } else {
                println!(
                    "distance: {:.1} m (shortest: {:.1} m, overhead: {:.1}%, novelty: {:.0}%)",
                    r.distance,
                    r.shortest_distance,
                    r.overhead * 100.0,
                    r.novelty * 100.0
                );
                println!("path: {} nodes", r.path.len());
                if let Some(steps) = &r.instructions {
                    for step in steps {
                        println!("  {}", step.instruction);
                    }
                }
            }
            Ok(())
        }
    }
}
