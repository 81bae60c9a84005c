//! Synthetic graph-binary construction for integration tests. The offline
//! ingest pipeline that would normally produce a `.bin` file is out of
//! scope for this crate, so tests build the byte format directly.

use std::collections::HashMap;
use std::path::Path;

pub struct NodeSpec {
    pub ext_id: i64,
    pub lat: f32,
    pub lon: f32,
}

pub struct EdgeSpec {
    pub a: usize,
    pub b: usize,
    pub weight: f32,
    pub name: Option<&'static str>,
    pub highway: Option<&'static str>,
}

pub fn node(ext_id: i64, lat: f32, lon: f32) -> NodeSpec {
    NodeSpec { ext_id, lat, lon }
}

pub fn edge(a: usize, b: usize, weight: f32) -> EdgeSpec {
    EdgeSpec { a, b, weight, name: None, highway: None }
}

pub fn named_edge(a: usize, b: usize, weight: f32, name: &'static str, highway: &'static str) -> EdgeSpec {
    EdgeSpec { a, b, weight, name: Some(name), highway: Some(highway) }
}

/// Write a version-1 (no per-edge metadata) graph binary to `path`.
pub fn write_v1(path: &Path, nodes: &[NodeSpec], edges: &[EdgeSpec]) {
    write_graph(path, nodes, edges, 1);
}

/// Write a version-2 (named streets + highway class) graph binary to `path`.
pub fn write_v2(path: &Path, nodes: &[NodeSpec], edges: &[EdgeSpec]) {
    write_graph(path, nodes, edges, 2);
}

struct DirectedEdge {
    target: u32,
    weight: f32,
    name: Option<&'static str>,
    highway: Option<&'static str>,
}

fn write_graph(path: &Path, nodes: &[NodeSpec], edges: &[EdgeSpec], version: u32) {
    let n = nodes.len();
    let mut adj: Vec<Vec<DirectedEdge>> = (0..n).map(|_| Vec::new()).collect();
    for e in edges {
        adj[e.a].push(DirectedEdge { target: e.b as u32, weight: e.weight, name: e.name, highway: e.highway });
        adj[e.b].push(DirectedEdge { target: e.a as u32, weight: e.weight, name: e.name, highway: e.highway });
    }

    let mut adj_offsets: Vec<i32> = Vec::with_capacity(n + 1);
    let mut adj_targets: Vec<i32> = Vec::new();
    let mut adj_weights: Vec<f32> = Vec::new();
    let mut names: Vec<Option<&'static str>> = Vec::new();
    let mut highways: Vec<Option<&'static str>> = Vec::new();
    let mut offset = 0i32;
    for node_adj in &adj {
        adj_offsets.push(offset);
        for d in node_adj {
            adj_targets.push(d.target as i32);
            adj_weights.push(d.weight);
            names.push(d.name);
            highways.push(d.highway);
        }
        offset += node_adj.len() as i32;
    }
    adj_offsets.push(offset);
    let e = adj_targets.len();

    let mut buf = Vec::new();
    buf.extend_from_slice(b"CSRG");
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&(n as u32).to_le_bytes());
    buf.extend_from_slice(&(e as u32).to_le_bytes());
    buf.extend_from_slice(&[0u8; 16]);

    for nd in nodes {
        buf.extend_from_slice(&nd.ext_id.to_le_bytes());
    }
    for nd in nodes {
        buf.extend_from_slice(&nd.lat.to_le_bytes());
    }
    for nd in nodes {
        buf.extend_from_slice(&nd.lon.to_le_bytes());
    }
    for o in &adj_offsets {
        buf.extend_from_slice(&o.to_le_bytes());
    }
    for t in &adj_targets {
        buf.extend_from_slice(&t.to_le_bytes());
    }
    for w in &adj_weights {
        buf.extend_from_slice(&w.to_le_bytes());
    }

    if version == 2 {
        let mut name_table: Vec<&str> = vec![""];
        let mut name_index: HashMap<&str, u16> = HashMap::new();
        name_index.insert("", 0);
        let mut highway_table: Vec<&str> = vec![""];
        let mut highway_index: HashMap<&str, u8> = HashMap::new();
        highway_index.insert("", 0);

        let name_indices: Vec<u16> = names
            .iter()
            .map(|n| {
                let s = n.unwrap_or("");
                *name_index.entry(s).or_insert_with(|| {
                    name_table.push(s);
                    (name_table.len() - 1) as u16
                })
            })
            .collect();
        let highway_indices: Vec<u8> = highways
            .iter()
            .map(|h| {
                let s = h.unwrap_or("");
                *highway_index.entry(s).or_insert_with(|| {
                    highway_table.push(s);
                    (highway_table.len() - 1) as u8
                })
            })
            .collect();

        for idx in &name_indices {
            buf.extend_from_slice(&idx.to_le_bytes());
        }
        for idx in &highway_indices {
            buf.push(*idx);
        }
        write_string_table(&mut buf, &name_table);
        write_string_table(&mut buf, &highway_table);
    }

    std::fs::write(path, buf).expect("write synthetic graph fixture");
}

fn write_string_table(buf: &mut Vec<u8>, entries: &[&str]) {
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for e in entries {
        buf.extend_from_slice(&(e.len() as u16).to_le_bytes());
        buf.extend_from_slice(e.as_bytes());
    }
}
