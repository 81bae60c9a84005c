//! `CompactGraph`: a memory-mapped, zero-copy CSR pedestrian street graph.

pub mod format;

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use memmap2::Mmap;

use crate::error::GraphLoadError;
use crate::geo;
use crate::kdtree::KDTree;
use format::{parse_header, read_string_table, require_len, StringTable, HEADER_SIZE};

/// A loaded, validated pedestrian street graph backed by a read-only memory
/// map. All typed views borrow directly from the mapped region and are
/// valid for the lifetime of this object.
pub struct CompactGraph {
    mmap: Mmap,
    version: u32,
    num_nodes: u32,
    num_directed_edges: u32,
    file_size: u64,

    node_ids_off: usize,
    node_lats_off: usize,
    node_lons_off: usize,
    adj_offsets_off: usize,
    adj_targets_off: usize,
    adj_weights_off: usize,
    edge_name_idx_off: Option<usize>,
    edge_highway_idx_off: Option<usize>,

    name_table: Option<StringTable>,
    highway_table: Option<StringTable>,

    id_map: HashMap<i64, u32>,

    kdtree: OnceLock<KDTree>,
}

impl CompactGraph {
    /// Open and validate a graph binary at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GraphLoadError> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();
        // SAFETY: the mapped file is not expected to be mutated concurrently
        // by another process for the lifetime of this graph object.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = parse_header(&mmap)?;
        let n = header.num_nodes as usize;
        let e = header.num_directed_edges as usize;

        let node_ids_off = HEADER_SIZE;
        let node_lats_off = node_ids_off + 8 * n;
        let node_lons_off = node_lats_off + 4 * n;
        let adj_offsets_off = node_lons_off + 4 * n;
        let adj_targets_off = adj_offsets_off + 4 * (n + 1);
        let adj_weights_off = adj_targets_off + 4 * e;
        let fixed_end = adj_weights_off + 4 * e;

        require_len(&mmap, fixed_end, "fixed CSR sections")?;

        let (edge_name_idx_off, edge_highway_idx_off, name_table, highway_table) =
            if header.version == format::VERSION_V2 {
                let name_idx_off = fixed_end;
                let highway_idx_off = name_idx_off + 2 * e;
                let name_table_off = highway_idx_off + e;
                require_len(&mmap, name_table_off, "edge metadata arrays")?;
                let (names, after_names) =
                    read_string_table(&mmap, name_table_off, "name_table")?;
                let (highways, _after_highways) =
                    read_string_table(&mmap, after_names, "highway_table")?;
                (
                    Some(name_idx_off),
                    Some(highway_idx_off),
                    Some(names),
                    Some(highways),
                )
            } else {
                (None, None, None, None)
            };

        let node_ids: &[i64] = bytemuck::cast_slice(&mmap[node_ids_off..node_lats_off]);
        let mut id_map = HashMap::with_capacity(n);
        for (idx, &ext_id) in node_ids.iter().enumerate() {
            id_map.insert(ext_id, idx as u32);
        }

        tracing::debug!(
            num_nodes = n,
            num_directed_edges = e,
            version = header.version,
            "loaded compact graph"
        );

        Ok(CompactGraph {
            mmap,
            version: header.version,
            num_nodes: header.num_nodes,
            num_directed_edges: header.num_directed_edges,
            file_size,
            node_ids_off,
            node_lats_off,
            node_lons_off,
            adj_offsets_off,
            adj_targets_off,
            adj_weights_off,
            edge_name_idx_off,
            edge_highway_idx_off,
            name_table,
            highway_table,
            id_map,
            kdtree: OnceLock::new(),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn num_nodes(&self) -> u32 {
        self.num_nodes
    }

    pub fn num_directed_edges(&self) -> u32 {
        self.num_directed_edges
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn node_ids(&self) -> &[i64] {
        bytemuck::cast_slice(&self.mmap[self.node_ids_off..self.node_lats_off])
    }

    pub fn node_lats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.mmap[self.node_lats_off..self.node_lons_off])
    }

    pub fn node_lons(&self) -> &[f32] {
        bytemuck::cast_slice(&self.mmap[self.node_lons_off..self.adj_offsets_off])
    }

    fn adj_offsets(&self) -> &[i32] {
        let end = self.adj_offsets_off + 4 * (self.num_nodes as usize + 1);
        bytemuck::cast_slice(&self.mmap[self.adj_offsets_off..end])
    }

    fn adj_targets(&self) -> &[i32] {
        bytemuck::cast_slice(&self.mmap[self.adj_targets_off..self.adj_weights_off])
    }

    fn adj_weights(&self) -> &[f32] {
        let end = self.adj_weights_off + 4 * self.num_directed_edges as usize;
        bytemuck::cast_slice(&self.mmap[self.adj_weights_off..end])
    }

    /// External id for internal index `u`.
    pub fn external_id(&self, u: u32) -> i64 {
        self.node_ids()[u as usize]
    }

    /// Internal index for external id, if present.
    pub fn internal_index(&self, ext_id: i64) -> Option<u32> {
        self.id_map.get(&ext_id).copied()
    }

    pub fn lat_lon(&self, u: u32) -> (f64, f64) {
        (
            self.node_lats()[u as usize] as f64,
            self.node_lons()[u as usize] as f64,
        )
    }

    /// Number of outgoing directed edges of `u`.
    pub fn degree(&self, u: u32) -> u32 {
        let offsets = self.adj_offsets();
        (offsets[u as usize + 1] - offsets[u as usize]) as u32
    }

    /// O(1), zero-copy: `(targets, weights)` slices for `u`'s outgoing edges.
    pub fn neighbors(&self, u: u32) -> (&[i32], &[f32]) {
        let offsets = self.adj_offsets();
        let start = offsets[u as usize] as usize;
        let end = offsets[u as usize + 1] as usize;
        (&self.adj_targets()[start..end], &self.adj_weights()[start..end])
    }

    /// Weight (meters) of edge `(u, v)`, if it exists.
    pub fn edge_weight(&self, u: u32, v: u32) -> Option<f32> {
        let slot = self.edge_slot(u, v)?;
        Some(self.adj_weights()[slot])
    }

    fn edge_slot(&self, u: u32, v: u32) -> Option<usize> {
        let start = self.adj_offsets()[u as usize] as usize;
        let end = start + self.degree(u) as usize;
        let targets = self.adj_targets();
        (start..end).find(|&i| targets[i] == v as i32)
    }

    /// Street name of edge `(u, v)`, absent if v1 format, no name data, or
    /// the edge doesn't exist.
    pub fn edge_name(&self, u: u32, v: u32) -> Option<&str> {
        let name_idx_off = self.edge_name_idx_off?;
        let slot = self.edge_slot(u, v)?;
        let end = name_idx_off + 2 * self.num_directed_edges as usize;
        let indices: &[u16] = bytemuck::cast_slice(&self.mmap[name_idx_off..end]);
        let table = self.name_table.as_ref()?;
        let s = table.get(indices[slot] as usize);
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    /// Highway class of edge `(u, v)`, absent if v1 format, no data, or the
    /// edge doesn't exist.
    pub fn edge_highway(&self, u: u32, v: u32) -> Option<&str> {
        let highway_idx_off = self.edge_highway_idx_off?;
        let slot = self.edge_slot(u, v)?;
        let indices = &self.mmap[highway_idx_off..highway_idx_off + self.num_directed_edges as usize];
        let table = self.highway_table.as_ref()?;
        let s = table.get(indices[slot] as usize);
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    fn fingerprint(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.num_nodes, self.num_directed_edges, self.version, self.file_size
        )
    }

    fn kdtree(&self) -> &KDTree {
        self.kdtree.get_or_init(|| {
            tracing::debug!("building kd-tree index");
            KDTree::build(self.node_lats(), self.node_lons())
        })
    }

    /// Build (or reuse) the KD-tree, then nearest-node snap `(lat, lon)` by
    /// exact haversine over the `k = min(10, N)` closest projected candidates.
    pub fn find_nearest_node(&self, lat: f64, lon: f64) -> Option<(u32, f64)> {
        if self.num_nodes == 0 {
            return None;
        }
        let tree = self.kdtree();
        let k = (10usize).min(self.num_nodes as usize);
        let candidates = tree.query_knn(lat, lon, k);
        candidates
            .into_iter()
            .map(|idx| {
                let (clat, clon) = self.lat_lon(idx as u32);
                (idx as u32, geo::haversine(lat, lon, clat, clon))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    /// Load a previously-saved KD-tree cache if its fingerprint matches this
    /// graph; any mismatch or I/O error is treated as a cache miss.
    pub fn load_kdtree_cache<P: AsRef<Path>>(&self, path: P) -> bool {
        match KDTree::load_cache(path.as_ref(), &self.fingerprint()) {
            Ok(Some(tree)) => self.kdtree.set(tree).is_ok(),
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, "kd-tree cache load failed, will rebuild");
                false
            }
        }
    }

    /// Build the KD-tree if needed, then persist it to `path`.
    pub fn save_kdtree_cache<P: AsRef<Path>>(&self, path: P) -> bool {
        let tree = self.kdtree();
        match tree.save_cache(path.as_ref(), &self.fingerprint()) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "kd-tree cache save failed");
                false
            }
        }
    }
}
