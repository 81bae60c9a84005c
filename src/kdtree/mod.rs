//! Bulk-built 2-D KD-tree over equirectangular-projected node coordinates,
//! with a persistent on-disk cache keyed by a graph fingerprint.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs;
use std::io::Write;
use std::path::Path;

use rand::Rng;

use crate::error::KdCacheError;
use crate::geo;

const CACHE_MAGIC: [u8; 4] = *b"KDTR";
const CACHE_VERSION: u32 = 1;

/// Array-of-structs KD-tree node. `left`/`right` are `-1` for "no child".
/// `_pad` exists purely to make the struct's size a multiple of its
/// alignment with no implicit padding, which `bytemuck::Pod` requires.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KDNode {
    pub x: f64,
    pub y: f64,
    pub index: i32,
    pub left: i32,
    pub right: i32,
    _pad: i32,
}

/// A bulk-built KD-tree. Nodes are stored in DFS preorder; the root is
/// always at index 0 — required by the cache format.
pub struct KDTree {
    nodes: Vec<KDNode>,
    cos_mean_lat: f64,
}

struct HeapEntry {
    dist2: f64,
    index: i32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist2 == other.dist2
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2.partial_cmp(&other.dist2).unwrap_or(Ordering::Equal)
    }
}

impl KDTree {
    /// Bulk-build from parallel node latitude/longitude arrays (degrees).
    pub fn build(lats: &[f32], lons: &[f32]) -> KDTree {
        let n = lats.len();
        if n == 0 {
            return KDTree {
                nodes: Vec::new(),
                cos_mean_lat: 1.0,
            };
        }
        let mean_lat: f64 = lats.iter().map(|&l| l as f64).sum::<f64>() / n as f64;
        let cos_mean_lat = mean_lat.to_radians().cos();

        let mut points: Vec<(f64, f64, i32)> = (0..n)
            .map(|i| {
                let (x, y) = geo::project(lats[i] as f64, lons[i] as f64, cos_mean_lat);
                (x, y, i as i32)
            })
            .collect();

        let mut nodes = Vec::with_capacity(n);
        build_rec(&mut points, 0, n, 0, &mut nodes);

        KDTree { nodes, cos_mean_lat }
    }

    pub fn cos_mean_lat(&self) -> f64 {
        self.cos_mean_lat
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// k-nearest candidates (by squared projected distance), unsorted,
    /// returned as node indices into the original coordinate arrays.
    pub fn query_knn(&self, lat: f64, lon: f64, k: usize) -> Vec<i32> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        let (qx, qy) = geo::project(lat, lon, self.cos_mean_lat);
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k);
        self.recurse(0, qx, qy, 0, k, &mut heap);
        heap.into_iter().map(|e| e.index).collect()
    }

    fn recurse(
        &self,
        node_idx: i32,
        qx: f64,
        qy: f64,
        depth: usize,
        k: usize,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        if node_idx < 0 {
            return;
        }
        let node = &self.nodes[node_idx as usize];
        let dx = qx - node.x;
        let dy = qy - node.y;
        let d2 = dx * dx + dy * dy;

        if heap.len() < k {
            heap.push(HeapEntry {
                dist2: d2,
                index: node.index,
            });
        } else if d2 < heap.peek().unwrap().dist2 {
            heap.pop();
            heap.push(HeapEntry {
                dist2: d2,
                index: node.index,
            });
        }

        let (q_axis, node_axis) = if depth % 2 == 0 { (qx, node.x) } else { (qy, node.y) };
        let diff = q_axis - node_axis;
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.recurse(near, qx, qy, depth + 1, k, heap);
        if heap.len() < k || diff * diff < heap.peek().unwrap().dist2 {
            self.recurse(far, qx, qy, depth + 1, k, heap);
        }
    }

    /// Load a cache file, accepting it only if its fingerprint matches
    /// `expected_fingerprint`. A missing file is `Ok(None)`; every other
    /// structural problem is a typed `Err` for the caller to log and treat
    /// as a cache miss.
    pub fn load_cache(path: &Path, expected_fingerprint: &str) -> Result<Option<KDTree>, KdCacheError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header_len = 4 + 4 + 8 + 4 + 4;
        if bytes.len() < header_len {
            return Err(KdCacheError::TooSmall { size: bytes.len() });
        }
        if bytes[0..4] != CACHE_MAGIC {
            return Err(KdCacheError::BadMagic);
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != CACHE_VERSION {
            return Err(KdCacheError::UnsupportedVersion(version));
        }
        let cos_mean_lat = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let node_count = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
        let fp_len = u32::from_le_bytes(bytes[20..24].try_into().unwrap()) as usize;

        let fp_start = 24;
        let fp_end = fp_start + fp_len;
        if bytes.len() < fp_end {
            return Err(KdCacheError::Truncated);
        }
        let fingerprint = std::str::from_utf8(&bytes[fp_start..fp_end]).map_err(|_| KdCacheError::Truncated)?;
        if fingerprint != expected_fingerprint {
            return Err(KdCacheError::FingerprintMismatch);
        }

        let padded = align8(fp_end);
        let node_bytes = node_count * std::mem::size_of::<KDNode>();
        if bytes.len() < padded + node_bytes {
            return Err(KdCacheError::Truncated);
        }
        let nodes: &[KDNode] = bytemuck::cast_slice(&bytes[padded..padded + node_bytes]);

        Ok(Some(KDTree {
            nodes: nodes.to_vec(),
            cos_mean_lat,
        }))
    }

    /// Atomically persist this tree (write to a temp file, then rename).
    pub fn save_cache(&self, path: &Path, fingerprint: &str) -> Result<(), KdCacheError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CACHE_MAGIC);
        buf.extend_from_slice(&CACHE_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.cos_mean_lat.to_le_bytes());
        buf.extend_from_slice(&(self.nodes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(fingerprint.len() as u32).to_le_bytes());
        buf.extend_from_slice(fingerprint.as_bytes());

        let padded = align8(buf.len());
        buf.resize(padded, 0);
        buf.extend_from_slice(bytemuck::cast_slice(&self.nodes));

        let tmp_path = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&buf)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Recursive median-of-three quickselect build. Emits the median node for
/// `[start, end)` before recursing into children, so the overall root lands
/// at array index 0. Returns the emitted position, or -1 for an empty range.
fn build_rec(
    points: &mut [(f64, f64, i32)],
    start: usize,
    end: usize,
    depth: usize,
    out: &mut Vec<KDNode>,
) -> i32 {
    if end <= start {
        return -1;
    }
    if end - start == 1 {
        let (x, y, index) = points[start];
        out.push(KDNode {
            x,
            y,
            index,
            left: -1,
            right: -1,
            _pad: 0,
        });
        return (out.len() - 1) as i32;
    }

    let axis = depth % 2;
    let mid = (start + end) / 2;
    select_nth(&mut points[start..end], mid - start, axis);

    let (x, y, index) = points[mid];
    out.push(KDNode {
        x,
        y,
        index,
        left: -1,
        right: -1,
        _pad: 0,
    });
    let self_pos = (out.len() - 1) as i32;

    let left = build_rec(points, start, mid, depth + 1, out);
    let right = build_rec(points, mid + 1, end, depth + 1, out);
    out[self_pos as usize].left = left;
    out[self_pos as usize].right = right;
    self_pos
}

fn key(p: &(f64, f64, i32), axis: usize) -> f64 {
    if axis == 0 {
        p.0
    } else {
        p.1
    }
}

/// In-place selection: after this call, `arr[k]` holds the element that
/// would occupy position `k` under a full sort by `axis`; no other ordering
/// guarantee is made. Pivot chosen as the median of the first/middle/last
/// elements at each step.
fn select_nth(arr: &mut [(f64, f64, i32)], k: usize, axis: usize) {
    let mut lo = 0usize;
    let mut hi = arr.len() - 1;
    let mut rng = rand::thread_rng();

    loop {
        if lo == hi {
            return;
        }
        let pivot_idx = median_of_three(arr, lo, hi, axis, &mut rng);
        let pivot_final = partition(arr, lo, hi, pivot_idx, axis);
        if k == pivot_final {
            return;
        } else if k < pivot_final {
            hi = pivot_final - 1;
        } else {
            lo = pivot_final + 1;
        }
    }
}

/// Median-of-three pivot selection over three randomly sampled positions in
/// `[lo, hi]`, which avoids the quadratic worst case a fixed lo/mid/hi
/// choice hits on already-sorted input.
fn median_of_three(
    arr: &[(f64, f64, i32)],
    lo: usize,
    hi: usize,
    axis: usize,
    rng: &mut impl Rng,
) -> usize {
    if hi == lo {
        return lo;
    }
    let i = rng.gen_range(lo..=hi);
    let j = rng.gen_range(lo..=hi);
    let m = rng.gen_range(lo..=hi);

    let (ki, kj, km) = (key(&arr[i], axis), key(&arr[j], axis), key(&arr[m], axis));
    if (ki <= kj && kj <= km) || (km <= kj && kj <= ki) {
        j
    } else if (kj <= ki && ki <= km) || (km <= ki && ki <= kj) {
        i
    } else {
        m
    }
}

fn partition(
    arr: &mut [(f64, f64, i32)],
    lo: usize,
    hi: usize,
    pivot_idx: usize,
    axis: usize,
) -> usize {
    arr.swap(pivot_idx, hi);
    let pivot_val = key(&arr[hi], axis);
    let mut store = lo;
    for i in lo..hi {
        if key(&arr[i], axis) < pivot_val {
            arr.swap(i, store);
            store += 1;
        }
    }
    arr.swap(store, hi);
    store
}
