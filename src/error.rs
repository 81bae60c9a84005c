//! Error types for graph loading and routing.
//!
//! Library-tier code uses `thiserror` for typed, matchable errors; the CLI
//! boundary (`src/main.rs`) uses `anyhow` for ad-hoc context instead.

use thiserror::Error;

/// Fatal errors that can occur while loading a [`crate::graph::CompactGraph`].
#[derive(Debug, Error)]
pub enum GraphLoadError {
    #[error("graph file is {size} bytes, smaller than the 32-byte header")]
    TooSmall { size: usize },

    #[error("bad magic bytes: expected \"CSRG\", found {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported graph format version {version} (expected 1 or 2)")]
    UnsupportedVersion { version: u32 },

    #[error("graph file truncated: section {section} needs {needed} bytes but only {available} remain")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("string table overrun while reading {table} table entry {index}")]
    StringTableOverrun { table: &'static str, index: usize },

    #[error("failed to memory-map graph file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors for an individual routing query (never fatal to the graph object).
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("external node id {0} not present in the graph")]
    UnknownNode(i64),
}

/// KD-tree cache read/write failures. Always non-fatal to the caller: a
/// cache miss simply triggers a rebuild.
#[derive(Debug, Error)]
pub enum KdCacheError {
    #[error("cache file is {size} bytes, smaller than the header")]
    TooSmall { size: usize },

    #[error("bad magic bytes in kd-tree cache")]
    BadMagic,

    #[error("unsupported kd-tree cache version {0}")]
    UnsupportedVersion(u32),

    #[error("kd-tree cache fingerprint mismatch")]
    FingerprintMismatch,

    #[error("kd-tree cache truncated")]
    Truncated,

    #[error("kd-tree cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}
