//! Pedestrian walking-route engine over a compact, memory-mappable street
//! graph: CSR adjacency, a KD-tree nearest-node index, A*-based routing with
//! a novelty-preferring multi-phase search, and turn-by-turn instructions.

pub mod error;
pub mod geo;
pub mod graph;
pub mod instructions;
pub mod kdtree;
pub mod router;
pub mod types;

pub use error::{GraphLoadError, KdCacheError, RouteError};
pub use graph::CompactGraph;
pub use instructions::InstructionSynthesizer;
pub use kdtree::KDTree;
pub use router::{PathResult, Router};
pub use types::{EdgeKey, NavigationStep, RouteResult, TurnDirection};
