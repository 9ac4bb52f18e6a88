//! Polygon QT Nodes - Quadtree Node Coverage of Geographic Polygons
//!
//! This library computes, for lon/lat polygons, the compact set of quadtree nodes
//! that covers their interior down to a chosen maximum level. Fully covered
//! sibling nodes are merged into their parent, so large interiors cost few
//! addresses while borders stay at full resolution.
//!
//! # Architecture
//!
//! - **[`Polygon`] / [`PolygonSet`]**: Closed vertex rings in degrees
//! - **[`Grid`]**: Scanline rasteriser and tree walk for one grid origin
//! - **[`Coverage`]**: Picks the grid origin that avoids the antimeridian and runs it
//! - **[`qtaddress`]**: Address encode/decode and flat to Mercator conversion
//! - **[`AddressSink`]**: Where emitted addresses go
//!
//! Both the flat (plate carrée, root spanning latitudes -180..180) and the
//! Web Mercator tree shapes are supported.
//!
//! # Performance Characteristics
//!
//! - **Scan**: O(P + C) per polygon, P=perimeter in max-level nodes, C=columns
//! - **Tree walk**: O(A) leaf tests, A=max-level nodes in the snapped bounding box
//! - **Polygons**: independent, processed in parallel by [`Coverage::quadtree_nodes_parallel`]

mod coverage;
mod grid;
mod polygon;
pub mod qtaddress;
mod scan;
mod sink;
pub mod utils;

// Public API exports
pub use coverage::{Config, Coverage, Projection};
pub use grid::Grid;
pub use polygon::{Polygon, PolygonSet, Vertex};
pub use qtaddress::{DecodeError, MAX_LEVEL};
pub use sink::{AddressSink, WriteSink};

/// Error types for quadtree coverage
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("Invalid quadtree address: {0}")]
    InvalidAddress(#[from] DecodeError),

    #[error("Invalid max level {0}: must be between 1 and {MAX_LEVEL}")]
    InvalidLevel(u32),

    #[error("Odd number of crossings in column {column}: {count}. Polygon may not be legal")]
    OddColumnCrossings { column: i64, count: usize },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoverageError>;
