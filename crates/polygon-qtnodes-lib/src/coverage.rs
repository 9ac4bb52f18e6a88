//! Coverage - Top-level manager for polygons and grid selection
//!
//! A polygon straddling the antimeridian looks, on a grid starting at -180°,
//! like a band wrapping almost all the way around the globe. The manager
//! builds a second grid starting at the prime meridian, compares bounding box
//! areas and runs the grid where the polygons are compact.

use crate::{AddressSink, CoverageError, Grid, MAX_LEVEL, Polygon, PolygonSet, Result, qtaddress};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape of the quadtree's rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    /// Rows evenly spaced in latitude, root spanning -180..180
    #[default]
    Flat,
    /// Rows evenly spaced in Web Mercator `y`
    Mercator,
}

impl Projection {
    #[inline]
    pub fn is_mercator(self) -> bool {
        matches!(self, Projection::Mercator)
    }
}

/// Configuration for the coverage run
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Deepest level of the emitted nodes (default 18).
    /// Each level halves the node size, so this sets the border resolution.
    pub max_level: u32,
    /// Tree shape (default flat)
    pub projection: Projection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_level: 18,
            projection: Projection::Flat,
        }
    }
}

impl Config {
    /// Check that the level is addressable
    pub fn validate(&self) -> Result<()> {
        if self.max_level == 0 || self.max_level > MAX_LEVEL {
            return Err(CoverageError::InvalidLevel(self.max_level));
        }
        Ok(())
    }
}

/// South-west corners of the default grid and of the one wrapping at the prime meridian
const GRID_ORIGINS: [(f64, f64); 2] = [(-180.0, -90.0), (0.0, -90.0)];

/// Top-level manager for all polygons and coverage runs
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    polygons: PolygonSet,
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Coverage {
    /// Create an empty coverage run with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            polygons: PolygonSet::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn polygons(&self) -> &PolygonSet {
        &self.polygons
    }

    pub fn add_polygon(&mut self, polygon: Polygon) {
        self.polygons.add_polygon(polygon);
    }

    pub fn add_polygons(&mut self, polygons: impl IntoIterator<Item = Polygon>) {
        for polygon in polygons {
            self.polygons.add_polygon(polygon);
        }
    }

    /// Build a grid per origin and keep the one with the strictly smallest
    /// bounding box area; ties go to the `-180` grid
    pub fn select_grid(&self) -> Result<Grid> {
        let [(default_west, default_south), (wrapped_west, wrapped_south)] = GRID_ORIGINS;

        let mut grid = Grid::new(default_west, default_south);
        grid.add_polygons(&self.polygons)?;
        let mut wrapped = Grid::new(wrapped_west, wrapped_south);
        wrapped.add_polygons(&self.polygons)?;

        tracing::debug!(
            default_area = grid.bounding_box_area(),
            wrapped_area = wrapped.bounding_box_area(),
            "grid candidates"
        );

        if wrapped.bounding_box_area() < grid.bounding_box_area() {
            Ok(wrapped)
        } else {
            Ok(grid)
        }
    }

    /// Covering nodes of every polygon, in polygon order
    pub fn quadtree_nodes(&self) -> Result<Vec<String>> {
        let mut nodes: Vec<String> = Vec::new();
        self.write_quadtree_nodes(&mut nodes)?;
        Ok(nodes)
    }

    /// Same output as [`Coverage::quadtree_nodes`], polygons computed in parallel
    pub fn quadtree_nodes_parallel(&self) -> Result<Vec<String>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("coverage::quadtree_nodes_parallel");

        self.config.validate()?;
        let grid = self.select_grid()?;
        let max_level = self.config.max_level;
        let is_mercator = self.config.projection.is_mercator();

        let per_polygon: Vec<Vec<String>> = (0..grid.polygon_count())
            .into_par_iter()
            .map(|index| grid.quadtree_nodes_for_polygon(index, max_level, is_mercator))
            .collect::<Result<_>>()?;

        Ok(per_polygon.into_iter().flatten().collect())
    }

    /// Stream the covering nodes of every polygon into `sink`
    pub fn write_quadtree_nodes(&self, sink: &mut dyn AddressSink) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("coverage::write_quadtree_nodes");

        self.config.validate()?;
        let grid = self.select_grid()?;
        tracing::info!(
            polygons = grid.polygon_count(),
            west_origin = grid.west_origin(),
            max_level = self.config.max_level,
            projection = ?self.config.projection,
            "calculating quadtree nodes"
        );
        grid.calculate_quadtree_nodes(
            self.config.max_level,
            self.config.projection.is_mercator(),
            sink,
        )
    }

    /// Mercator paths overlapping each flat path, first occurrence order kept
    ///
    /// Input and output are grid paths (no root digit).
    pub fn mercator_nodes_from_flat<S: AsRef<str>>(flat_paths: &[S]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        let mut addresses = Vec::new();

        for path in flat_paths {
            addresses.clear();
            let address = qtaddress::qt_path_to_address(path.as_ref());
            qtaddress::convert_flat_to_mercator_qt_addresses(&address, &mut addresses)?;

            for address in &addresses {
                let path = qtaddress::qt_address_to_path(address)?;
                if seen.insert(path.to_string()) {
                    nodes.push(path.to_string());
                }
            }
        }

        Ok(nodes)
    }
}
