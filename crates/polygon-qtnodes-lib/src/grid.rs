//! Grid - polygon to quadtree node coverage
//!
//! A grid is a lon/lat box (360° wide, 180° tall) anchored at a chosen
//! south-west origin. Moving the origin lets a polygon that straddles the
//! antimeridian be processed without wrapping. For every polygon the grid:
//!
//! 1. snaps the polygon's bounding box outwards to max-level node borders,
//! 2. finds the smallest quadtree node that still holds the whole box,
//! 3. scans the perimeter into per-column crossings (see [`crate::scan`]),
//! 4. walks the tree depth-first from that node, testing the centre of each
//!    max-level node against the crossings and merging fully covered
//!    siblings into their parent.
//!
//! Emitted addresses are quadtree *paths*: one digit per level, without the
//! root digit, `'0'` being the south-west child, `'1'` south-east, `'2'`
//! north-east and `'3'` north-west.

use crate::qtaddress::MAX_LEVEL;
use crate::scan::ScanState;
use crate::sink::AddressSink;
use crate::{CoverageError, Polygon, PolygonSet, Result, utils};
use geo::{Coord, Rect};
use std::f64::consts::PI;

/// Quadtree node visited while walking down the tree
#[derive(Clone, Debug)]
struct Cell {
    path: String,
    west: f64,
    south: f64,
    north: f64,
    level: u32,
}

impl Cell {
    /// The four children in digit order, split at `mid` latitude
    fn children(&self, child_width: f64, mid: f64) -> [Cell; 4] {
        let child = |digit: char, west: f64, south: f64, north: f64| {
            let mut path = String::with_capacity(self.path.len() + 1);
            path.push_str(&self.path);
            path.push(digit);
            Cell {
                path,
                west,
                south,
                north,
                level: self.level + 1,
            }
        };

        [
            child('0', self.west, self.south, mid),
            child('1', self.west + child_width, self.south, mid),
            child('2', self.west + child_width, mid, self.north),
            child('3', self.west, mid, self.north),
        ]
    }
}

/// Result of walking one subtree
#[derive(Debug, Default)]
struct NodeCoverage {
    /// Every max-level node below is covered; emission is left to the parent
    full: bool,
    /// Paths emitted for this subtree, in output order
    nodes: Vec<String>,
}

/// Grid with a fixed origin holding the polygons to cover
#[derive(Debug, Clone)]
pub struct Grid {
    west_origin: f64,
    south_origin: f64,
    /// Polygons with their vertices moved into this grid's box
    polygons: Vec<Polygon>,
    /// Bounding box of every polygon added so far
    bounding_box: Option<Rect<f64>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Grid {
    /// Create a grid whose box starts at the given south-west corner
    ///
    /// The usual origins are `(-180, -90)` and `(0, -90)`.
    pub fn new(west_origin: f64, south_origin: f64) -> Self {
        Self {
            west_origin,
            south_origin,
            polygons: Vec::new(),
            bounding_box: None,
        }
    }

    #[inline]
    pub fn west_origin(&self) -> f64 {
        self.west_origin
    }

    #[inline]
    pub fn south_origin(&self) -> f64 {
        self.south_origin
    }

    /// Add every polygon of the set
    pub fn add_polygons(&mut self, polygons: &PolygonSet) -> Result<()> {
        for polygon in polygons {
            self.add_polygon(polygon)?;
        }
        Ok(())
    }

    /// Add one polygon, moving its vertices into this grid's box and growing
    /// the accumulated bounding box
    pub fn add_polygon(&mut self, polygon: &Polygon) -> Result<()> {
        let mut local = polygon.clone();
        for vertex in local.vertices_mut().iter_mut() {
            if !vertex.x.is_finite() || !vertex.y.is_finite() {
                return Err(CoverageError::InvalidGeometry(format!(
                    "non-finite vertex ({}, {})",
                    vertex.x, vertex.y
                )));
            }
            *vertex = self.convert_to_local(*vertex);
        }

        if let Some(bounds) = ring_bounds(&local) {
            self.bounding_box = Some(match self.bounding_box {
                Some(current) => union(current, bounds),
                None => bounds,
            });
        }

        self.polygons.push(local);
        Ok(())
    }

    /// Area in square degrees of the accumulated bounding box
    ///
    /// Comparing this between grids with different origins tells which one
    /// keeps the polygons away from its seam.
    pub fn bounding_box_area(&self) -> f64 {
        self.bounding_box
            .map(|rect| rect.width() * rect.height())
            .unwrap_or(0.0)
    }

    /// Accumulated bounding box, in this grid's local coordinates
    #[inline]
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.bounding_box
    }

    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Polygons as stored, in local coordinates
    #[inline]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Write the covering nodes of every polygon to `sink`, polygon by polygon
    ///
    /// Stops at the first polygon that fails.
    pub fn calculate_quadtree_nodes(
        &self,
        max_level: u32,
        is_mercator: bool,
        sink: &mut dyn AddressSink,
    ) -> Result<()> {
        for index in 0..self.polygons.len() {
            tracing::debug!(polygon = index, "calculating quadtree nodes");
            self.calculate_quadtree_nodes_for_polygon(index, max_level, is_mercator, sink)?;
        }
        Ok(())
    }

    /// Write the covering nodes of the polygon at `index` to `sink`
    pub fn calculate_quadtree_nodes_for_polygon(
        &self,
        index: usize,
        max_level: u32,
        is_mercator: bool,
        sink: &mut dyn AddressSink,
    ) -> Result<()> {
        for node in self.quadtree_nodes_for_polygon(index, max_level, is_mercator)? {
            sink.write_line(&node)?;
        }
        Ok(())
    }

    /// Covering nodes of the polygon at `index`, in output order
    pub fn quadtree_nodes_for_polygon(
        &self,
        index: usize,
        max_level: u32,
        is_mercator: bool,
    ) -> Result<Vec<String>> {
        if max_level == 0 || max_level > MAX_LEVEL {
            return Err(CoverageError::InvalidLevel(max_level));
        }

        let polygon = self.polygons.get(index).ok_or_else(|| {
            CoverageError::InvalidGeometry(format!("no polygon at index {index}"))
        })?;

        if polygon.len() < 2 {
            tracing::warn!(
                polygon = index,
                vertices = polygon.len(),
                "Skipping ring with fewer than 2 vertices"
            );
            return Ok(Vec::new());
        }

        let Some(bounds) = ring_bounds(polygon) else {
            return Ok(Vec::new());
        };

        let pass = PolygonPass::new(self, bounds, max_level, is_mercator);
        let start = pass.smallest_encompassing_node();

        let points: Vec<(i32, i32)> = polygon
            .vertices()
            .iter()
            .map(|v| pass.convert_to_level_coordinates(v.x, v.y))
            .collect();

        let mut scan = ScanState::new(pass.number_of_cols());
        scan.scan_ring(&points);
        scan.finish()?;

        let coverage = pass.covered_nodes(&scan, &start);
        let mut nodes = coverage.nodes;
        if coverage.full {
            nodes.push(self.wrap_corrected(start.path.clone()));
        }

        tracing::debug!(
            polygon = index,
            vertices = polygon.len(),
            start = %start.path,
            start_level = start.level,
            nodes = nodes.len(),
            "quadtree nodes calculated"
        );

        Ok(nodes)
    }

    /// Move a vertex into `[west_origin, west_origin + 360)` by
    /// `[south_origin, south_origin + 180)`
    fn convert_to_local(&self, vertex: Coord<f64>) -> Coord<f64> {
        Coord {
            x: wrap_into(vertex.x, self.west_origin, 360.0),
            y: wrap_into(vertex.y, self.south_origin, 180.0),
        }
    }

    /// Swap the first digit west/east when this grid starts at the prime meridian
    ///
    /// The first-level quadrants of a `0.0` origin grid are the mirror image
    /// of the default `-180.0` grid's.
    fn wrap_corrected(&self, mut path: String) -> String {
        if self.west_origin != 0.0 {
            return path;
        }

        let swapped = match path.as_bytes().first() {
            Some(b'0') => '1',
            Some(b'1') => '0',
            Some(b'2') => '3',
            Some(b'3') => '2',
            _ => return path,
        };
        path.replace_range(..1, swapped.encode_utf8(&mut [0; 4]));
        path
    }
}

/// Per-polygon, per-level geometry derived from the polygon's bounding box
///
/// Immutable once built; the mutable scan state lives in [`ScanState`].
#[derive(Debug)]
struct PolygonPass<'a> {
    grid: &'a Grid,
    is_mercator: bool,
    max_level: u32,
    /// Number of max-level nodes along each dimension
    dim_size: f64,
    /// Number of max-level nodes per degree of longitude
    qtnodes_per_degree: f64,

    polygon_west: f64,
    polygon_east: f64,
    polygon_south: f64,
    polygon_north: f64,

    /// Polygon bounding box snapped to max-level node borders
    west_boundary: f64,
    east_boundary: f64,
    south_boundary: f64,
    north_boundary: f64,
    /// Column of `west_boundary` counted from the grid origin
    col_offset: i32,
}

impl<'a> PolygonPass<'a> {
    fn new(grid: &'a Grid, bounds: Rect<f64>, max_level: u32, is_mercator: bool) -> Self {
        let dim_size = level_dim_size(max_level);
        let qtnodes_per_degree = dim_size / 360.0;
        let west_origin = grid.west_origin;
        let south_origin = grid.south_origin;

        let polygon_west = bounds.min().x;
        let polygon_east = bounds.max().x;
        let polygon_south = bounds.min().y;
        let polygon_north = bounds.max().y;

        let col_offset = ((polygon_west - west_origin) * qtnodes_per_degree).floor() as i32;
        let west_boundary = f64::from(col_offset) / qtnodes_per_degree + west_origin;

        let east_offset = ((polygon_east - west_origin) * qtnodes_per_degree).ceil();
        let east_boundary = east_offset / qtnodes_per_degree + west_origin;

        let north_offset = ((polygon_north - south_origin + 90.0) * qtnodes_per_degree).ceil();
        let north_boundary = north_offset / qtnodes_per_degree + south_origin - 90.0;

        let south_offset = ((polygon_south - south_origin + 90.0) * qtnodes_per_degree).floor();
        let south_boundary = south_offset / qtnodes_per_degree + south_origin - 90.0;

        Self {
            grid,
            is_mercator,
            max_level,
            dim_size,
            qtnodes_per_degree,
            polygon_west,
            polygon_east,
            polygon_south,
            polygon_north,
            west_boundary,
            east_boundary,
            south_boundary,
            north_boundary,
            col_offset,
        }
    }

    /// Columns spanned by the snapped bounding box, plus one
    fn number_of_cols(&self) -> usize {
        let east_col = ((self.east_boundary - self.grid.west_origin) / 360.0 * self.dim_size).ceil();
        let cols = 1 + east_col as i64 - i64::from(self.col_offset);
        cols.max(1) as usize
    }

    /// Max-level `(col, row)` of a local lon/lat position
    ///
    /// Rows grow northwards here. Rounding down means the max level decides
    /// how much of a thin feature survives.
    fn convert_to_level_coordinates(&self, x: f64, y: f64) -> (i32, i32) {
        let y_norm = if self.is_mercator {
            utils::mercator_lat_to_y(y) / PI * 180.0
        } else {
            y
        };
        let row = ((y_norm - self.grid.south_origin + 90.0) * self.qtnodes_per_degree).floor();
        let col = ((x - self.west_boundary) * self.qtnodes_per_degree).floor();
        (col as i32, row as i32)
    }

    /// Whether the max-level node containing `(x, y)` is inside the polygon
    fn is_location_in_polygon(&self, scan: &ScanState, x: f64, y: f64) -> bool {
        let (col, row) = self.convert_to_level_coordinates(x, y);
        if col < 0 || col as usize >= scan.columns() {
            return false;
        }
        scan.is_covered(col, row)
    }

    /// Descend from the root while a single child holds the whole bounding box
    fn smallest_encompassing_node(&self) -> Cell {
        let (mut south, mut north) = if self.is_mercator {
            (
                -utils::MAX_MERCATOR_LATITUDE,
                utils::MAX_MERCATOR_LATITUDE,
            )
        } else {
            (-180.0, 180.0)
        };

        let mut west = self.grid.west_origin;
        let mut path = String::new();
        let mut level = 0;

        while level < self.max_level {
            let child_width = 180.0 / level_dim_size(level);
            let mid = utils::bisect_latitudes(south, north, self.is_mercator);
            let west_half = self.polygon_west <= west + child_width;

            // Child holding the south-west corner
            let next = match (self.polygon_south <= mid, west_half) {
                (true, true) => '0',
                (true, false) => '1',
                (false, true) => '3',
                (false, false) => '2',
            };

            // The north-east corner must fall in the same child
            let east_in_west_half = self.polygon_east <= west + child_width;
            if self.polygon_north <= mid {
                match (east_in_west_half, next) {
                    (true, '0') => {}
                    (false, '1') => west += child_width,
                    _ => break,
                }
                north = mid;
            } else {
                match (east_in_west_half, next) {
                    (true, '3') => {}
                    (false, '2') => west += child_width,
                    _ => break,
                }
                south = mid;
            }

            path.push(next);
            level += 1;
        }

        Cell {
            path,
            west,
            south,
            north,
            level,
        }
    }

    /// Covered nodes below `cell`, compacted
    ///
    /// At the max level the node's centre is tested against the crossings.
    /// Above it, when all four children are full the subtree reports itself
    /// full and emits nothing; otherwise each full child is emitted.
    fn covered_nodes(&self, scan: &ScanState, cell: &Cell) -> NodeCoverage {
        let degrees_per_qtnode = 360.0 / level_dim_size(cell.level);
        let child_width = degrees_per_qtnode / 2.0;
        let mid = utils::bisect_latitudes(cell.south, cell.north, self.is_mercator);

        if cell.level == self.max_level {
            return NodeCoverage {
                full: self.is_location_in_polygon(scan, cell.west + child_width, mid),
                nodes: Vec::new(),
            };
        }

        // Skip subtrees entirely outside the snapped bounding box
        let east = cell.west + degrees_per_qtnode;
        if self.east_boundary < cell.west
            || self.west_boundary > east
            || self.north_boundary < cell.south
            || self.south_boundary > cell.north
        {
            return NodeCoverage::default();
        }

        let children = cell.children(child_width, mid);
        let mut nodes = Vec::new();
        let mut full = [false; 4];
        for (i, child) in children.iter().enumerate() {
            let coverage = self.covered_nodes(scan, child);
            full[i] = coverage.full;
            nodes.extend(coverage.nodes);
        }

        if full.iter().all(|&f| f) {
            return NodeCoverage { full: true, nodes };
        }

        for (child, _) in children.into_iter().zip(full).filter(|(_, f)| *f) {
            nodes.push(self.grid.wrap_corrected(child.path));
        }

        NodeCoverage { full: false, nodes }
    }
}

/// Number of nodes along one dimension at `level`
#[inline]
fn level_dim_size(level: u32) -> f64 {
    (1u64 << level) as f64
}

/// Shift `value` by whole periods into `[origin, origin + period)`
fn wrap_into(value: f64, origin: f64, period: f64) -> f64 {
    let mut value = value;
    if (value - origin).abs() > period * 16.0 {
        value = origin + (value - origin).rem_euclid(period);
    }
    while value < origin {
        value += period;
    }
    while value >= origin + period {
        value -= period;
    }
    value
}

fn ring_bounds(polygon: &Polygon) -> Option<Rect<f64>> {
    let (first, rest) = polygon.vertices().split_first()?;
    let (min, max) = rest.iter().fold((*first, *first), |(min, max), v| {
        (
            Coord {
                x: min.x.min(v.x),
                y: min.y.min(v.y),
            },
            Coord {
                x: max.x.max(v.x),
                y: max.y.max(v.y),
            },
        )
    });
    Some(Rect::new(min, max))
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qtaddress::convert_to_qt_node;
    use crate::{Vertex, utils::MAX_MERCATOR_LATITUDE};

    /// Vertex layout of the reference ring on an 8x6 pixel grid:
    ///
    /// ```text
    ///    -  -  3  4  -  -  -  5
    ///    2  9  -  -  -  8  -  -
    ///    - 10 11  -  -  -  -  -
    ///    1  -  -  -  -  -  -  -
    ///    -  -  - 12  -  7  6  -
    ///    0  -  -  -  -  -  -  -
    /// ```
    ///
    /// and the expected fill:
    ///
    /// ```text
    ///    -  x  3  x  x  x  x  5
    ///    2  9  x  x  x  8  x  x
    ///    x 10 11  -  -  x  x  x
    ///    1  x  x  x  -  x  x  -
    ///    x  x  x 12  -  7  6  -
    ///    0  x  -  -  -  -  -  -
    /// ```
    const KNOWN_POLYGON: [(i32, i32); 14] = [
        (0, 0),
        (0, 2),
        (0, 4),
        (2, 5),
        (3, 5),
        (7, 5),
        (6, 1),
        (5, 1),
        (5, 4),
        (1, 4),
        (1, 3),
        (2, 3),
        (3, 1),
        (0, 0),
    ];

    const KNOWN_NODES: [&str; 20] = [
        "012", "013", "020", "021", "023", "00", "03", "102", "113", "120", "122", "123", "131",
        "132", "20", "21", "300", "301", "302", "31",
    ];

    /// A line from pixel (0, 0) to (4, 4) and back
    const DEGENERATE_POLYGON: [(i32, i32); 3] = [(0, 0), (4, 4), (0, 0)];

    const DEGENERATE_NODES: [&str; 5] = ["000", "002", "020", "022", "200"];

    fn expected(suffixes: &[&str]) -> Vec<String> {
        suffixes.iter().map(|s| format!("310{s}")).collect()
    }

    /// Ring with vertices on max-level node corners, shifted by `offset` degrees
    fn level_polygon(coords: &[(i32, i32)], level: u32, west: f64, south: f64, offset: f64) -> Polygon {
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        Polygon::new(
            coords
                .iter()
                .map(|&(col, row)| Vertex {
                    x: west + degrees_per_qtnode * f64::from(col) + offset,
                    y: south + degrees_per_qtnode * f64::from(row) + offset,
                })
                .collect(),
        )
    }

    /// Same as [`level_polygon`] but rows are evenly spaced in Mercator `y`
    fn level_mercator_polygon(coords: &[(i32, i32)], level: u32, west: f64, south: f64) -> Polygon {
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        let y0 = utils::mercator_lat_to_y(south);
        let dy = 2.0 * PI / f64::from(1u32 << level);
        Polygon::new(
            coords
                .iter()
                .map(|&(col, row)| {
                    let y2 = y0 + f64::from(row) * dy;
                    Vertex {
                        x: west + degrees_per_qtnode * f64::from(col),
                        // Nudge north of the node border, rows are floored
                        y: utils::mercator_y_to_lat(y2) + 0.0000000001,
                    }
                })
                .collect(),
        )
    }

    fn nodes_with_origin(polygon: &Polygon, west_origin: f64, level: u32, is_mercator: bool) -> Vec<String> {
        let mut grid = Grid::new(west_origin, -90.0);
        grid.add_polygon(polygon).unwrap();
        let mut out: Vec<String> = Vec::new();
        grid.calculate_quadtree_nodes(level, is_mercator, &mut out).unwrap();
        out
    }

    fn nodes(polygon: &Polygon, level: u32, is_mercator: bool) -> Vec<String> {
        nodes_with_origin(polygon, -180.0, level, is_mercator)
    }

    /// Move every vertex one position later; the closing vertex follows the first
    fn rotate_ring(vertices: &mut [Vertex]) {
        let last = vertices.len() - 1;
        vertices[last] = vertices[last - 1];
        for j in (1..last).rev() {
            vertices[j] = vertices[j - 1];
        }
        vertices[0] = vertices[last];
    }

    /// Every starting vertex gives the same nodes, and so does every starting
    /// vertex of the reversed ring (compared with the reversed ring's own
    /// output, since half-pixel rounding may differ by direction).
    fn assert_all_starting_points(polygon: &Polygon, level: u32, is_mercator: bool) {
        let mut polygon = polygon.clone();
        let gold = nodes(&polygon, level, is_mercator);
        let last = polygon.len() - 1;
        for i in 0..last - 1 {
            rotate_ring(polygon.vertices_mut());
            assert_eq!(gold, nodes(&polygon, level, is_mercator), "rotation {i}");
        }

        polygon.vertices_mut().reverse();
        let reversed_gold = nodes(&polygon, level, is_mercator);
        for i in 0..last - 1 {
            rotate_ring(polygon.vertices_mut());
            assert_eq!(
                reversed_gold,
                nodes(&polygon, level, is_mercator),
                "reversed rotation {i}"
            );
        }
    }

    /// Path of the max-level flat node whose centre is `(lon, lat)` on a
    /// `-180` origin grid
    fn flat_path_at(lon: f64, lat: f64, level: u32) -> String {
        let dim = f64::from(1u32 << level);
        let col = ((lon + 180.0) / 360.0 * dim).floor() as u32;
        let row_from_top = ((180.0 - lat) / 360.0 * dim).floor() as u32;
        convert_to_qt_node(col, row_from_top, level)[1..].to_string()
    }

    #[test]
    fn test_known_quadtree_nodes() {
        let level = 6;
        let polygon = level_polygon(&KNOWN_POLYGON, level, -90.0, 0.0, 0.0);
        assert_eq!(polygon.len(), 14);
        assert_eq!(nodes(&polygon, level, false), expected(&KNOWN_NODES));
        assert_all_starting_points(&polygon, level, false);
    }

    #[test]
    fn test_known_quadtree_nodes_offset_within_pixel() {
        let level = 6;
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);

        // Just under a pixel: same answer
        let polygon = level_polygon(&KNOWN_POLYGON, level, -90.0, 0.0, degrees_per_qtnode * 0.99);
        assert_eq!(nodes(&polygon, level, false), expected(&KNOWN_NODES));
        assert_all_starting_points(&polygon, level, false);

        // Just over a pixel: different answer
        let polygon = level_polygon(&KNOWN_POLYGON, level, -90.0, 0.0, degrees_per_qtnode * 1.01);
        assert_ne!(nodes(&polygon, level, false), expected(&KNOWN_NODES));
    }

    #[test]
    fn test_degenerate_polygon() {
        let level = 6;
        let polygon = level_polygon(&DEGENERATE_POLYGON, level, -90.0, 0.0, 0.0);
        assert_eq!(polygon.len(), 3);
        assert_eq!(nodes(&polygon, level, false), expected(&DEGENERATE_NODES));
    }

    #[test]
    fn test_known_quadtree_nodes_mercator() {
        let level = 6;
        let polygon = level_mercator_polygon(&KNOWN_POLYGON, level, -90.0, 0.0);
        assert_eq!(polygon.len(), 14);
        assert_eq!(nodes(&polygon, level, true), expected(&KNOWN_NODES));
        assert_all_starting_points(&polygon, level, true);
    }

    #[test]
    fn test_bounding_box_area() {
        let polygon = Polygon::from_lon_lat([
            (0.0, -5.0),
            (0.0, 5.0),
            (10.0, 5.0),
            (10.0, -5.0),
            (0.0, -5.0),
        ]);

        let mut grid0 = Grid::new(-180.0, -90.0);
        let mut grid1 = Grid::new(0.0, -90.0);
        grid0.add_polygon(&polygon).unwrap();
        grid1.add_polygon(&polygon).unwrap();

        assert!((grid0.bounding_box_area() - 100.0).abs() < 0.000001);
        assert!((grid1.bounding_box_area() - 100.0).abs() < 0.000001);
    }

    #[test]
    fn test_bounding_box_area_across_antimeridian() {
        let polygon = Polygon::from_lon_lat([
            (175.0, -5.0),
            (175.0, 5.0),
            (-175.0, 5.0),
            (-175.0, -5.0),
            (175.0, -5.0),
        ]);

        let mut grid0 = Grid::new(-180.0, -90.0);
        let mut grid1 = Grid::new(0.0, -90.0);
        grid0.add_polygon(&polygon).unwrap();
        grid1.add_polygon(&polygon).unwrap();

        assert!(grid0.bounding_box_area() > grid1.bounding_box_area());
        assert!((grid1.bounding_box_area() - 100.0).abs() < 0.000001);
        let local = grid1.polygons()[0].vertices();
        assert_eq!(local[2].x, 185.0);
    }

    #[test]
    fn test_multi_polygon_concatenation() {
        let polygon_a = Polygon::from_lon_lat([
            (-122.0, 37.0),
            (-121.0, 38.0),
            (-120.0, 35.0),
            (-121.0, 36.0),
            (-122.0, 37.0),
        ]);
        let polygon_b = Polygon::from_lon_lat([
            (122.0, -37.0),
            (121.0, -38.0),
            (120.0, -35.0),
            (121.0, -36.0),
            (122.0, -37.0),
        ]);

        let run = |polygons: &[&Polygon]| {
            let mut grid = Grid::new(-180.0, -90.0);
            for polygon in polygons {
                grid.add_polygon(polygon).unwrap();
            }
            let mut out: Vec<String> = Vec::new();
            grid.calculate_quadtree_nodes(12, false, &mut out).unwrap();
            (out, grid.bounding_box_area())
        };

        let (nodes_a, area_a) = run(&[&polygon_a]);
        let (nodes_b, area_b) = run(&[&polygon_b]);
        assert!(!nodes_a.is_empty());
        assert!(!nodes_b.is_empty());

        let (nodes_ab, area_ab) = run(&[&polygon_a, &polygon_b]);
        assert_eq!(nodes_ab, [nodes_a.clone(), nodes_b.clone()].concat());
        // One box around everything is far larger than the two boxes
        assert!(area_a + area_b <= area_ab);

        let (nodes_ba, area_ba) = run(&[&polygon_b, &polygon_a]);
        assert_eq!(nodes_ba, [nodes_b, nodes_a].concat());
        assert_eq!(area_ab, area_ba);
    }

    #[test]
    fn test_no_polygon() {
        let grid = Grid::new(-180.0, -90.0);
        let mut out: Vec<String> = Vec::new();
        grid.calculate_quadtree_nodes(18, false, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(grid.bounding_box_area(), 0.0);
    }

    #[test]
    fn test_both_origins_agree_away_from_seam() {
        let polygon = Polygon::from_lon_lat([
            (-121.912_345_7, 37.281_736_2),
            (-121.665_505_9, 37.961_613_1),
            (-121.183_904_3, 38.117_302_8),
            (-120.771_622_5, 37.704_950_4),
            (-120.938_417_6, 37.173_385_9),
            (-121.402_277_1, 36.902_941_3),
            (-121.912_345_7, 37.281_736_2),
        ]);

        let mut grid0 = Grid::new(-180.0, -90.0);
        let mut grid1 = Grid::new(0.0, -90.0);
        grid0.add_polygon(&polygon).unwrap();
        grid1.add_polygon(&polygon).unwrap();
        assert!((grid0.bounding_box_area() - grid1.bounding_box_area()).abs() < 0.000001);

        for level in [10, 14] {
            let nodes0 = nodes_with_origin(&polygon, -180.0, level, false);
            let nodes1 = nodes_with_origin(&polygon, 0.0, level, false);
            assert!(!nodes0.is_empty());
            assert_eq!(nodes0, nodes1, "level {level}");
        }
    }

    #[test]
    fn test_full_node_is_compacted() {
        // Pixel centres of the 4x4 max-level nodes under "3100"
        let level = 6;
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        let square = [(0, 0), (3, 0), (3, 3), (0, 3), (0, 0)];
        let polygon = level_polygon(&square, level, -90.0, 0.0, degrees_per_qtnode / 2.0);

        let out = nodes(&polygon, level, false);
        assert_eq!(out, vec!["3100".to_string()]);
        for child in ["31000", "31001", "31002", "31003"] {
            assert!(!out.iter().any(|n| n == child));
        }

        // Same square in the eastern hemisphere: both origins name it alike
        let east = Polygon::from_lon_lat(polygon.vertices().iter().map(|v| (v.x + 180.0, v.y)));
        assert_eq!(nodes(&east, level, false), vec!["2100".to_string()]);
        assert_eq!(nodes_with_origin(&east, 0.0, level, false), vec!["2100".to_string()]);
    }

    #[test]
    fn test_rectangle_coverage_is_exact() {
        // Vertices on pixel centres; all pixels on and inside the outline count
        let level = 8;
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        let rectangle = [(2, 1), (9, 1), (9, 6), (2, 6), (2, 1)];
        let west = 10.0 * degrees_per_qtnode;
        let south = 20.0 * degrees_per_qtnode;
        let polygon = level_polygon(&rectangle, level, west, south, degrees_per_qtnode / 2.0);

        let out = nodes(&polygon, level, false);

        let mut expected_cells = Vec::new();
        for col in 2..=9 {
            for row in 1..=6 {
                let lon = west + degrees_per_qtnode * (f64::from(col) + 0.5);
                let lat = south + degrees_per_qtnode * (f64::from(row) + 0.5);
                expected_cells.push(flat_path_at(lon, lat, level));
            }
        }

        // Every cell is represented exactly once
        for cell in &expected_cells {
            let holders = out.iter().filter(|n| cell.starts_with(n.as_str())).count();
            assert_eq!(holders, 1, "cell {cell} held by {holders} nodes in {out:?}");
        }

        // No extra area
        let covered: u64 = out
            .iter()
            .map(|n| 1u64 << (2 * (level as usize - n.len())))
            .sum();
        assert_eq!(covered, expected_cells.len() as u64);

        // Fully covered siblings never appear together
        for node in &out {
            let parent = &node[..node.len() - 1];
            let siblings = out
                .iter()
                .filter(|n| n.len() == node.len() && n.starts_with(parent))
                .count();
            assert!(siblings < 4, "{parent} should have been emitted instead");
        }
    }

    /// Nine-vertex star around `centre`, radii varying with `seed`
    fn star_ring(centre: (f64, f64), radius: f64, seed: u32) -> Vec<(f64, f64)> {
        let points = 9;
        let mut ring: Vec<(f64, f64)> = (0..points)
            .map(|k| {
                let angle = 2.0 * PI * f64::from(k) / f64::from(points) + 0.3 * f64::from(seed);
                let wobble = f64::from((k * 7 + seed * 3) % 5) / 4.0;
                let r = radius * (0.4 + 0.6 * wobble);
                (centre.0 + r * angle.cos(), centre.1 + r * angle.sin())
            })
            .collect();
        ring.push(ring[0]);
        ring
    }

    #[test]
    fn test_interior_cells_are_covered() {
        use geo::{Contains, Distance, Euclidean, LineString, Point};

        let level = 10;
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        let rings = [
            star_ring((-121.3, 37.4), 6.0, 0),
            star_ring((12.7, 45.1), 4.5, 1),
            star_ring((151.2, -33.8), 7.0, 2),
            star_ring((-47.9, -0.6), 5.0, 3),
            star_ring((80.3, 20.9), 8.0, 4),
            star_ring((-3.1, -60.2), 5.5, 5),
        ];

        for (i, ring) in rings.iter().enumerate() {
            let out = nodes(&Polygon::from_lon_lat(ring.iter().copied()), level, false);
            let shape = geo::Polygon::new(LineString::from(ring.clone()), vec![]);

            let (lons, lats): (Vec<f64>, Vec<f64>) = ring.iter().copied().unzip();
            let col_range = |values: &[f64]| {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let first = ((min + 180.0) / degrees_per_qtnode).floor() as i64;
                let last = ((max + 180.0) / degrees_per_qtnode).ceil() as i64;
                first..=last
            };

            let mut checked = 0;
            for col in col_range(&lons) {
                for row in col_range(&lats) {
                    let lon = -180.0 + (col as f64 + 0.5) * degrees_per_qtnode;
                    let lat = -180.0 + (row as f64 + 0.5) * degrees_per_qtnode;
                    let centre = Point::new(lon, lat);
                    // Vertices are floored to pixels, so cells hugging an edge may drop
                    if !shape.contains(&centre)
                        || Euclidean.distance(&centre, shape.exterior()) < degrees_per_qtnode
                    {
                        continue;
                    }

                    let cell = flat_path_at(lon, lat, level);
                    assert!(
                        out.iter().any(|n| cell.starts_with(n.as_str())),
                        "ring {i}: interior cell {cell} at ({lon}, {lat}) not covered"
                    );
                    checked += 1;
                }
            }
            assert!(checked > 50, "ring {i}: only {checked} interior cells");
        }
    }

    #[test]
    fn test_open_ring_stops_the_run() {
        let level = 8;
        let first = Polygon::from_lon_lat([
            (-60.0, 20.0),
            (-60.0, 30.0),
            (-45.0, 30.0),
            (-50.0, 20.0),
            (-60.0, 20.0),
        ]);
        // Missing the closing vertex
        let open = Polygon::from_lon_lat([(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]);
        let last = Polygon::from_lon_lat([
            (30.0, 30.0),
            (30.0, 40.0),
            (40.0, 40.0),
            (40.0, 30.0),
            (30.0, 30.0),
        ]);

        let first_nodes = nodes(&first, level, false);
        assert!(!first_nodes.is_empty());
        assert!(!nodes(&last, level, false).is_empty());

        let mut grid = Grid::new(-180.0, -90.0);
        for polygon in [&first, &open, &last] {
            grid.add_polygon(polygon).unwrap();
        }

        let mut out: Vec<String> = Vec::new();
        let err = grid.calculate_quadtree_nodes(level, false, &mut out).unwrap_err();
        match err {
            CoverageError::OddColumnCrossings { column, count } => {
                assert_eq!(count % 2, 1);
                assert!(column >= 0, "column {column}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(out, first_nodes);

        assert!(matches!(
            grid.quadtree_nodes_for_polygon(1, level, false),
            Err(CoverageError::OddColumnCrossings { .. })
        ));
    }

    #[test]
    fn test_smallest_encompassing_node() {
        let level = 6;
        let degrees_per_qtnode = 360.0 / f64::from(1u32 << level);
        let square = [(0, 0), (3, 0), (3, 3), (0, 3), (0, 0)];
        let polygon = level_polygon(&square, level, -90.0, 0.0, degrees_per_qtnode / 2.0);
        let mut grid = Grid::new(-180.0, -90.0);
        grid.add_polygon(&polygon).unwrap();
        let bounds = grid.bounding_box().unwrap();

        let start = PolygonPass::new(&grid, bounds, level, false).smallest_encompassing_node();
        assert_eq!(start.path, "3100");
        assert_eq!(start.level, 4);
        assert_eq!(start.west, -90.0);
        assert_eq!(start.south, 0.0);
        assert_eq!(start.north, 22.5);

        let start = PolygonPass::new(&grid, bounds, level, true).smallest_encompassing_node();
        assert_eq!(start.path, "3100");
        assert!(start.north < MAX_MERCATOR_LATITUDE);

        // A box touching the equator stays at the root
        let polygon = level_polygon(&KNOWN_POLYGON, level, -90.0, 0.0, 0.0);
        let mut grid = Grid::new(-180.0, -90.0);
        grid.add_polygon(&polygon).unwrap();
        let bounds = grid.bounding_box().unwrap();
        let start = PolygonPass::new(&grid, bounds, level, false).smallest_encompassing_node();
        assert_eq!(start.path, "");
        assert_eq!(start.level, 0);
    }

    #[test]
    fn test_invalid_input() {
        let mut grid = Grid::new(-180.0, -90.0);
        let bad = Polygon::from_lon_lat([(f64::NAN, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            grid.add_polygon(&bad),
            Err(CoverageError::InvalidGeometry(_))
        ));
        assert_eq!(grid.polygon_count(), 0);

        let polygon = level_polygon(&KNOWN_POLYGON, 6, -90.0, 0.0, 0.0);
        grid.add_polygon(&polygon).unwrap();
        let mut out: Vec<String> = Vec::new();
        assert!(matches!(
            grid.calculate_quadtree_nodes(0, false, &mut out),
            Err(CoverageError::InvalidLevel(0))
        ));
        assert!(matches!(
            grid.calculate_quadtree_nodes(MAX_LEVEL + 1, false, &mut out),
            Err(CoverageError::InvalidLevel(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_tiny_ring_is_skipped() {
        let mut grid = Grid::new(-180.0, -90.0);
        grid.add_polygon(&Polygon::from_lon_lat([(10.0, 10.0)])).unwrap();
        assert_eq!(grid.quadtree_nodes_for_polygon(0, 8, false).unwrap(), Vec::<String>::new());
        assert!(grid.quadtree_nodes_for_polygon(1, 8, false).is_err());
    }

    #[test]
    fn test_convert_to_local() {
        let grid = Grid::new(0.0, -90.0);
        let local = grid.convert_to_local(Coord { x: -10.0, y: 95.0 });
        assert_eq!(local, Coord { x: 350.0, y: -85.0 });

        let local = grid.convert_to_local(Coord { x: 3600.0 + 15.0, y: 0.0 });
        assert!((local.x - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_corrected() {
        let grid = Grid::new(0.0, -90.0);
        assert_eq!(grid.wrap_corrected("0123".to_string()), "1123");
        assert_eq!(grid.wrap_corrected("1".to_string()), "0");
        assert_eq!(grid.wrap_corrected("2301".to_string()), "3301");
        assert_eq!(grid.wrap_corrected("3".to_string()), "2");
        assert_eq!(grid.wrap_corrected(String::new()), "");

        let grid = Grid::new(-180.0, -90.0);
        assert_eq!(grid.wrap_corrected("0123".to_string()), "0123");
    }
}
