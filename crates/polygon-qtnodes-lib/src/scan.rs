//! Column crossing scan of a polygon perimeter
//!
//! Quadtree nodes at the max level are treated as pixels. The perimeter is
//! walked edge by edge with a simple line drawing, and every time the walk
//! leaves a column the row at which it left is recorded as a crossing of that
//! column. Near-vertical runs inside one column are kept as spans and folded
//! into the crossings once the walk is done, after which each column holds
//! sorted `[enter, exit]` row pairs.
//!
//! The state lives for one polygon only and is dropped afterwards.

use crate::{CoverageError, Result};
use smallvec::SmallVec;

/// Inclusive vertical run of rows within one column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: i32,
    pub end: i32,
}

impl Span {
    fn new(row0: i32, row1: i32) -> Self {
        if row0 < row1 {
            Self {
                start: row0,
                end: row1,
            }
        } else {
            Self {
                start: row1,
                end: row0,
            }
        }
    }

    /// Grow this span by an overlapping or adjacent one
    fn extend_with(&mut self, span: Span) {
        if span.start < self.start && span.end >= self.start - 1 {
            self.start = span.start;
        }
        if span.start <= self.end + 1 && span.end > self.end {
            self.end = span.end;
        }
    }
}

type Crossings = SmallVec<[i32; 4]>;

/// Per-polygon scan state
///
/// Columns are indexed from the west edge of the polygon's snapped bounding
/// box. One padding column is kept on each side so that vertices rounding just
/// outside the box still land in a slot.
#[derive(Debug)]
pub(crate) struct ScanState {
    col_crossings: Vec<Crossings>,
    col_spans: Vec<Vec<Span>>,

    current_col: i32,
    current_row: i32,
    last_col: i32,
    last_row: i32,

    /// Direction of the last column change (-1, 0 or 1)
    last_dx: i32,
    /// Direction of the first column change of the ring
    first_dx: i32,
    /// Column the ring first moved away from
    first_col: Option<i32>,

    col_change: bool,
    last_polygon_point: bool,
}

impl ScanState {
    pub fn new(columns: usize) -> Self {
        Self {
            col_crossings: vec![Crossings::new(); columns + 2],
            col_spans: vec![Vec::new(); columns + 2],
            current_col: 0,
            current_row: 0,
            last_col: 0,
            last_row: 0,
            last_dx: 0,
            first_dx: 0,
            first_col: None,
            col_change: true,
            last_polygon_point: false,
        }
    }

    /// Storage slot of a column, clamped to the padded range
    #[inline]
    fn slot(&self, col: i32) -> usize {
        let max = self.col_crossings.len() as i64 - 1;
        (col as i64 + 1).clamp(0, max) as usize
    }

    /// Number of logical columns
    #[inline]
    pub fn columns(&self) -> usize {
        self.col_crossings.len() - 2
    }

    /// Sorted crossing rows of a column, empty outside the scanned range
    pub fn crossings(&self, col: i32) -> &[i32] {
        let slot = col as i64 + 1;
        if slot < 0 || slot >= self.col_crossings.len() as i64 {
            return &[];
        }
        &self.col_crossings[slot as usize]
    }

    #[cfg(test)]
    pub fn spans(&self, col: i32) -> &[Span] {
        let slot = self.slot(col);
        &self.col_spans[slot]
    }

    /// Whether `row` lies within one of the crossing pairs of `col`
    pub fn is_covered(&self, col: i32, row: i32) -> bool {
        self.crossings(col)
            .chunks_exact(2)
            .any(|pair| pair[0] <= row && row <= pair[1])
    }

    /// Walk a closed ring given in max-level `(col, row)` pixels
    ///
    /// Expects at least two points, the last repeating the first.
    pub fn scan_ring(&mut self, points: &[(i32, i32)]) {
        let Some((&(col, row), rest)) = points.split_first() else {
            return;
        };
        self.start_polygon(col, row);

        let Some((&(last_col, last_row), middle)) = rest.split_last() else {
            self.end_polygon();
            return;
        };

        self.last_polygon_point = false;
        for &(col, row) in middle {
            self.next_polygon_edge(col, row);
        }

        self.last_polygon_point = true;
        self.next_polygon_edge(last_col, last_row);

        self.end_polygon();
    }

    fn start_polygon(&mut self, start_col: i32, start_row: i32) {
        self.first_dx = 0;
        self.last_dx = 0;
        self.first_col = None;

        self.current_row = start_row;
        self.current_col = start_col;
        self.last_col = start_col;
        self.last_row = start_row;

        self.col_change = true;
    }

    /// Draw the edge from the current pixel to `(dest_col, dest_row)`
    ///
    /// Drawing happens between pixels, not absolute coordinates, so
    /// intermediate rows may differ by at most one pixel from the exact edge.
    fn next_polygon_edge(&mut self, dest_col: i32, dest_row: i32) {
        let dx = f64::from(dest_col - self.current_col);
        let dy = f64::from(dest_row - self.current_row);
        let mut step = 1;

        let mut x = f64::from(self.current_col);
        let mut y = f64::from(self.current_row);

        if dx == 0.0 {
            // Vertical
            self.add_col_crossing(self.current_col, self.current_row);
            self.add_span(dest_col, self.current_row, dest_row);
            self.current_row = dest_row;
        } else if dy == 0.0 {
            // Horizontal
            if dest_col < self.current_col {
                step = -1;
            }

            loop {
                self.add_col_crossing(self.current_col, self.current_row);
                if self.current_col == dest_col {
                    break;
                }

                self.current_col += step;
                self.col_change = true;
            }
        } else if dx.abs() > dy.abs() {
            // Shallow
            let mut m = dy / dx;
            if dest_col < self.current_col {
                m = -m;
                step = -1;
            }

            loop {
                self.add_col_crossing(self.current_col, self.current_row);
                if self.current_col == dest_col {
                    break;
                }

                self.current_col += step;
                y += m;
                self.current_row = y.round() as i32;
            }
        } else {
            // Steep
            self.col_change = true;
            let mut m = dx / dy;
            if dest_row < self.current_row {
                m = -m;
                step = -1;
            }

            let mut last_row0 = self.current_row;
            let mut last_col0 = self.current_col;
            loop {
                self.add_col_crossing(self.current_col, self.current_row);
                if self.current_row == dest_row {
                    break;
                }

                self.current_row += step;
                x += m;
                self.current_col = x.round() as i32;
                if self.current_col != last_col0 {
                    // A single row is not a span
                    if last_row0 != self.current_row - step {
                        self.add_span(last_col0, self.current_row - step, last_row0);
                    }

                    last_row0 = self.current_row;
                    last_col0 = self.current_col;
                    self.col_change = true;
                }
            }

            self.add_span(last_col0, self.current_row, last_row0);
        }
    }

    /// Close the ring; the final pixel pairs up with the first edge's direction
    fn end_polygon(&mut self) {
        self.add_col_crossing(self.current_col, self.current_row);
        let slot = self.slot(self.current_col);
        if self.first_dx == 0 {
            self.col_crossings[slot].push(self.last_row);
            self.col_crossings[slot].push(self.current_row);
        } else if self.last_dx != self.first_dx {
            self.col_crossings[slot].push(self.current_row);
        }
    }

    /// Record a crossing in the previous column when the walk changes column
    fn add_col_crossing(&mut self, col: i32, row: i32) {
        if self.last_col != col {
            let dx = col - self.last_col;
            let slot = self.slot(self.last_col);

            if self.last_dx == dx || self.last_dx == 0 {
                self.col_crossings[slot].push(self.last_row);

                if self.last_dx == 0 {
                    self.first_dx = dx;
                    self.first_col = Some(self.last_col);
                }
            } else {
                // Local min or max: enter the row twice to form a span
                self.col_crossings[slot].push(self.last_row);
                self.col_crossings[slot].push(self.last_row);
            }

            // A crossing just off the end of the latest span extends it
            if let Some(span) = self.col_spans[slot].last_mut() {
                if span.start - 1 == self.last_row {
                    span.start = self.last_row;
                } else if span.end + 1 == self.last_row {
                    span.end = self.last_row;
                }
            }

            self.last_dx = dx;
        }

        self.last_col = col;
        self.last_row = row;
    }

    /// Record the vertical run `row0..=row1` in `col`
    ///
    /// Continuing runs extend the latest span. On the closing edge a run may
    /// instead join the very first span of the ring.
    fn add_span(&mut self, col: i32, row0: i32, row1: i32) {
        let span = Span::new(row0, row1);
        let slot = self.slot(col);
        let spans = &mut self.col_spans[slot];

        if !self.col_change && !spans.is_empty() {
            if let Some(last) = spans.last_mut() {
                last.extend_with(span);
            }
        } else if self.last_polygon_point
            && self.first_col == Some(col)
            && spans
                .first()
                .is_some_and(|first| first.start - 1 <= span.end && first.end + 1 >= span.start)
        {
            spans[0].extend_with(span);
        } else {
            spans.push(span);
        }

        self.col_change = false;
    }

    /// Sort each column and fold the vertical spans into the crossing pairs
    ///
    /// A column with an odd number of crossings means the ring is open or
    /// self-intersecting; that is reported as an error and nothing is repaired.
    pub fn finish(&mut self) -> Result<()> {
        for crossings in &mut self.col_crossings {
            crossings.sort_unstable();
        }

        for slot in 0..self.col_crossings.len() {
            let crossings = &mut self.col_crossings[slot];
            if crossings.len() % 2 == 1 {
                return Err(CoverageError::OddColumnCrossings {
                    column: slot as i64 - 1,
                    count: crossings.len(),
                });
            }

            let spans = &self.col_spans[slot];
            for j in 0..crossings.len() {
                let mut crossing = crossings[j];
                for span in spans {
                    if crossing < span.start - 1 || crossing > span.end + 1 {
                        continue;
                    }

                    if j % 2 == 1 {
                        // Paired with the crossing before it: use the span end
                        if crossings[j] < span.end {
                            crossings[j] = span.end;
                        }
                        if crossings[j - 1] > span.start {
                            crossings[j - 1] = span.start;
                        }
                    } else {
                        // Paired with the crossing after it: use the span start
                        if crossings[j] > span.start {
                            crossings[j] = span.start;
                        }
                        if crossings[j + 1] < span.end {
                            crossings[j + 1] = span.end;
                        }
                    }

                    crossing = crossings[j];
                }
            }
        }

        for spans in &mut self.col_spans {
            spans.clear();
        }

        tracing::trace!(columns = self.columns(), "column crossings: {:?}", self.col_crossings);
        Ok(())
    }
}
