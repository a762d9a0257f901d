//! Hexagonal binning of projected points.
//!
//! The tiling is pointy-top, anchored at the top-left corner of the extent,
//! addressed with axial coordinates `(q, r)`: `r` counts rows downwards, `q`
//! runs along a row. A point belongs to the cell whose centre is nearest.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use super::{finish, group, Bucket, Counter};
use crate::error::{Error, Result};
use crate::row::RowId;
use crate::store::{RowStore, ScreenPoints};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Axial cell address. Orders row-major: by `r`, then `q`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Axial {
    pub r: i64,
    pub q: i64,
}

impl Axial {
    pub fn new(q: i64, r: i64) -> Self {
        Self { r, q }
    }

    pub fn neighbours(self) -> [Axial; 6] {
        let Axial { q, r } = self;
        [
            Axial::new(q + 1, r),
            Axial::new(q - 1, r),
            Axial::new(q, r + 1),
            Axial::new(q, r - 1),
            Axial::new(q + 1, r - 1),
            Axial::new(q - 1, r + 1),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HexGrid {
    radius: f64,
    extent: [[f64; 2]; 2],
}

impl HexGrid {
    pub fn new(radius: f64, extent: [[f64; 2]; 2]) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::Config(format!("hex radius must be positive, got {radius}")));
        }
        Ok(Self { radius, extent })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn extent(&self) -> [[f64; 2]; 2] {
        self.extent
    }

    /// Cell whose centre is nearest to `point`.
    pub fn cell(&self, [x, y]: [f64; 2]) -> Axial {
        let [x0, y0] = self.extent[0];
        let (x, y) = (x - x0, y - y0);
        let q = (SQRT_3 / 3.0 * x - y / 3.0) / self.radius;
        let r = (2.0 / 3.0 * y) / self.radius;
        cube_round(q, r)
    }

    pub fn center(&self, cell: Axial) -> [f64; 2] {
        let [x0, y0] = self.extent[0];
        let (q, r) = (cell.q as f64, cell.r as f64);
        [
            x0 + self.radius * SQRT_3 * (q + r / 2.0),
            y0 + self.radius * 1.5 * r,
        ]
    }

    /// Corner points of a cell, clockwise from the top.
    pub fn corners(&self, cell: Axial) -> [[f64; 2]; 6] {
        let [cx, cy] = self.center(cell);
        std::array::from_fn(|i| {
            let angle = i as f64 * PI / 3.0;
            [cx + self.radius * angle.sin(), cy - self.radius * angle.cos()]
        })
    }

    /// Every cell whose centre lies within the extent grown by one cell.
    pub fn cells(&self) -> Vec<Axial> {
        let [[x0, y0], [x1, y1]] = self.extent;
        let dx = self.radius * SQRT_3;
        let dy = self.radius * 1.5;
        let rows = ((y1 - y0 + self.radius) / dy).ceil().max(0.0) as i64;
        let cols = ((x1 - x0 + dx / 2.0) / dx).ceil().max(0.0) as i64;
        let mut cells = Vec::with_capacity((rows * cols).max(0) as usize);
        for row in 0..rows {
            for col in 0..cols {
                // Odd rows sit half a cell to the right.
                cells.push(Axial::new(col - (row - (row & 1)) / 2, row));
            }
        }
        cells
    }
}

fn cube_round(q: f64, r: f64) -> Axial {
    let s = -q - r;
    let (mut rq, mut rr, rs) = (q.round(), r.round(), s.round());
    let (dq, dr, ds) = ((rq - q).abs(), (rr - r).abs(), (rs - s).abs());
    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    Axial::new(rq as i64, rr as i64)
}

pub type HexBucket = Bucket<Axial>;

/// The non-empty cells of one binning pass.
#[derive(Clone, Debug, PartialEq)]
pub struct HexBins {
    pub grid: HexGrid,
    pub buckets: Vec<HexBucket>,
    /// Largest bucket value; 0 when there are no buckets.
    pub max: u64,
}

impl HexBins {
    pub fn empty(grid: HexGrid) -> Self {
        Self {
            grid,
            buckets: Vec::new(),
            max: 0,
        }
    }

    pub fn center(&self, bucket: &HexBucket) -> [f64; 2] {
        self.grid.center(bucket.key)
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|bucket| bucket.value).sum()
    }
}

/// Bin every filtered row that has a screen point. Rows without one are
/// skipped.
pub fn aggregate_hexbins(
    store: &RowStore,
    points: &ScreenPoints,
    filtered: &[RowId],
    counter: Counter,
    grid: HexGrid,
) -> Result<HexBins> {
    let _span = debug_span!("aggregate_hexbins", rows = filtered.len()).entered();
    counter.check(store.schema())?;
    points.check(store)?;

    let groups = group(filtered, |id| points.get(id).map(|point| grid.cell(*point)));
    let buckets = finish(store, groups, counter);
    let max = buckets.iter().map(|bucket| bucket.value).max().unwrap_or(0);
    Ok(HexBins { grid, buckets, max })
}
