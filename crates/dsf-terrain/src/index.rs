//! Grid-bucketed triangle index for height queries.
//!
//! Triangles are stored with their barycentric basis precomputed in the
//! horizontal plane. A fixed `N x N` grid over the tile window lists, per
//! cell, every triangle whose bounding box touches that cell, so a point
//! lookup only tests the handful of triangles in one cell.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{DVec2, DVec3, Vec3Swizzles};
use serde::{Deserialize, Serialize};

use crate::tile::{ONE_DEGREE, Tile};

const NO_HIT: usize = usize::MAX;

/// Grid resolution and extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Cells per side.
    pub divisions: usize,
    /// Half the side of the square window, in metres from the tile centre.
    pub half_extent: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            divisions: 256,
            half_extent: ONE_DEGREE / 2.0,
        }
    }
}

/// A mesh triangle in local `(x, height, z)` with its cached 2D basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleRecord {
    pub p1: DVec3,
    pub p2: DVec3,
    pub p3: DVec3,
    v0: DVec2,
    v1: DVec2,
    dot00: f64,
    dot01: f64,
    dot11: f64,
    inv_denom: f64,
}

impl TriangleRecord {
    /// Returns `None` when the horizontal projection has zero area.
    #[must_use]
    pub fn new(p1: DVec3, p2: DVec3, p3: DVec3) -> Option<Self> {
        let base = p1.xz();
        let v0 = p3.xz() - base;
        let v1 = p2.xz() - base;
        let dot00 = v0.dot(v0);
        let dot01 = v0.dot(v1);
        let dot11 = v1.dot(v1);
        let denom = dot00 * dot11 - dot01 * dot01;
        if denom == 0.0 {
            return None;
        }
        Some(Self {
            p1,
            p2,
            p3,
            v0,
            v1,
            dot00,
            dot01,
            dot11,
            inv_denom: 1.0 / denom,
        })
    }

    #[must_use]
    pub fn corners(&self) -> [DVec3; 3] {
        [self.p1, self.p2, self.p3]
    }

    /// `(u, v)` weights of `p3` and `p2` relative to `p1`.
    #[must_use]
    pub fn barycentric(&self, p: DVec2) -> DVec2 {
        let v2 = p - self.p1.xz();
        let dot02 = self.v0.dot(v2);
        let dot12 = self.v1.dot(v2);
        DVec2::new(
            (self.dot11 * dot02 - self.dot01 * dot12) * self.inv_denom,
            (self.dot00 * dot12 - self.dot01 * dot02) * self.inv_denom,
        )
    }

    #[must_use]
    pub fn contains(&self, p: DVec2) -> bool {
        let uv = self.barycentric(p);
        uv.x >= 0.0 && uv.y >= 0.0 && uv.x + uv.y <= 1.0
    }

    /// Height of the triangle's plane above `p`; extrapolates outside.
    #[must_use]
    pub fn height_at(&self, p: DVec2) -> f64 {
        let uv = self.barycentric(p);
        self.p1.y + uv.x * (self.p3.y - self.p1.y) + uv.y * (self.p2.y - self.p1.y)
    }

    /// Horizontal bounding box as `(min, max)`.
    #[must_use]
    pub fn bounds(&self) -> (DVec2, DVec2) {
        let (a, b, c) = (self.p1.xz(), self.p2.xz(), self.p3.xz());
        (a.min(b).min(c), a.max(b).max(c))
    }

    /// Twice the signed horizontal area; positive when `p1, p2, p3` turn
    /// counter-clockwise in `(x, z)`.
    #[must_use]
    pub fn signed_area2(&self) -> f64 {
        self.v1.perp_dot(self.v0)
    }
}

/// The per-tile spatial index. Immutable once built; safe to share.
#[derive(Debug)]
pub struct ElevationIndex {
    tile: Tile,
    config: IndexConfig,
    cell_size: f64,
    triangles: Vec<TriangleRecord>,
    cells: Vec<Vec<u32>>,
    last_hit: AtomicUsize,
}

impl ElevationIndex {
    /// Builds the index from a flat triangle list in local coordinates.
    /// Trailing points that do not form a whole triangle are ignored.
    #[must_use]
    pub fn build(tile: Tile, points: &[DVec3], config: IndexConfig) -> Self {
        let divisions = config.divisions.max(1);
        let config = IndexConfig { divisions, ..config };
        let cell_size = 2.0 * config.half_extent / divisions as f64;

        let triangles: Vec<TriangleRecord> = points
            .chunks_exact(3)
            .filter_map(|t| TriangleRecord::new(t[0], t[1], t[2]))
            .collect();

        let mut index = Self {
            tile,
            config,
            cell_size,
            triangles,
            cells: vec![Vec::new(); divisions * divisions],
            last_hit: AtomicUsize::new(NO_HIT),
        };

        for i in 0..index.triangles.len() {
            let (min, max) = index.triangles[i].bounds();
            let (lo, hi) = (index.grid_coord(min), index.grid_coord(max));
            for gz in lo.1..=hi.1 {
                for gx in lo.0..=hi.0 {
                    index.cells[gz * divisions + gx].push(i as u32);
                }
            }
        }

        tracing::debug!(
            %tile,
            triangles = index.triangles.len(),
            dropped = points.len() / 3 - index.triangles.len(),
            divisions,
            "built elevation index"
        );
        index
    }

    /// Sea-level stand-in: two triangles covering the whole window.
    #[must_use]
    pub fn flat(tile: Tile, config: IndexConfig) -> Self {
        let h = config.half_extent;
        let nw = DVec3::new(-h, 0.0, -h);
        let ne = DVec3::new(h, 0.0, -h);
        let se = DVec3::new(h, 0.0, h);
        let sw = DVec3::new(-h, 0.0, h);
        Self::build(tile, &[nw, sw, se, nw, se, ne], config)
    }

    #[must_use]
    pub fn tile(&self) -> Tile {
        self.tile
    }

    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[must_use]
    pub fn triangle(&self, i: usize) -> Option<&TriangleRecord> {
        self.triangles.get(i)
    }

    #[must_use]
    pub fn triangles(&self) -> &[TriangleRecord] {
        &self.triangles
    }

    /// Whether `p` lies inside the grid window (edges included).
    #[must_use]
    pub fn in_window(&self, p: DVec2) -> bool {
        let h = self.config.half_extent;
        p.x >= -h && p.x <= h && p.y >= -h && p.y <= h
    }

    /// Grid cell of a point, clamped to the grid. Points on a cell's lower
    /// edge belong to that cell.
    fn grid_coord(&self, p: DVec2) -> (usize, usize) {
        let n = self.config.divisions;
        let axis = |v: f64| {
            let g = ((v + self.config.half_extent) / self.cell_size).floor();
            if g <= 0.0 { 0 } else { (g as usize).min(n - 1) }
        };
        (axis(p.x), axis(p.y))
    }

    fn cell(&self, p: DVec2) -> &[u32] {
        let (gx, gz) = self.grid_coord(p);
        &self.cells[gz * self.config.divisions + gx]
    }

    /// Index of the triangle containing `(x, z)`, if any.
    #[must_use]
    pub fn locate(&self, x: f64, z: f64) -> Option<usize> {
        let p = DVec2::new(x, z);
        if !self.in_window(p) {
            return None;
        }
        let cached = self.last_hit.load(Ordering::Relaxed);
        if self.triangles.get(cached).is_some_and(|t| t.contains(p)) {
            return Some(cached);
        }
        let hit = self
            .cell(p)
            .iter()
            .map(|&i| i as usize)
            .find(|&i| self.triangles[i].contains(p))?;
        self.last_hit.store(hit, Ordering::Relaxed);
        Some(hit)
    }

    /// Terrain height at `(x, z)`; 0 outside the window or over a hole.
    #[must_use]
    pub fn height(&self, x: f64, z: f64) -> f64 {
        self.locate(x, z)
            .map_or(0.0, |i| self.triangles[i].height_at(DVec2::new(x, z)))
    }

    /// Heights for many points, testing `subset` (typically from
    /// [`box_query`](Self::box_query)) before falling back to the grid.
    #[must_use]
    pub fn heights(&self, points: &[DVec2], subset: &[usize]) -> Vec<f64> {
        let mut last: Option<usize> = None;
        points
            .iter()
            .map(|&p| {
                let hit = last
                    .filter(|&i| self.triangles[i].contains(p))
                    .or_else(|| {
                        subset
                            .iter()
                            .copied()
                            .filter(|&i| i < self.triangles.len())
                            .find(|&i| self.triangles[i].contains(p))
                    });
                match hit {
                    Some(i) => {
                        last = Some(i);
                        self.triangles[i].height_at(p)
                    }
                    None => self.height(p.x, p.y),
                }
            })
            .collect()
    }

    /// Sorted, de-duplicated indices of triangles in every cell the box
    /// touches. Empty when the box lies wholly outside the window.
    #[must_use]
    pub fn box_query(&self, min: DVec2, max: DVec2) -> Vec<usize> {
        let h = self.config.half_extent;
        if max.x < -h || max.y < -h || min.x > h || min.y > h || min.x > max.x || min.y > max.y {
            return Vec::new();
        }
        let (lo, hi) = (self.grid_coord(min), self.grid_coord(max));
        let n = self.config.divisions;
        let mut out: Vec<usize> = (lo.1..=hi.1)
            .flat_map(|gz| (lo.0..=hi.0).map(move |gx| gz * n + gx))
            .flat_map(|c| self.cells[c].iter().map(|&i| i as usize))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
