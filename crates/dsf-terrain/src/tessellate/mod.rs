//! Polygon-against-mesh tessellation.
//!
//! A [`Tessellator`] owns its contour buffer and combine callback, so
//! separate tessellators never share state. Contours are accumulated, then
//! [`Tessellator::tessellate`] triangulates the polygon, clips each of its
//! triangles against every mesh triangle it overlaps and resolves the
//! heights and texture coordinates that are still pending. Both sides of
//! every clip are convex, so the pieces cover exactly the polygon.

pub mod clip;
pub mod combine;
pub mod triangulate;
pub mod vertex;

use glam::{DVec2, DVec3};

use crate::diagnostic::{Degenerate, Diagnostic};
use crate::index::{ElevationIndex, TriangleRecord};
use clip::{clip_ring, dedup_ring, signed_area};
use combine::{CombineFn, CombineInput, combine_rule};
use triangulate::{bridge_hole, ear_clip};
use vertex::{DrapedVertex, Height, TessVertex, TexCoord};

/// Smallest contour or triangle area kept, in square metres.
const MIN_AREA: f64 = 1e-9;

/// Where the texture coordinates of mesh-derived vertices come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UvSource {
    /// A planar projection.
    Projection(UvProjection),
    /// Interpolated from the polygon nodes' own coordinates.
    PerNode,
    /// One coordinate for everything.
    Constant(DVec2),
}

/// Planar texture projection in local metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvProjection {
    /// Local `(x, z)` where the texture origin sits.
    pub origin: DVec2,
    /// Degrees clockwise from north along which `v` increases.
    pub heading: f64,
    /// Metres per texture repeat, across (`u`) and along (`v`).
    pub scale: DVec2,
}

impl UvProjection {
    #[must_use]
    pub fn project(&self, p: DVec2) -> DVec2 {
        let h = self.heading.to_radians();
        let along = DVec2::new(h.sin(), -h.cos());
        let across = DVec2::new(h.cos(), h.sin());
        let d = p - self.origin;
        DVec2::new(d.dot(across) / self.scale.x, d.dot(along) / self.scale.y)
    }
}

/// Whether a triangle's heights came from the terrain mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightState {
    Draped,
    /// No mesh triangle covered this part; heights are sea level.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrapedTriangle {
    pub vertices: [DrapedVertex; 3],
    pub height: HeightState,
}

/// Output of one tessellation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrapeResult {
    pub triangles: Vec<DrapedTriangle>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DrapeResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn extend(&mut self, other: DrapeResult) {
        self.triangles.extend(other.triangles);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn vertices(&self) -> impl Iterator<Item = &DrapedVertex> {
        self.triangles.iter().flat_map(|t| t.vertices.iter())
    }
}

/// Tessellator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Accumulating,
    Resolved,
}

/// Mesh triangles found by one box query, kept for reuse.
#[derive(Debug, Clone, Default)]
struct Candidates {
    min: DVec2,
    max: DVec2,
    ids: Vec<usize>,
}

impl Candidates {
    fn covers(&self, min: DVec2, max: DVec2) -> bool {
        self.min.cmple(min).all() && max.cmple(self.max).all()
    }
}

/// Tessellation context for one polygon, or one run of polygons.
pub struct Tessellator<'a> {
    index: &'a ElevationIndex,
    uv_source: UvSource,
    combine: CombineFn,
    phase: Phase,
    contours: Vec<Vec<TessVertex>>,
    current: Vec<TessVertex>,
    diagnostics: Vec<Diagnostic>,
    candidates: Option<Candidates>,
}

impl std::fmt::Debug for Tessellator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tessellator")
            .field("uv_source", &self.uv_source)
            .field("phase", &self.phase)
            .field("contours", &self.contours.len())
            .field("candidates", &self.candidates.as_ref().map(|c| c.ids.len()))
            .finish_non_exhaustive()
    }
}

impl<'a> Tessellator<'a> {
    #[must_use]
    pub fn new(index: &'a ElevationIndex, uv_source: UvSource) -> Self {
        Self {
            index,
            uv_source,
            combine: Box::new(combine_rule),
            phase: Phase::Idle,
            contours: Vec::new(),
            current: Vec::new(),
            diagnostics: Vec::new(),
            candidates: None,
        }
    }

    /// Runs one box query over `min..=max` up front. Every later
    /// tessellation whose polygon lies inside that box reuses the result
    /// instead of querying the index again.
    #[must_use]
    pub fn with_query_bounds(mut self, min: DVec2, max: DVec2) -> Self {
        let ids = self.index.box_query(min, max);
        self.candidates = Some(Candidates { min, max, ids });
        self
    }

    /// Replaces the combine callback.
    #[must_use]
    pub fn with_combine<F>(mut self, combine: F) -> Self
    where
        F: FnMut(&CombineInput, &mut Vec<Diagnostic>) -> TessVertex + Send + 'static,
    {
        self.combine = Box::new(combine);
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn begin_contour(&mut self) {
        self.end_contour();
        self.phase = Phase::Accumulating;
    }

    /// Adds a polygon node. With [`UvSource::PerNode`], `uv` should be set;
    /// other sources compute it.
    pub fn add_vertex(&mut self, position: DVec2, uv: Option<DVec2>) {
        if self.phase != Phase::Accumulating {
            self.begin_contour();
        }
        let uv = match (self.uv_source, uv) {
            (UvSource::Projection(p), _) => TexCoord::Known(p.project(position)),
            (UvSource::Constant(c), _) => TexCoord::Known(c),
            (UvSource::PerNode, Some(uv)) => TexCoord::Known(uv),
            (UvSource::PerNode, None) => TexCoord::FromPolygon,
        };
        self.current.push(TessVertex::polygon(position, uv));
    }

    pub fn end_contour(&mut self) {
        if !self.current.is_empty() {
            self.contours.push(std::mem::take(&mut self.current));
        }
    }

    /// Adds a whole contour. The first contour is the outer ring, the rest
    /// are holes; winding is normalized.
    #[must_use]
    pub fn contour<I>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = (DVec2, Option<DVec2>)>,
    {
        self.begin_contour();
        for (p, uv) in points {
            self.add_vertex(p, uv);
        }
        self.end_contour();
        self
    }

    fn degenerate(&mut self, kind: Degenerate) {
        Diagnostic::DegenerateGeometry(kind).raise(&mut self.diagnostics);
    }

    /// Cleans the contours into one counter-clockwise ring with its holes
    /// bridged in.
    fn prepare(&mut self) -> Option<Vec<TessVertex>> {
        let mut contours = std::mem::take(&mut self.contours).into_iter();
        let mut outer = contours.next()?;
        dedup_ring(&mut outer);
        if outer.len() < 3 {
            self.degenerate(Degenerate::ShortContour);
            return None;
        }
        let area = signed_area(&outer);
        if area.abs() <= MIN_AREA {
            self.degenerate(Degenerate::ZeroAreaContour);
            return None;
        }
        if area < 0.0 {
            outer.reverse();
        }

        let mut holes: Vec<Vec<TessVertex>> = Vec::new();
        for mut hole in contours {
            dedup_ring(&mut hole);
            let area = signed_area(&hole);
            if hole.len() < 3 || area.abs() <= MIN_AREA {
                self.degenerate(Degenerate::ZeroAreaContour);
                continue;
            }
            if area > 0.0 {
                hole.reverse();
            }
            holes.push(hole);
        }
        holes.sort_by(|a, b| leftmost(a).total_cmp(&leftmost(b)));
        for hole in holes {
            if !bridge_hole(&mut outer, &hole) {
                self.degenerate(Degenerate::ZeroAreaContour);
            }
        }
        Some(outer)
    }

    /// Runs the tessellation. Calling it again without new contours yields
    /// an empty result; adding contours first starts the next polygon.
    pub fn tessellate(&mut self) -> DrapeResult {
        self.end_contour();
        let ring = self.prepare();
        self.phase = Phase::Resolved;
        let mut triangles = Vec::new();
        if let Some(ring) = ring {
            self.drape_ring(&ring, &mut triangles);
        }
        let diagnostics = std::mem::take(&mut self.diagnostics);
        tracing::debug!(
            triangles = triangles.len(),
            diagnostics = diagnostics.len(),
            "tessellated polygon"
        );
        DrapeResult {
            triangles,
            diagnostics,
        }
    }

    fn drape_ring(&mut self, ring: &[TessVertex], out: &mut Vec<DrapedTriangle>) {
        let polygon = ear_clip(ring, &mut self.diagnostics);
        let resolver = UvResolver::new(self.uv_source, &polygon);

        let (min, max) = bounds(ring.iter().map(|v| v.position));
        let cached = self.candidates.take();
        let queried;
        let candidates = match &cached {
            Some(c) if c.covers(min, max) => c.ids.as_slice(),
            _ => {
                queried = self.index.box_query(min, max);
                queried.as_slice()
            }
        };

        let index = self.index;
        let mut covered = false;
        for tri in &polygon {
            let (lo, hi) = bounds(tri.iter().map(|v| v.position));
            for &id in candidates {
                let Some(record) = index.triangle(id) else {
                    continue;
                };
                let (rlo, rhi) = record.bounds();
                if rlo.cmpgt(hi).any() || rhi.cmplt(lo).any() {
                    continue;
                }
                let mut corners = record.corners().map(TessVertex::mesh);
                if record.signed_area2() < 0.0 {
                    corners.swap(1, 2);
                }
                let piece = clip_ring(tri, &corners, &mut self.combine, &mut self.diagnostics);
                if piece.len() < 3 || signed_area(&piece).abs() <= MIN_AREA {
                    continue;
                }
                covered = true;
                for t in ear_clip(&piece, &mut self.diagnostics) {
                    let vertices = t.map(|v| resolve(v, Some(record), &resolver));
                    self.emit(vertices, HeightState::Draped, out);
                }
            }
        }
        self.candidates = cached;

        if !covered {
            tracing::debug!("polygon lies off the mesh, heights unresolved");
            for tri in &polygon {
                let vertices = tri.map(|v| resolve(v, None, &resolver));
                self.emit(vertices, HeightState::Unresolved, out);
            }
        }
    }

    fn emit(&mut self, vertices: [DrapedVertex; 3], height: HeightState, out: &mut Vec<DrapedTriangle>) {
        let [a, b, c] = vertices.map(|v| DVec2::new(v.position.x, v.position.z));
        if (b - a).perp_dot(c - a).abs() * 0.5 <= MIN_AREA {
            self.degenerate(Degenerate::ZeroAreaTriangle);
            return;
        }
        out.push(DrapedTriangle { vertices, height });
    }
}

fn bounds(points: impl Iterator<Item = DVec2>) -> (DVec2, DVec2) {
    points.fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(p), hi.max(p)),
    )
}

fn leftmost(ring: &[TessVertex]) -> f64 {
    ring.iter().map(|v| v.position.x).fold(f64::INFINITY, f64::min)
}

fn resolve(v: TessVertex, mesh: Option<&TriangleRecord>, uv: &UvResolver) -> DrapedVertex {
    let height = match (v.height, mesh) {
        (Height::Known(h), _) => h,
        (Height::FromMesh, Some(t)) => t.height_at(v.position),
        (Height::FromMesh, None) => 0.0,
    };
    let uv = match v.uv {
        TexCoord::Known(uv) => uv,
        TexCoord::FromPolygon => uv.resolve(v.position),
    };
    DrapedVertex {
        position: DVec3::new(v.position.x, height, v.position.y),
        uv,
    }
}

/// Supplies texture coordinates for positions that only the polygon knows.
enum UvResolver {
    Projection(UvProjection),
    Constant(DVec2),
    /// The polygon's own triangulation with node coordinates.
    Nodes(Vec<[(DVec2, DVec2); 3]>),
}

impl UvResolver {
    fn new(source: UvSource, polygon: &[[TessVertex; 3]]) -> Self {
        match source {
            UvSource::Projection(p) => Self::Projection(p),
            UvSource::Constant(c) => Self::Constant(c),
            UvSource::PerNode => {
                let node = |v: &TessVertex| (v.position, v.uv.known().unwrap_or(DVec2::ZERO));
                Self::Nodes(polygon.iter().map(|t| t.map(|v| node(&v))).collect())
            }
        }
    }

    fn resolve(&self, p: DVec2) -> DVec2 {
        match self {
            Self::Projection(proj) => proj.project(p),
            Self::Constant(c) => *c,
            Self::Nodes(tris) => {
                // Containing triangle, else the one whose weights are least negative.
                let mut best: Option<(f64, DVec2)> = None;
                for t in tris {
                    let Some(w) = weights(p, t[0].0, t[1].0, t[2].0) else {
                        continue;
                    };
                    let worst = w.min_element();
                    if best.is_none_or(|(b, _)| worst > b) {
                        best = Some((worst, t[0].1 * w.x + t[1].1 * w.y + t[2].1 * w.z));
                    }
                }
                best.map_or(DVec2::ZERO, |(_, uv)| uv)
            }
        }
    }
}

/// Barycentric weights of `p` in `(a, b, c)`.
fn weights(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> Option<DVec3> {
    let det = (b - a).perp_dot(c - a);
    if det.abs() <= f64::EPSILON {
        return None;
    }
    let wb = (p - a).perp_dot(c - a) / det;
    let wc = (b - a).perp_dot(p - a) / det;
    Some(DVec3::new(1.0 - wb - wc, wb, wc))
}
