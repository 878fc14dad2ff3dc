//! Draping entry points.
//!
//! The single-polygon variants build their own [`Tessellator`] and differ
//! only in where texture coordinates come from. A batch runs every polygon
//! through one tessellator and one box query.

use glam::DVec2;

use crate::index::ElevationIndex;
use crate::tessellate::{DrapeResult, Tessellator, UvProjection, UvSource};

/// Drapes one polygon with a planar texture projection. `rings` is the
/// outer ring followed by any holes, in local `(x, z)`.
#[must_use]
pub fn drape_polygon(index: &ElevationIndex, rings: &[Vec<DVec2>], projection: UvProjection) -> DrapeResult {
    rings
        .iter()
        .fold(Tessellator::new(index, UvSource::Projection(projection)), |t, ring| {
            t.contour(ring.iter().map(|&p| (p, None)))
        })
        .tessellate()
}

/// Drapes one polygon whose nodes carry their own texture coordinates, as
/// `(position, uv)` pairs.
#[must_use]
pub fn drape_polygon_with_uvs(index: &ElevationIndex, rings: &[Vec<(DVec2, DVec2)>]) -> DrapeResult {
    rings
        .iter()
        .fold(Tessellator::new(index, UvSource::PerNode), |t, ring| {
            t.contour(ring.iter().map(|&(p, uv)| (p, Some(uv))))
        })
        .tessellate()
}

/// Drapes many polygons that share one texture coordinate, such as every
/// runway of one surface type. The mesh is queried once for the whole
/// batch. Polygons no mesh triangle covers come back marked
/// [`HeightState::Unresolved`](crate::HeightState::Unresolved).
#[must_use]
pub fn drape_batch(index: &ElevationIndex, polygons: &[Vec<Vec<DVec2>>], uv: DVec2) -> DrapeResult {
    let (min, max) = polygons.iter().flatten().flatten().fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );
    let mut tessellator = Tessellator::new(index, UvSource::Constant(uv)).with_query_bounds(min, max);
    let mut result = DrapeResult::default();
    for rings in polygons {
        for ring in rings {
            tessellator.begin_contour();
            for &p in ring {
                tessellator.add_vertex(p, None);
            }
        }
        result.extend(tessellator.tessellate());
    }
    tracing::debug!(
        polygons = polygons.len(),
        triangles = result.triangles.len(),
        "draped batch"
    );
    result
}
