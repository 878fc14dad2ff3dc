//! Synthesizing vertices where edges cross.

use glam::DVec2;

use super::vertex::{Height, Origin, TessVertex, TexCoord};
use crate::diagnostic::{Attribute, Diagnostic};

/// Distance in metres below which two positions are the same vertex.
pub const COINCIDENT: f64 = 1e-6;

/// Inputs to a combine: the two endpoints of each crossing edge and
/// their weights. Entries 0 and 1 are one edge, 2 and 3 the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombineInput {
    pub position: DVec2,
    pub vertices: [TessVertex; 4],
    pub weights: [f64; 4],
}

/// Boxed combine callback owned by a tessellator.
pub type CombineFn = Box<dyn FnMut(&CombineInput, &mut Vec<Diagnostic>) -> TessVertex + Send>;

fn edge_weights(w0: f64, w1: f64) -> (f64, f64) {
    let sum = w0 + w1;
    if sum > 0.0 { (w0 / sum, w1 / sum) } else { (0.5, 0.5) }
}

/// Interpolates an attribute along whichever edge has it known at both
/// ends. `Ok(None)` means no input knows the attribute at all.
fn interpolate<T, F>(input: &CombineInput, get: F) -> Result<Option<T>, T>
where
    T: Copy + std::ops::Mul<f64, Output = T> + std::ops::Add<Output = T>,
    F: Fn(&TessVertex) -> Option<T>,
{
    for (a, b) in [(0, 1), (2, 3)] {
        if let (Some(x), Some(y)) = (get(&input.vertices[a]), get(&input.vertices[b])) {
            let (wa, wb) = edge_weights(input.weights[a], input.weights[b]);
            return Ok(Some(x * wa + y * wb));
        }
    }
    match input.vertices.iter().find_map(get) {
        Some(first) => Err(first),
        None => Ok(None),
    }
}

/// The default combine rule.
///
/// An input coincident with the new position is returned unchanged.
/// Otherwise height comes from the edge with known heights and the
/// texture coordinate from the edge with known coordinates, each weighted
/// by its own edge's two weights. When neither edge is clean the first
/// known candidate is used and an ambiguity is raised; when nothing is
/// known the marker carries forward.
pub fn combine_rule(input: &CombineInput, diagnostics: &mut Vec<Diagnostic>) -> TessVertex {
    if let Some(v) = input
        .vertices
        .iter()
        .find(|v| v.position.distance(input.position) <= COINCIDENT)
    {
        return *v;
    }

    let height = match interpolate(input, |v| v.height.known()) {
        Ok(Some(h)) => Height::Known(h),
        Ok(None) => Height::FromMesh,
        Err(first) => {
            Diagnostic::TessellationAmbiguity {
                position: input.position,
                attribute: Attribute::Height,
            }
            .raise(diagnostics);
            Height::Known(first)
        }
    };
    let uv = match interpolate(input, |v| v.uv.known()) {
        Ok(Some(uv)) => TexCoord::Known(uv),
        Ok(None) => TexCoord::FromPolygon,
        Err(first) => {
            Diagnostic::TessellationAmbiguity {
                position: input.position,
                attribute: Attribute::TexCoord,
            }
            .raise(diagnostics);
            TexCoord::Known(first)
        }
    };

    TessVertex {
        position: input.position,
        height,
        uv,
        origin: Origin::Combined,
    }
}
