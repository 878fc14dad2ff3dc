//! Clipping a ring against one convex mesh triangle.

use glam::DVec2;

use super::combine::{COINCIDENT, CombineFn, CombineInput};
use super::vertex::TessVertex;
use crate::diagnostic::Diagnostic;

/// Signed area of a ring in `(x, z)`; positive for counter-clockwise.
#[must_use]
pub fn signed_area(ring: &[TessVertex]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| ring[i].position.perp_dot(ring[(i + 1) % n].position))
        .sum::<f64>()
        * 0.5
}

/// Drops consecutive coincident vertices, including a closing duplicate.
pub fn dedup_ring(ring: &mut Vec<TessVertex>) {
    ring.dedup_by(|b, a| a.position.distance(b.position) <= COINCIDENT);
    while ring.len() > 1
        && ring[0].position.distance(ring[ring.len() - 1].position) <= COINCIDENT
    {
        ring.pop();
    }
}

fn side(c: DVec2, d: DVec2, p: DVec2) -> f64 {
    (d - c).perp_dot(p - c)
}

/// Sutherland-Hodgman clip of `subject` against the triangle `clip`, which
/// must be counter-clockwise. The result is exact only for a convex
/// `subject`. Every crossing vertex goes through `combine` with the subject
/// edge first and the mesh edge second.
pub fn clip_ring(
    subject: &[TessVertex],
    clip: &[TessVertex; 3],
    combine: &mut CombineFn,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<TessVertex> {
    let mut output = subject.to_vec();
    for k in 0..3 {
        if output.is_empty() {
            break;
        }
        let (c, d) = (clip[k], clip[(k + 1) % 3]);
        let edge = d.position - c.position;
        let tolerance = COINCIDENT * edge.length();
        let input = std::mem::take(&mut output);
        for i in 0..input.len() {
            let a = input[i];
            let b = input[(i + 1) % input.len()];
            let sa = side(c.position, d.position, a.position);
            let sb = side(c.position, d.position, b.position);
            let a_in = sa >= -tolerance;
            let b_in = sb >= -tolerance;
            if a_in {
                output.push(a);
            }
            if a_in != b_in && (sa - sb).abs() > f64::EPSILON {
                let s = sa / (sa - sb);
                let position = a.position.lerp(b.position, s);
                // The crossing may lie beyond the mesh edge's ends; extrapolating
                // along its line stays in the triangle's plane.
                let r = if edge.length_squared() > 0.0 {
                    (position - c.position).dot(edge) / edge.length_squared()
                } else {
                    0.0
                };
                let input = CombineInput {
                    position,
                    vertices: [a, b, c, d],
                    weights: [(1.0 - s) * 0.5, s * 0.5, (1.0 - r) * 0.5, r * 0.5],
                };
                output.push(combine(&input, diagnostics));
            }
        }
        dedup_ring(&mut output);
    }
    output
}
