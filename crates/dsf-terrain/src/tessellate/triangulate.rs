//! Ear clipping with hole bridging.
//!
//! Rings are counter-clockwise and holes clockwise in `(x, z)`. Holes are
//! spliced into the outer ring through a zero-width bridge, leaving one
//! weakly simple ring to clip ears from.

use glam::DVec2;

use super::combine::COINCIDENT;
use super::vertex::TessVertex;
use crate::diagnostic::{Degenerate, Diagnostic};

fn cross(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - b)
}

fn same(a: DVec2, b: DVec2) -> bool {
    a.distance(b) <= COINCIDENT
}

fn inside_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2, inclusive: bool) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    if inclusive {
        d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
    } else {
        d1 > 0.0 && d2 > 0.0 && d3 > 0.0
    }
}

/// Splices `hole` into `ring` through a bridge from the hole's leftmost
/// vertex to a visible ring vertex on its left. Returns `false` when no
/// ring edge lies to the left of the hole.
pub fn bridge_hole(ring: &mut Vec<TessVertex>, hole: &[TessVertex]) -> bool {
    let Some(m_idx) = (0..hole.len()).min_by(|&a, &b| {
        let (pa, pb) = (hole[a].position, hole[b].position);
        pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
    }) else {
        return false;
    };
    let m = hole[m_idx].position;
    let n = ring.len();

    // Nearest ring edge crossed by a ray from `m` towards -x.
    let mut best: Option<(f64, usize)> = None;
    for i in 0..n {
        let a = ring[i].position;
        let b = ring[(i + 1) % n].position;
        if a.y == b.y || m.y < a.y.min(b.y) || m.y > a.y.max(b.y) {
            continue;
        }
        let x = a.x + (m.y - a.y) * (b.x - a.x) / (b.y - a.y);
        if x <= m.x && best.is_none_or(|(bx, _)| x > bx) {
            let candidate = if a.x < b.x { i } else { (i + 1) % n };
            best = Some((x, candidate));
        }
    }
    let Some((qx, mut p_idx)) = best else {
        return false;
    };

    // A ring vertex inside (m, hit, candidate) would block the bridge; take
    // the one closest in angle to the ray instead.
    let hit = DVec2::new(qx, m.y);
    let p = ring[p_idx].position;
    if !same(hit, p) {
        let (t1, t2) = if p.y < m.y { (hit, m) } else { (m, hit) };
        let mut best_tan = f64::INFINITY;
        for (i, v) in ring.iter().enumerate() {
            let q = v.position;
            if i == p_idx || q.x > m.x || same(q, p) {
                continue;
            }
            if inside_triangle(q, t1, p, t2, true) || inside_triangle(q, t2, p, t1, true) {
                let tan = (m.y - q.y).abs() / (m.x - q.x).max(f64::MIN_POSITIVE);
                let closer = tan == best_tan && q.x > ring[p_idx].position.x;
                if tan < best_tan || closer {
                    best_tan = tan;
                    p_idx = i;
                }
            }
        }
    }

    let mut spliced = Vec::with_capacity(n + hole.len() + 2);
    spliced.extend_from_slice(&ring[..=p_idx]);
    spliced.extend_from_slice(&hole[m_idx..]);
    spliced.extend_from_slice(&hole[..=m_idx]);
    spliced.extend_from_slice(&ring[p_idx..]);
    *ring = spliced;
    true
}

fn clip_ears(ring: &[TessVertex], inclusive: bool, out: &mut Vec<[TessVertex; 3]>) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..ring.len()).collect();
    let mut i = 0;
    let mut misses = 0;
    while idx.len() > 3 && misses < idx.len() {
        let len = idx.len();
        let (ip, ic, inx) = (idx[(i + len - 1) % len], idx[i], idx[(i + 1) % len]);
        let (a, b, c) = (ring[ip].position, ring[ic].position, ring[inx].position);
        let turn = cross(a, b, c);
        let scale = (b - a).length() * (c - b).length();

        if turn.abs() <= 1e-12 * scale || same(a, b) || same(b, c) {
            // Collinear or spike vertex: contributes no area.
            idx.remove(i);
            misses = 0;
        } else if turn > 0.0
            && !idx.iter().any(|&k| {
                let q = ring[k].position;
                !same(q, a) && !same(q, b) && !same(q, c) && inside_triangle(q, a, b, c, inclusive)
            })
        {
            out.push([ring[ip], ring[ic], ring[inx]]);
            idx.remove(i);
            misses = 0;
        } else {
            i += 1;
            misses += 1;
        }
        if !idx.is_empty() {
            i %= idx.len();
        }
    }
    idx
}

/// Triangulates one counter-clockwise, weakly simple ring.
pub fn ear_clip(ring: &[TessVertex], diagnostics: &mut Vec<Diagnostic>) -> Vec<[TessVertex; 3]> {
    let mut out = Vec::with_capacity(ring.len().saturating_sub(2));
    if ring.len() < 3 {
        return out;
    }
    let mut rest = clip_ears(ring, true, &mut out);
    if rest.len() > 3 {
        // Retry with boundary contacts allowed, which bridges need.
        let remaining: Vec<TessVertex> = rest.iter().map(|&k| ring[k]).collect();
        let again = clip_ears(&remaining, false, &mut out);
        rest = again.iter().map(|&k| rest[k]).collect();
    }
    match rest.as_slice() {
        &[a, b, c] => {
            if cross(ring[a].position, ring[b].position, ring[c].position) > 0.0 {
                out.push([ring[a], ring[b], ring[c]]);
            }
        }
        r if r.len() > 3 => Diagnostic::DegenerateGeometry(Degenerate::Stalled).raise(diagnostics),
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tessellate::vertex::TexCoord;

    fn ring(points: &[(f64, f64)]) -> Vec<TessVertex> {
        points
            .iter()
            .map(|&(x, z)| TessVertex::polygon(DVec2::new(x, z), TexCoord::FromPolygon))
            .collect()
    }

    fn area(tris: &[[TessVertex; 3]]) -> f64 {
        tris.iter()
            .map(|t| 0.5 * (t[1].position - t[0].position).perp_dot(t[2].position - t[0].position))
            .sum()
    }

    #[test]
    fn convex_ring_gives_n_minus_two_triangles() {
        let r = ring(&[(0.0, 0.0), (2.0, 0.0), (3.0, 1.0), (2.0, 2.0), (0.0, 2.0)]);
        let tris = ear_clip(&r, &mut Vec::new());
        assert_eq!(tris.len(), 3);
        assert!((area(&tris) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn concave_ring_keeps_its_area() {
        // An L shape.
        let r = ring(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]);
        let tris = ear_clip(&r, &mut Vec::new());
        assert_eq!(tris.len(), 4);
        assert!((area(&tris) - 3.0).abs() < 1e-12);
        assert!(tris.iter().all(|t| {
            (t[1].position - t[0].position).perp_dot(t[2].position - t[0].position) > 0.0
        }));
    }

    #[test]
    fn collinear_vertices_are_skipped() {
        let r = ring(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        let tris = ear_clip(&r, &mut Vec::new());
        assert!((area(&tris) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn hole_is_bridged_and_excluded() {
        let mut outer = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        let hole = ring(&[(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0)]);
        assert!(bridge_hole(&mut outer, &hole));
        assert_eq!(outer.len(), 4 + 4 + 2);
        let mut diags = Vec::new();
        let tris = ear_clip(&outer, &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
        assert!((area(&tris) - 12.0).abs() < 1e-9);
        let centre = DVec2::new(2.0, 2.0);
        assert!(!tris.iter().any(|t| {
            inside_triangle(centre, t[0].position, t[1].position, t[2].position, false)
        }));
    }

    #[test]
    fn hole_outside_ring_is_rejected() {
        let mut outer = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let hole = ring(&[(-5.0, 5.0), (-5.0, 6.0), (-4.0, 6.0)]);
        assert!(!bridge_hole(&mut outer, &hole));
        assert_eq!(outer.len(), 4);
    }
}
