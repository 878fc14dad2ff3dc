//! Airport pavement outlines.
//!
//! Runways and taxiways arrive in two record layouts. The legacy layout
//! gives a centre, heading, length and width; the newer one gives the two
//! centreline ends and a width. Legacy pavement is converted to
//! centreline ends in geographic space and then shares the centreline
//! path, so both layouts produce the same quad. Legacy helipads skip that
//! conversion and become a square of side `width` turned by the heading,
//! built directly around the local centre.

use glam::DVec2;

use crate::drape::drape_batch;
use crate::index::ElevationIndex;
use crate::tessellate::DrapeResult;
use crate::tile::{ONE_DEGREE, Tile};

/// One pavement record. Positions are `(lon, lat)`; lengths are metres and
/// headings degrees true.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pavement {
    Legacy {
        centre: DVec2,
        heading: f64,
        length: f64,
        width: f64,
        helipad: bool,
    },
    Centerline {
        end1: DVec2,
        end2: DVec2,
        width: f64,
    },
}

fn heading_vectors(heading: f64) -> (DVec2, DVec2) {
    let h = heading.to_radians();
    (DVec2::new(h.sin(), -h.cos()), DVec2::new(h.cos(), h.sin()))
}

impl Pavement {
    /// The centreline form of a legacy record. Helipads and records already
    /// in centreline form are returned unchanged.
    #[must_use]
    pub fn to_centerline(self) -> Self {
        match self {
            Self::Legacy {
                centre,
                heading,
                length,
                width,
                helipad: false,
            } => {
                let h = heading.to_radians();
                let half = length / 2.0;
                let dlat = h.cos() * half / ONE_DEGREE;
                let dlon = h.sin() * half / (ONE_DEGREE * centre.y.to_radians().cos());
                let offset = DVec2::new(dlon, dlat);
                Self::Centerline {
                    end1: centre - offset,
                    end2: centre + offset,
                    width,
                }
            }
            other => other,
        }
    }

    /// Corners in local `(x, z)`. `None` when the centreline has zero length.
    #[must_use]
    pub fn quad(self, tile: &Tile) -> Option<[DVec2; 4]> {
        match self.to_centerline() {
            Self::Legacy {
                centre,
                heading,
                width,
                ..
            } => {
                let c = tile.to_local(centre);
                let (along, across) = heading_vectors(heading);
                let (a, r) = (along * width / 2.0, across * width / 2.0);
                Some([c - a - r, c - a + r, c + a + r, c + a - r])
            }
            Self::Centerline { end1, end2, width } => {
                let (a, b) = (tile.to_local(end1), tile.to_local(end2));
                let along = (b - a).try_normalize()?;
                let r = DVec2::new(-along.y, along.x) * width / 2.0;
                Some([a - r, a + r, b + r, b - r])
            }
        }
    }
}

/// Drapes pavement of one surface type with a shared texture coordinate.
#[must_use]
pub fn drape_pavements(index: &ElevationIndex, pavements: &[Pavement], uv: DVec2) -> DrapeResult {
    let tile = index.tile();
    let polygons: Vec<Vec<Vec<DVec2>>> = pavements
        .iter()
        .filter_map(|p| p.quad(&tile))
        .map(|q| vec![q.to_vec()])
        .collect();
    drape_batch(index, &polygons, uv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexConfig;
    use crate::tessellate::HeightState;

    fn area(q: &[DVec2; 4]) -> f64 {
        (0..4).map(|i| q[i].perp_dot(q[(i + 1) % 4])).sum::<f64>() * 0.5
    }

    fn same_quad(a: &[DVec2; 4], b: &[DVec2; 4], tol: f64) -> bool {
        a.iter().all(|p| b.iter().any(|q| p.distance(*q) < tol))
    }

    #[test]
    fn legacy_and_centerline_runways_agree() {
        let tile = Tile::new(51, -1);
        let legacy = Pavement::Legacy {
            centre: DVec2::new(-0.4614, 51.4775),
            heading: 89.7,
            length: 3900.0,
            width: 50.0,
            helipad: false,
        };
        let Pavement::Centerline { end1, end2, .. } = legacy.to_centerline() else {
            panic!("legacy runway should convert");
        };
        let modern = Pavement::Centerline { end1, end2, width: 50.0 };
        let (q1, q2) = (legacy.quad(&tile).unwrap(), modern.quad(&tile).unwrap());
        assert!(same_quad(&q1, &q2, 1e-6));
        let len = (tile.to_local(end2) - tile.to_local(end1)).length();
        assert!((len - 3900.0).abs() < 5.0, "length {len}");
        assert!((area(&q1).abs() - 3900.0 * 50.0).abs() < 3900.0);
    }

    #[test]
    fn helipad_is_a_turned_square() {
        let tile = Tile::new(0, 0);
        let pad = Pavement::Legacy {
            centre: tile.centre(),
            heading: 45.0,
            length: 999.0,
            width: 20.0,
            helipad: true,
        };
        assert_eq!(pad.to_centerline(), pad);
        let q = pad.quad(&tile).unwrap();
        for p in q {
            assert!((p.length() - 10.0 * 2f64.sqrt()).abs() < 1e-9);
        }
        assert!((area(&q).abs() - 400.0).abs() < 1e-9);
        // Turned 45 degrees, the corners lie on the axes.
        assert!(q.iter().any(|p| p.x.abs() < 1e-9));
    }

    #[test]
    fn zero_length_centerline_is_skipped() {
        let tile = Tile::new(0, 0);
        let p = Pavement::Centerline {
            end1: tile.centre(),
            end2: tile.centre(),
            width: 30.0,
        };
        assert!(p.quad(&tile).is_none());
    }

    #[test]
    fn pavements_drape_onto_flat_terrain() {
        let tile = Tile::new(0, 0);
        let index = ElevationIndex::flat(tile, IndexConfig::default());
        let runway = Pavement::Legacy {
            centre: tile.centre(),
            heading: 0.0,
            length: 1000.0,
            width: 30.0,
            helipad: false,
        };
        let result = drape_pavements(&index, &[runway], DVec2::ZERO);
        assert!(!result.is_empty());
        assert!(result.triangles.iter().all(|t| t.height == HeightState::Draped));
        assert!(result.vertices().all(|v| v.position.y == 0.0));
    }
}
