//! Tile identity and the local planar frame.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Metres per degree of latitude (one nautical mile per arc minute).
pub const ONE_DEGREE: f64 = 1852.0 * 60.0;

/// A one-degree tile named by its south-west corner.
///
/// Local coordinates are metres from the tile centre, with x east and z
/// south. Longitude is scaled by the cosine of the centre latitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub south: i32,
    pub west: i32,
}

impl Tile {
    #[must_use]
    pub fn new(south: i32, west: i32) -> Self {
        Self { south, west }
    }

    /// The tile containing a geographic point.
    #[must_use]
    pub fn containing(lon: f64, lat: f64) -> Self {
        Self {
            south: lat.floor() as i32,
            west: lon.floor() as i32,
        }
    }

    /// `(lon, lat)` of the tile centre.
    #[must_use]
    pub fn centre(&self) -> DVec2 {
        DVec2::new(f64::from(self.west) + 0.5, f64::from(self.south) + 0.5)
    }

    fn lon_scale(&self) -> f64 {
        ONE_DEGREE * self.centre().y.to_radians().cos()
    }

    /// Geographic `(lon, lat)` to local `(x, z)`.
    #[must_use]
    pub fn to_local(&self, lon_lat: DVec2) -> DVec2 {
        let c = self.centre();
        DVec2::new((lon_lat.x - c.x) * self.lon_scale(), (c.y - lon_lat.y) * ONE_DEGREE)
    }

    /// Local `(x, z)` back to geographic `(lon, lat)`.
    #[must_use]
    pub fn to_geo(&self, local: DVec2) -> DVec2 {
        let c = self.centre();
        DVec2::new(c.x + local.x / self.lon_scale(), c.y - local.y / ONE_DEGREE)
    }

    /// `(lon, lat, elevation)` to local `(x, height, z)`.
    #[must_use]
    pub fn local_point(&self, geo: DVec3) -> DVec3 {
        let xz = self.to_local(geo.truncate());
        DVec3::new(xz.x, geo.z, xz.y)
    }

    /// Parses a tile file name such as `+47+008` or `-34-123.dsf`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let stem = name.split('.').next()?;
        let split = stem.get(1..)?.find(['+', '-'])? + 1;
        let (lat, lon) = stem.split_at(split);
        Some(Self::new(lat.parse().ok()?, lon.parse().ok()?))
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ns = if self.south < 0 { '-' } else { '+' };
        let ew = if self.west < 0 { '-' } else { '+' };
        write!(f, "{ns}{:02}{ew}{:03}", self.south.abs(), self.west.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_maps_to_origin() {
        let tile = Tile::new(47, -123);
        let local = tile.to_local(tile.centre());
        assert!(local.length() < 1e-9);
    }

    #[test]
    fn north_is_negative_z() {
        let tile = Tile::new(0, 0);
        let north = tile.to_local(DVec2::new(0.5, 1.0));
        assert!((north.y + ONE_DEGREE / 2.0).abs() < 1e-6);
        let east = tile.to_local(DVec2::new(1.0, 0.5));
        assert!(east.x > 0.0 && east.x < ONE_DEGREE / 2.0);
    }

    #[test]
    fn local_round_trip() {
        let tile = Tile::new(51, -1);
        let geo = DVec2::new(-0.4512, 51.4700);
        let back = tile.to_geo(tile.to_local(geo));
        assert!((back - geo).length() < 1e-12);
    }

    #[test]
    fn containing_floors_negative_coordinates() {
        assert_eq!(Tile::containing(-0.25, 51.5), Tile::new(51, -1));
        assert_eq!(Tile::containing(-122.1, -33.9).to_string(), "-34-123");
        assert_eq!(Tile::new(47, 8).to_string(), "+47+008");
    }

    #[test]
    fn names_parse_back() {
        for tile in [Tile::new(47, 8), Tile::new(-34, -123), Tile::new(0, -1)] {
            assert_eq!(Tile::from_name(&tile.to_string()), Some(tile));
        }
        assert_eq!(Tile::from_name("+47+008.dsf"), Some(Tile::new(47, 8)));
        assert_eq!(Tile::from_name("earth.wed.xml"), None);
        assert_eq!(Tile::from_name(""), None);
    }
}
