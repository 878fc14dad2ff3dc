//! Decode X-Plane DSF scenery tiles.
//!
//! This crate provides pure synchronous decoding of the DSF container: the
//! atom tree, string tables, quantized coordinate pools and the command
//! stream that places objects and builds the terrain mesh. Nothing here
//! touches the file system or spawns threads; the caller hands over the
//! tile bytes and decides where the work runs.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **Borrowing**: Atoms and readers borrow from the caller's buffer
//! - **Fail per tile**: Any structural error aborts the whole tile
//!
//! # Key functions
//!
//! - [`read_header`]: Validate magic, version and the `HEAD` atom
//! - [`read_atom`]: Read one atom header
//! - [`decode_plane`]: Decode one raw/delta/RLE plane of a coordinate pool
//! - [`Command::read`] and [`CommandState::apply`]: Parse and run one command
//! - [`read_scene`]: Decode a whole tile into a [`Scene`]

mod error;
mod reader;

pub mod atom;
pub mod command;
pub mod pool;
pub mod scene;
pub mod strings;

#[cfg(test)]
mod testutil;

use glam::{DVec2, DVec3};

pub use atom::{Atom, AtomHeader, AtomTag, Atoms, Container, read_atom, read_header};
pub use command::{Command, CommandState, PointRefs, PrimitiveShape, fan_to_triangles, strip_to_triangles};
pub use error::{DecodeError, DecodeResult, ErrorKind};
pub use pool::{CoordinatePool, GeoData, PlaneEncoding, PlaneScale, ValueWidth, decode_plane};
pub use reader::ByteReader;
pub use scene::{ReadOptions, Scene, read_scene};
pub use strings::{Definitions, Properties};

/// Terrain patch flags from the patch-boundary commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatchFlags(pub u8);

impl PatchFlags {
    /// Participates in height queries and draping.
    pub const PHYSICAL: Self = Self(1);
    /// Drawn over the base mesh.
    pub const OVERLAY: Self = Self(2);

    #[must_use]
    pub fn is_physical(self) -> bool {
        self.0 & Self::PHYSICAL.0 != 0
    }

    #[must_use]
    pub fn is_overlay(self) -> bool {
        self.0 & Self::OVERLAY.0 != 0
    }
}

/// Near and far visibility distances in metres. A negative `far` means
/// the patch is visible at any distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodRange {
    pub near: f32,
    pub far: f32,
}

impl Default for LodRange {
    fn default() -> Self {
        Self {
            near: 0.0,
            far: -1.0,
        }
    }
}

/// How a placed object gets its elevation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ElevationMode {
    /// On the terrain surface.
    #[default]
    Draped,
    /// Fourth plane is metres above mean sea level.
    Msl,
    /// Fourth plane is metres above ground level.
    Agl,
}

/// An object instance emitted by the object commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Index into [`Definitions::objects`].
    pub definition: u32,
    pub lon: f64,
    pub lat: f64,
    /// Degrees clockwise from true north.
    pub heading: f64,
    /// Plane values beyond heading, e.g. an explicit elevation.
    pub extra: Vec<f64>,
    pub elevation: ElevationMode,
    /// Airport filter in effect when the object was placed.
    pub filter: Option<i32>,
}

/// A run of triangles sharing one terrain type.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainPatch {
    /// Index into [`Definitions::terrain`].
    pub terrain: u32,
    pub flags: PatchFlags,
    pub lod: LodRange,
    /// `(lon, lat, elevation)` triples; every three points form a triangle.
    pub points: Vec<DVec3>,
}

impl TerrainPatch {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.points.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [DVec3; 3]> + '_ {
        self.points.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// A sequence of pool points with every plane kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Winding {
    planes: usize,
    coords: Vec<f64>,
}

impl Winding {
    /// Copies pool points into a winding. The plane count is taken from the
    /// first point; all points come from pools of the same shape.
    #[must_use]
    pub fn from_points(points: &[&[f64]]) -> Self {
        let planes = points.first().map_or(0, |p| p.len());
        let mut coords = Vec::with_capacity(points.len() * planes);
        for p in points {
            coords.extend_from_slice(p);
        }
        Self { planes, coords }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.planes == 0 { 0 } else { self.coords.len() / self.planes }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes
    }

    #[must_use]
    pub fn point(&self, i: usize) -> Option<&[f64]> {
        let start = i.checked_mul(self.planes)?;
        self.coords.get(start..start + self.planes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.coords.chunks_exact(self.planes.max(1))
    }

    /// The first two planes of each point as `(lon, lat)`.
    pub fn lon_lat(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.iter().filter(|p| p.len() >= 2).map(|p| DVec2::new(p[0], p[1]))
    }
}

/// A draped polygon, facade, forest or line emitted by the polygon commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Index into [`Definitions::polygons`].
    pub definition: u32,
    /// Per-type parameter, e.g. heading of a draped polygon or facade height.
    pub param: u16,
    /// Outer ring first, then holes.
    pub windings: Vec<Winding>,
    /// Airport filter in effect when the polygon was emitted.
    pub filter: Option<i32>,
}

/// A road, rail or power line chain from a 32-bit pool.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkChain {
    /// Index into [`Definitions::networks`].
    pub definition: u32,
    pub subtype: u8,
    pub points: Winding,
    pub filter: Option<i32>,
}
