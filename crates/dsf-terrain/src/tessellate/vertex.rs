//! Per-vertex payload carried through tessellation.

use glam::{DVec2, DVec3};

/// Where a tessellation vertex came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A corner of a terrain mesh triangle.
    Mesh,
    /// A node of the caller's polygon.
    Polygon,
    /// Synthesized by the combine rule.
    Combined,
}

/// Elevation of a vertex, or a marker that the mesh must supply it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Height {
    Known(f64),
    FromMesh,
}

impl Height {
    #[must_use]
    pub fn known(self) -> Option<f64> {
        match self {
            Self::Known(h) => Some(h),
            Self::FromMesh => None,
        }
    }
}

/// Texture coordinate of a vertex, or a marker that the polygon must supply it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexCoord {
    Known(DVec2),
    FromPolygon,
}

impl TexCoord {
    #[must_use]
    pub fn known(self) -> Option<DVec2> {
        match self {
            Self::Known(uv) => Some(uv),
            Self::FromPolygon => None,
        }
    }
}

/// A vertex during tessellation, positioned in local `(x, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessVertex {
    pub position: DVec2,
    pub height: Height,
    pub uv: TexCoord,
    pub origin: Origin,
}

impl TessVertex {
    /// A mesh corner: height known, texture coordinate pending.
    #[must_use]
    pub fn mesh(corner: DVec3) -> Self {
        Self {
            position: DVec2::new(corner.x, corner.z),
            height: Height::Known(corner.y),
            uv: TexCoord::FromPolygon,
            origin: Origin::Mesh,
        }
    }

    /// A polygon node: height pending.
    #[must_use]
    pub fn polygon(position: DVec2, uv: TexCoord) -> Self {
        Self {
            position,
            height: Height::FromMesh,
            uv,
            origin: Origin::Polygon,
        }
    }
}

/// A fully resolved output vertex in local `(x, height, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrapedVertex {
    pub position: DVec3,
    pub uv: DVec2,
}
