//! Scenery definitions referenced by a tile.
//!
//! A tile's definition tables only hold virtual names such as
//! `lib/airport/pavement/asphalt_1.pol`. The kind of a definition follows
//! from its extension; where it lives on disk is up to the library the
//! caller supplies through [`NameLookup`].

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use dsf_decode::Polygon;

/// Maps virtual scenery names to files.
pub trait NameLookup {
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

impl<S: BuildHasher> NameLookup for HashMap<String, PathBuf, S> {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.get(name).cloned()
    }
}

impl NameLookup for BTreeMap<String, PathBuf> {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.get(name).cloned()
    }
}

/// Draw-order group, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Terrain,
    Beaches,
    Shoulders,
    Taxiways,
    Runways,
    Markings,
    Airports,
    Roads,
    Objects,
    LightObjects,
    Cars,
}

/// A virtual name and, when the library knows it, its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub path: Option<PathBuf>,
}

/// A draped polygon (`.pol`) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrapedPolygon {
    pub resource: Resource,
    pub layer: Layer,
}

impl DrapedPolygon {
    /// Polygon parameter marking windings that carry their own `(s, t)`.
    pub const NODE_UV_PARAM: u16 = 65535;

    /// Whether `polygon` supplies per-node texture coordinates instead of a
    /// texture heading.
    #[must_use]
    pub fn uses_node_uvs(polygon: &Polygon) -> bool {
        polygon.param == Self::NODE_UV_PARAM && polygon.windings.iter().all(|w| w.plane_count() >= 4)
    }
}

/// One entry of a tile's definition tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Terrain(Resource),
    Object(Resource),
    Draped(DrapedPolygon),
    Facade(Resource),
    Forest(Resource),
    Line(Resource),
    ObjectString(Resource),
    Network(Resource),
    Unknown(Resource),
}

impl Definition {
    /// Classifies `name` by its extension and resolves its file.
    #[must_use]
    pub fn classify(name: &str, lookup: &impl NameLookup) -> Self {
        let resource = Resource {
            name: name.to_owned(),
            path: lookup.resolve(name),
        };
        if resource.path.is_none() {
            tracing::debug!(name, "definition not found in library");
        }
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("ter") => Self::Terrain(resource),
            Some("obj" | "agp") => Self::Object(resource),
            Some("pol") => Self::Draped(DrapedPolygon {
                resource,
                layer: Layer::Airports,
            }),
            Some("fac") => Self::Facade(resource),
            Some("for") => Self::Forest(resource),
            Some("lin") => Self::Line(resource),
            Some("str") => Self::ObjectString(resource),
            Some("net") => Self::Network(resource),
            _ => Self::Unknown(resource),
        }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Draped(d) => &d.resource,
            Self::Terrain(r)
            | Self::Object(r)
            | Self::Facade(r)
            | Self::Forest(r)
            | Self::Line(r)
            | Self::ObjectString(r)
            | Self::Network(r)
            | Self::Unknown(r) => r,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.resource().name
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.resource().path.as_deref()
    }

    #[must_use]
    pub fn layer(&self) -> Layer {
        match self {
            Self::Terrain(_) => Layer::Terrain,
            Self::Draped(d) => d.layer,
            Self::Line(_) => Layer::Markings,
            Self::Network(_) => Layer::Roads,
            Self::Object(_) | Self::Facade(_) | Self::Forest(_) | Self::ObjectString(_) | Self::Unknown(_) => {
                Layer::Objects
            }
        }
    }

    /// Whether patches of this definition answer height queries.
    #[must_use]
    pub fn is_height_queryable(&self) -> bool {
        matches!(self, Self::Terrain(_))
    }

    /// Whether instances are cut against the terrain mesh.
    #[must_use]
    pub fn is_drapeable(&self) -> bool {
        matches!(self, Self::Draped(_) | Self::Line(_))
    }

    #[must_use]
    pub fn as_draped(&self) -> Option<&DrapedPolygon> {
        match self {
            Self::Draped(d) => Some(d),
            _ => None,
        }
    }
}
