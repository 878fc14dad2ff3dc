//! Whole-tile decoding.

use glam::DVec3;

use crate::atom::{Atom, AtomTag, read_header};
use crate::command::{Context, interpret};
use crate::error::DecodeResult;
use crate::pool::GeoData;
use crate::strings::{Definitions, Properties, read_string_table};
use crate::{NetworkChain, Placement, Polygon, TerrainPatch};

/// Selects which command families produce output.
///
/// Disabled families are still parsed so the stream stays in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub terrain: bool,
    pub objects: bool,
    pub polygons: bool,
    pub networks: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            terrain: true,
            objects: true,
            polygons: true,
            networks: true,
        }
    }
}

impl ReadOptions {
    /// Only the terrain mesh, as needed to build a height index.
    #[must_use]
    pub fn terrain_only() -> Self {
        Self {
            terrain: true,
            objects: false,
            polygons: false,
            networks: false,
        }
    }
}

/// Everything decoded from one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub properties: Properties,
    pub definitions: Definitions,
    pub placements: Vec<Placement>,
    pub patches: Vec<TerrainPatch>,
    pub polygons: Vec<Polygon>,
    pub networks: Vec<NetworkChain>,
}

impl Scene {
    #[must_use]
    pub fn object_name(&self, placement: &Placement) -> Option<&str> {
        name(&self.definitions.objects, placement.definition)
    }

    #[must_use]
    pub fn terrain_name(&self, patch: &TerrainPatch) -> Option<&str> {
        name(&self.definitions.terrain, patch.terrain)
    }

    #[must_use]
    pub fn polygon_name(&self, polygon: &Polygon) -> Option<&str> {
        name(&self.definitions.polygons, polygon.definition)
    }

    /// `(lon, lat, elevation)` triangle corners from physical patches only.
    pub fn physical_points(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.patches
            .iter()
            .filter(|p| p.flags.is_physical())
            .flat_map(|p| p.points.iter().copied())
    }
}

fn name(table: &[String], index: u32) -> Option<&str> {
    table.get(index as usize).map(String::as_str)
}

fn read_properties(head: &Atom<'_>) -> DecodeResult<Properties> {
    for child in head.children() {
        let child = child?;
        if child.tag == AtomTag::PROP {
            return Properties::from_table(read_string_table(&child)?);
        }
    }
    Ok(Properties::default())
}

/// Decodes a complete DSF tile.
///
/// Groups may appear in any order; the command stream is interpreted last,
/// once definitions and pools are known. Raster data is skipped.
pub fn read_scene(data: &[u8], options: &ReadOptions) -> DecodeResult<Scene> {
    let container = read_header(data)?;

    let mut properties = Properties::default();
    let mut definitions = Definitions::default();
    let mut geo = GeoData::default();
    let mut commands = None;
    for atom in container.atoms() {
        let atom = atom?;
        match atom.tag {
            AtomTag::HEAD => properties = read_properties(&atom)?,
            AtomTag::DEFN => definitions = Definitions::from_group(&atom)?,
            AtomTag::GEOD => geo = GeoData::from_group(&atom)?,
            AtomTag::CMDS => commands = Some(atom),
            AtomTag::DEMS => tracing::trace!(len = atom.payload.len(), "skipping raster group"),
            other => tracing::trace!(tag = %other, "skipping unknown root atom"),
        }
    }

    let output = match commands {
        Some(atom) => {
            let ctx = Context {
                geo: &geo,
                definitions: &definitions,
                options,
            };
            interpret(&mut atom.reader(), &ctx)?
        }
        None => {
            tracing::debug!("tile has no command stream");
            crate::command::Output::default()
        }
    };

    Ok(Scene {
        properties,
        definitions,
        placements: output.placements,
        patches: output.patches,
        polygons: output.polygons,
        networks: output.networks,
    })
}
