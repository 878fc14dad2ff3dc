//! Tile loading and the resident tile.
//!
//! Loading never fails outright. A tile whose bytes cannot be decoded is
//! logged once, keeps its error on [`LoadedTile::error`] and gets a flat
//! sea-level index in place of its terrain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dsf_decode::{Definitions, Polygon, Scene, read_scene};
use dsf_terrain::{
    DrapeResult, ElevationIndex, IndexConfig, Tile, UvProjection, drape_polygon, drape_polygon_with_uvs,
};
use glam::{DVec2, DVec3};

use crate::definition::{Definition, DrapedPolygon, NameLookup};
use crate::display::DisplayOptions;
use crate::error::{Error, Result};

/// A tile's definition tables, classified and resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileDefinitions {
    pub terrain: Vec<Definition>,
    pub objects: Vec<Definition>,
    pub polygons: Vec<Definition>,
    pub networks: Vec<Definition>,
}

impl TileDefinitions {
    #[must_use]
    pub fn resolve(definitions: &Definitions, lookup: &impl NameLookup) -> Self {
        let classify = |names: &[String]| -> Vec<Definition> {
            names.iter().map(|n| Definition::classify(n, lookup)).collect()
        };
        // Built-in terrain such as `terrain_Water` has no extension.
        let terrain = classify(&definitions.terrain)
            .into_iter()
            .map(|d| match d {
                Definition::Unknown(r) => Definition::Terrain(r),
                other => other,
            })
            .collect();
        Self {
            terrain,
            objects: classify(&definitions.objects),
            polygons: classify(&definitions.polygons),
            networks: classify(&definitions.networks),
        }
    }

    #[must_use]
    pub fn terrain(&self, index: u32) -> Option<&Definition> {
        self.terrain.get(index as usize)
    }

    #[must_use]
    pub fn object(&self, index: u32) -> Option<&Definition> {
        self.objects.get(index as usize)
    }

    #[must_use]
    pub fn polygon(&self, index: u32) -> Option<&Definition> {
        self.polygons.get(index as usize)
    }

    #[must_use]
    pub fn network(&self, index: u32) -> Option<&Definition> {
        self.networks.get(index as usize)
    }

    /// Definitions that no library entry resolved.
    pub fn unresolved(&self) -> impl Iterator<Item = &Definition> {
        self.terrain
            .iter()
            .chain(&self.objects)
            .chain(&self.polygons)
            .chain(&self.networks)
            .filter(|d| d.path().is_none())
    }
}

/// A decoded tile with its height index.
#[derive(Debug)]
pub struct LoadedTile {
    pub tile: Tile,
    pub options: DisplayOptions,
    pub scene: Scene,
    pub definitions: TileDefinitions,
    pub index: ElevationIndex,
    /// Set when the tile failed to load and is showing sea level.
    pub error: Option<Error>,
}

impl LoadedTile {
    fn fallback(tile: Tile, options: DisplayOptions, config: IndexConfig, error: Error) -> Self {
        tracing::error!(%tile, %error, "tile could not be loaded, showing sea level");
        Self {
            tile,
            options,
            scene: Scene::default(),
            definitions: TileDefinitions::default(),
            index: ElevationIndex::flat(tile, config),
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }

    /// Terrain height under a geographic `(lon, lat)`.
    #[must_use]
    pub fn height(&self, lon_lat: DVec2) -> f64 {
        let p = self.tile.to_local(lon_lat);
        self.index.height(p.x, p.y)
    }

    /// Drapes one of this tile's polygons. `scale` is the texture size in
    /// metres, used unless the polygon carries per-node texture coordinates.
    ///
    /// Returns `None` when the polygon's definition is not a draped polygon.
    #[must_use]
    pub fn drape(&self, polygon: &Polygon, scale: DVec2) -> Option<DrapeResult> {
        self.definitions.polygon(polygon.definition)?.as_draped()?;
        let tile = self.tile;

        if DrapedPolygon::uses_node_uvs(polygon) {
            let rings: Vec<Vec<(DVec2, DVec2)>> = polygon
                .windings
                .iter()
                .map(|w| {
                    w.iter()
                        .map(|p| (tile.to_local(DVec2::new(p[0], p[1])), DVec2::new(p[2], p[3])))
                        .collect()
                })
                .collect();
            return Some(drape_polygon_with_uvs(&self.index, &rings));
        }

        let rings: Vec<Vec<DVec2>> = polygon
            .windings
            .iter()
            .map(|w| w.lon_lat().map(|p| tile.to_local(p)).collect())
            .collect();
        let origin = rings.first().and_then(|r| r.first()).copied().unwrap_or_default();
        let projection = UvProjection {
            origin,
            heading: f64::from(polygon.param),
            scale,
        };
        Some(drape_polygon(&self.index, &rings, projection))
    }
}

/// Loads tiles against one scenery library.
#[derive(Debug, Clone)]
pub struct TileLoader<L = HashMap<String, PathBuf>> {
    lookup: L,
    options: DisplayOptions,
    config: IndexConfig,
}

impl Default for TileLoader {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl<L: NameLookup> TileLoader<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            options: DisplayOptions::default(),
            config: IndexConfig::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DisplayOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn options(&self) -> DisplayOptions {
        self.options
    }

    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.config
    }

    #[must_use]
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Decodes `bytes` as `tile`. Never fails; see [`LoadedTile::error`].
    pub fn load(&self, tile: Tile, bytes: &[u8]) -> LoadedTile {
        match self.try_load(tile, bytes) {
            Ok(loaded) => loaded,
            Err(e) => LoadedTile::fallback(tile, self.options, self.config, e),
        }
    }

    /// Reads and decodes a tile file.
    pub fn load_file(&self, tile: Tile, path: impl AsRef<Path>) -> LoadedTile {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => self.load(tile, &bytes),
            Err(e) => LoadedTile::fallback(tile, self.options, self.config, e.into()),
        }
    }

    fn try_load(&self, tile: Tile, bytes: &[u8]) -> Result<LoadedTile> {
        let scene = read_scene(bytes, &self.options.read_options())?;

        if let Some((west, south, ..)) = scene.properties.bounds()
            && (south, west) != (tile.south, tile.west)
        {
            tracing::warn!(%tile, west, south, "tile bounds disagree with the requested tile");
        }

        let definitions = TileDefinitions::resolve(&scene.definitions, &self.lookup);
        let index = if self.options.contains(DisplayOptions::ELEVATION) {
            let points: Vec<DVec3> = scene.physical_points().map(|p| tile.local_point(p)).collect();
            ElevationIndex::build(tile, &points, self.config)
        } else {
            ElevationIndex::flat(tile, self.config)
        };

        tracing::info!(
            %tile,
            placements = scene.placements.len(),
            patches = scene.patches.len(),
            polygons = scene.polygons.len(),
            networks = scene.networks.len(),
            triangles = index.len(),
            "loaded tile"
        );

        Ok(LoadedTile {
            tile,
            options: self.options,
            scene,
            definitions,
            index,
            error: None,
        })
    }
}

/// Holds the one tile currently open for editing.
#[derive(Debug)]
pub struct ActiveTerrain<L = HashMap<String, PathBuf>> {
    loader: TileLoader<L>,
    bytes: Vec<u8>,
    resident: Option<LoadedTile>,
}

impl<L: NameLookup> ActiveTerrain<L> {
    pub fn new(loader: TileLoader<L>) -> Self {
        Self {
            loader,
            bytes: Vec::new(),
            resident: None,
        }
    }

    #[must_use]
    pub fn loader(&self) -> &TileLoader<L> {
        &self.loader
    }

    /// Makes `tile` resident, discarding the previous tile and its index.
    /// Activating the resident tile again with the same bytes is a no-op.
    pub fn activate(&mut self, tile: Tile, bytes: Vec<u8>) -> &LoadedTile {
        let unchanged = self
            .resident
            .as_ref()
            .is_some_and(|r| r.tile == tile && self.bytes == bytes);
        if !unchanged {
            tracing::debug!(%tile, "activating tile");
            self.bytes = bytes;
            self.resident = None;
        }
        self.resident
            .get_or_insert_with(|| self.loader.load(tile, &self.bytes))
    }

    /// Changes the display options, rebuilding the resident tile if they
    /// differ.
    pub fn set_options(&mut self, options: DisplayOptions) {
        if options == self.loader.options {
            return;
        }
        self.loader.options = options;
        if let Some(tile) = self.resident.as_ref().map(|r| r.tile) {
            tracing::debug!(%tile, ?options, "display options changed, rebuilding tile");
            self.resident = Some(self.loader.load(tile, &self.bytes));
        }
    }

    #[must_use]
    pub fn options(&self) -> DisplayOptions {
        self.loader.options
    }

    #[must_use]
    pub fn current(&self) -> Option<&LoadedTile> {
        self.resident.as_ref()
    }

    /// Height under `(lon, lat)`, or sea level with no resident tile.
    #[must_use]
    pub fn height(&self, lon_lat: DVec2) -> f64 {
        self.resident.as_ref().map_or(0.0, |r| r.height(lon_lat))
    }

    pub fn clear(&mut self) {
        self.resident = None;
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsf_decode::ErrorKind;

    #[test]
    fn garbage_falls_back_to_sea_level() {
        let loader = TileLoader::default();
        let tile = Tile::new(47, 8);
        let loaded = loader.load(tile, b"not a dsf file at all, just some text");
        assert!(loaded.is_fallback());
        assert_eq!(loaded.error.as_ref().and_then(Error::kind), Some(ErrorKind::Format));
        assert_eq!(loaded.index.len(), 2);
        assert_eq!(loaded.height(tile.centre()), 0.0);
        assert!(loaded.scene.patches.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_fallback() {
        let loader = TileLoader::default();
        let loaded = loader.load_file(Tile::new(0, 0), "/nonexistent/+00+000.dsf");
        assert!(matches!(loaded.error, Some(Error::Io(_))));
        assert_eq!(loaded.error.as_ref().and_then(Error::kind), None);
    }

    #[test]
    fn extensionless_terrain_stays_terrain() {
        let defs = Definitions {
            terrain: vec!["terrain_Water".into(), "lib/grass.ter".into()],
            objects: vec!["lib/tower.obj".into()],
            ..Definitions::default()
        };
        let lib = HashMap::from([("lib/grass.ter".to_owned(), PathBuf::from("grass.ter"))]);
        let resolved = TileDefinitions::resolve(&defs, &lib);
        assert!(matches!(resolved.terrain(0), Some(Definition::Terrain(_))));
        assert!(resolved.terrain(1).is_some_and(Definition::is_height_queryable));
        assert!(resolved.terrain(2).is_none());
        let unresolved: Vec<&str> = resolved.unresolved().map(Definition::name).collect();
        assert_eq!(unresolved, ["terrain_Water", "lib/tower.obj"]);
    }

    #[test]
    fn nothing_resident_is_sea_level() {
        let active = ActiveTerrain::new(TileLoader::default());
        assert!(active.current().is_none());
        assert_eq!(active.height(DVec2::new(8.5, 47.5)), 0.0);
    }
}
