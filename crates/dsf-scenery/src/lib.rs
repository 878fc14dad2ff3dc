//! Load DSF scenery tiles for editing and draping.
//!
//! This crate ties [`dsf_decode`] and [`dsf_terrain`] together at the level
//! an editor works at: one tile at a time. A tile's bytes are decoded, its
//! definitions are classified and resolved against a caller-supplied
//! library, and its physical terrain is indexed for height queries. A tile
//! that fails to decode is reported once and replaced by flat sea-level
//! terrain, so the rest of the editor keeps working.
//!
//! # Design principles
//!
//! - **One resident tile**: [`ActiveTerrain`] keeps a single tile and rebuilds
//!   its index when the tile or the display options change
//! - **Fail soft**: Fatal decode errors end up on [`LoadedTile::error`], never
//!   as a missing tile
//! - **Closed definitions**: [`Definition`] is an enum over the kinds the
//!   placement and draping code actually handles
//!
//! # Key functions
//!
//! - [`TileLoader::load`]: Decode bytes into a [`LoadedTile`]
//! - [`TileLoader::load_file`]: Same, reading the tile from disk
//! - [`ActiveTerrain::activate`]: Switch the resident tile
//! - [`LoadedTile::drape`]: Drape one of the tile's polygons onto its terrain

mod error;

pub mod definition;
pub mod display;
pub mod loader;

pub use definition::{Definition, DrapedPolygon, Layer, NameLookup, Resource};
pub use display::DisplayOptions;
pub use error::{Error, Result};
pub use loader::{ActiveTerrain, LoadedTile, TileDefinitions, TileLoader};

pub use dsf_decode::{DecodeError, ErrorKind, Scene};
pub use dsf_terrain::{DrapeResult, ElevationIndex, IndexConfig, Tile};
