//! Terrain height queries and polygon draping for DSF tiles.
//!
//! The terrain mesh of one tile goes into an [`ElevationIndex`], a fixed
//! grid of triangle buckets answering point heights. Polygons such as
//! pavement, draped orthophotos or exclusion zones are then cut against
//! that mesh by a [`Tessellator`], producing triangles whose every vertex
//! sits on the terrain.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **Shared index**: [`ElevationIndex`] is immutable after build and `Sync`
//! - **Per-call tessellation**: Each draping call owns its own context
//!
//! # Key functions
//!
//! - [`ElevationIndex::build`]: Index a tile's triangles
//! - [`ElevationIndex::height`]: Point height query
//! - [`ElevationIndex::box_query`]: Triangles near a bounding box
//! - [`drape_polygon`], [`drape_polygon_with_uvs`], [`drape_batch`]: Drape polygons
//! - [`drape_pavements`]: Drape airport pavement records

mod diagnostic;

pub mod drape;
pub mod index;
pub mod pavement;
pub mod tessellate;
pub mod tile;

pub use diagnostic::{Attribute, Degenerate, Diagnostic};
pub use drape::{drape_batch, drape_polygon, drape_polygon_with_uvs};
pub use index::{ElevationIndex, IndexConfig, TriangleRecord};
pub use pavement::{Pavement, drape_pavements};
pub use tessellate::combine::{CombineInput, combine_rule};
pub use tessellate::vertex::{DrapedVertex, Height, Origin, TessVertex, TexCoord};
pub use tessellate::{DrapeResult, DrapedTriangle, HeightState, Phase, Tessellator, UvProjection, UvSource};
pub use tile::{ONE_DEGREE, Tile};
