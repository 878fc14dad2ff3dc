//! Print a JSON summary of a DSF tile.
//!
//! The tile is taken from the file name (`+47+008.dsf`) unless given as a
//! second argument. Set `RUST_LOG` for more detail than `info`.
//!
//! Run: `cargo run -p dsf-scenery --features test-tools --bin dump_tile -- <file.dsf> [tile]`

use std::env;
use std::path::Path;
use std::process;

use dsf_scenery::{DisplayOptions, LoadedTile, Tile, TileLoader};
use glam::DVec2;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1).map(Path::new) else {
        eprintln!("usage: dump_tile <file.dsf> [+DD+DDD]");
        process::exit(2);
    };
    let name = args
        .get(2)
        .map(String::as_str)
        .or_else(|| path.file_name().and_then(|n| n.to_str()));
    let Some(tile) = name.and_then(Tile::from_name) else {
        eprintln!("cannot tell the tile from {}; pass it as +DD+DDD", path.display());
        process::exit(2);
    };

    let loaded = TileLoader::default()
        .with_options(DisplayOptions::all())
        .load_file(tile, path);

    match serde_json::to_string_pretty(&summary(&loaded)) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("failed to serialize summary: {e}");
            process::exit(1);
        }
    }
    if loaded.is_fallback() {
        process::exit(1);
    }
}

fn summary(loaded: &LoadedTile) -> serde_json::Value {
    let scene = &loaded.scene;
    let centre = loaded.tile.centre();
    let corner = |dlon: f64, dlat: f64| loaded.height(centre + DVec2::new(dlon, dlat));
    let names = |defs: &[dsf_scenery::Definition]| -> Vec<String> {
        defs.iter().map(|d| format!("{} ({:?})", d.name(), d.layer())).collect()
    };

    json!({
        "tile": loaded.tile.to_string(),
        "error": loaded.error.as_ref().map(ToString::to_string),
        "properties": scene.properties.iter().collect::<Vec<_>>(),
        "definitions": {
            "terrain": names(&loaded.definitions.terrain),
            "objects": names(&loaded.definitions.objects),
            "polygons": names(&loaded.definitions.polygons),
            "networks": names(&loaded.definitions.networks),
        },
        "counts": {
            "placements": scene.placements.len(),
            "patches": scene.patches.len(),
            "physical_patches": scene.patches.iter().filter(|p| p.flags.is_physical()).count(),
            "patch_triangles": scene.patches.iter().map(|p| p.triangle_count()).sum::<usize>(),
            "polygons": scene.polygons.len(),
            "networks": scene.networks.len(),
            "indexed_triangles": loaded.index.len(),
        },
        "heights": {
            "centre": corner(0.0, 0.0),
            "south_west": corner(-0.45, -0.45),
            "north_east": corner(0.45, 0.45),
        },
    })
}
