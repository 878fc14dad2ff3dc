//! Synthetic DSF tiles for the integration tests.

#![allow(dead_code)]

use dsf_decode::atom::{AtomTag, MAGIC, VERSION};

pub fn atom(tag: AtomTag, payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_disk().to_vec();
    out.extend_from_slice(&((payload.len() + 8) as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn group(tag: AtomTag, children: &[Vec<u8>]) -> Vec<u8> {
    atom(tag, &children.concat())
}

pub fn strings(values: &[&str]) -> Vec<u8> {
    values.iter().flat_map(|v| v.bytes().chain([0])).collect()
}

pub fn scale_table(entries: &[(f32, f32)]) -> Vec<u8> {
    entries
        .iter()
        .flat_map(|(scale, offset)| scale.to_le_bytes().into_iter().chain(offset.to_le_bytes()))
        .collect()
}

/// A 16-bit pool of raw planes.
pub fn pool16(planes: &[&[u16]]) -> Vec<u8> {
    let points = planes.first().map_or(0, |p| p.len());
    let mut out = (points as u32).to_le_bytes().to_vec();
    out.push(planes.len() as u8);
    for plane in planes {
        out.push(0);
        out.extend(plane.iter().flat_map(|v| v.to_le_bytes()));
    }
    out
}

/// A 32-bit pool of raw planes.
pub fn pool32(planes: &[&[u32]]) -> Vec<u8> {
    let points = planes.first().map_or(0, |p| p.len());
    let mut out = (points as u32).to_le_bytes().to_vec();
    out.push(planes.len() as u8);
    for plane in planes {
        out.push(0);
        out.extend(plane.iter().flat_map(|v| v.to_le_bytes()));
    }
    out
}

pub fn container(atoms: &[Vec<u8>]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&VERSION.to_le_bytes());
    for a in atoms {
        out.extend_from_slice(a);
    }
    out.extend_from_slice(&[0; 16]);
    out
}

/// Ground elevation at the south edge of [`ramp_tile`].
pub const SOUTH_ELEVATION: f64 = 100.0;
/// Ground elevation at the north edge of [`ramp_tile`].
pub const NORTH_ELEVATION: f64 = 300.0;

/// Expected height on [`ramp_tile`] at a latitude within tile `(0, 0)`.
pub fn ramp_height(lat: f64) -> f64 {
    SOUTH_ELEVATION + (NORTH_ELEVATION - SOUTH_ELEVATION) * lat
}

/// Tile `+00+000`: one physical patch rising from south to north, one
/// object, one draped polygon around the centre, one ortho polygon with
/// per-node texture coordinates and one road chain.
pub fn ramp_tile() -> Vec<u8> {
    let head = group(
        AtomTag::HEAD,
        &[atom(
            AtomTag::PROP,
            &strings(&["sim/west", "0", "sim/south", "0", "sim/east", "1", "sim/north", "1"]),
        )],
    );
    let defn = group(
        AtomTag::DEFN,
        &[
            atom(AtomTag::TERT, &strings(&["lib/terrain/grass.ter"])),
            atom(AtomTag::OBJT, &strings(&["lib/objects/tower.obj"])),
            atom(AtomTag::POLY, &strings(&["lib/airport/concrete.pol", "lib/forests/pines.for"])),
            atom(AtomTag::NETW, &strings(&["lib/g10/roads.net"])),
        ],
    );

    // Pool 0: the whole tile with elevation kept raw. Pool 1: a 0.01 degree
    // square around the centre. Pool 2: the same square with s/t planes.
    let (lo, hi) = (0u16, u16::MAX);
    let south = SOUTH_ELEVATION as u16;
    let north = NORTH_ELEVATION as u16;
    let geod = group(
        AtomTag::GEOD,
        &[
            atom(AtomTag::POOL, &pool16(&[&[lo, hi, hi, lo], &[lo, lo, hi, hi], &[south, south, north, north]])),
            atom(AtomTag::SCAL, &scale_table(&[(1.0, 0.0), (1.0, 0.0), (0.0, 0.0)])),
            atom(AtomTag::POOL, &pool16(&[&[lo, hi, hi, lo], &[lo, lo, hi, hi]])),
            atom(AtomTag::SCAL, &scale_table(&[(0.01, 0.495), (0.01, 0.495)])),
            atom(
                AtomTag::POOL,
                &pool16(&[&[lo, hi, hi, lo], &[lo, lo, hi, hi], &[lo, hi, hi, lo], &[lo, lo, hi, hi]]),
            ),
            atom(AtomTag::SCAL, &scale_table(&[(0.01, 0.495), (0.01, 0.495), (1.0, 0.0), (1.0, 0.0)])),
            atom(AtomTag::PO32, &pool32(&[&[0, u32::MAX], &[0, u32::MAX]])),
            atom(AtomTag::SC32, &scale_table(&[(1.0, 0.0), (1.0, 0.0)])),
        ],
    );

    let cmds: Vec<u8> = [
        &[1, 0, 0][..],         // pool 0
        &[3, 0],                // terrain 0
        &[17, 1],               // physical patch
        &[31, 0, 0, 4, 0],      // fan over [0, 4)
        &[7, 0, 0],             // tower at the south-west corner
        &[1, 1, 0],             // pool 1
        &[12, 30, 0, 4, 0, 0, 1, 0, 2, 0, 3, 0], // concrete, heading 30
        &[3, 1],                // pines
        &[13, 50, 0, 0, 0, 4, 0], // forest over the same square
        &[1, 2, 0],             // pool 2
        &[3, 0],                // concrete
        &[12, 0xff, 0xff, 4, 0, 0, 1, 0, 2, 0, 3, 0], // ortho with node uvs
        &[1, 0, 0],             // pool 0 for the 32-bit chain
        &[6, 2],                // road subtype
        &[11, 2, 0, 0, 0, 0, 1, 0, 0, 0], // chain over points 0 and 1
    ]
    .concat();

    container(&[head, defn, geod, atom(AtomTag::CMDS, &cmds)])
}
