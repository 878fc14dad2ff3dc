//! Builders for synthetic containers used by the unit tests.

use crate::atom::{AtomTag, MAGIC, VERSION};

pub fn atom(tag: AtomTag, payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_disk().to_vec();
    out.extend_from_slice(&((payload.len() + 8) as u32).to_le_bytes());
    out.extend_from_slice(payload);
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

pub fn strings(values: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(v.as_bytes());
        out.push(0);
    }
    out
}

pub fn scale_table(entries: &[(f32, f32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (scale, offset) in entries {
        out.extend_from_slice(&scale.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out
}

/// Encodes one plane of 16-bit values with the given encoding selector.
pub fn encode_plane(values: &[u16], encoding: u8) -> Vec<u8> {
    let mut out = vec![encoding];
    let coded: Vec<u16> = if encoding == 1 || encoding == 3 {
        let mut prev = 0u16;
        values
            .iter()
            .map(|&v| {
                let d = v.wrapping_sub(prev);
                prev = v;
                d
            })
            .collect()
    } else {
        values.to_vec()
    };

    if encoding < 2 {
        for v in coded {
            out.extend_from_slice(&v.to_le_bytes());
        }
        return out;
    }

    let mut i = 0;
    while i < coded.len() {
        let mut run = 1;
        while i + run < coded.len() && coded[i + run] == coded[i] && run < 127 {
            run += 1;
        }
        if run >= 2 {
            out.push(0x80 | run as u8);
            out.extend_from_slice(&coded[i].to_le_bytes());
            i += run;
            continue;
        }
        let start = i;
        while i < coded.len()
            && i - start < 127
            && !(i + 1 < coded.len() && coded[i + 1] == coded[i])
        {
            i += 1;
        }
        if i == start {
            i += 1;
        }
        out.push((i - start) as u8);
        for v in &coded[start..i] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

/// A 16-bit pool payload: point count, plane count, then each plane.
pub fn pool(points: usize, planes: &[Vec<u8>]) -> Vec<u8> {
    let mut out = (points as u32).to_le_bytes().to_vec();
    out.push(planes.len() as u8);
    for p in planes {
        out.extend_from_slice(p);
    }
    out
}

/// A pool of raw planes, one `Vec` of values per plane.
pub fn raw_pool(planes: &[&[u16]]) -> Vec<u8> {
    let points = planes.first().map_or(0, |p| p.len());
    let encoded: Vec<Vec<u8>> = planes.iter().map(|p| encode_plane(p, 0)).collect();
    pool(points, &encoded)
}
