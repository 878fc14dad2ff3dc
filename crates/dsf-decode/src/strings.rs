//! String tables: properties and definition names.

use crate::atom::{Atom, AtomTag};
use crate::error::{DecodeError, DecodeResult};

/// Splits a NUL-terminated string table. Bytes after the last NUL are ignored.
pub fn read_string_table(atom: &Atom<'_>) -> DecodeResult<Vec<String>> {
    let mut out = Vec::new();
    let mut rest = atom.payload;
    while let Some(end) = rest.iter().position(|&b| b == 0) {
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|_| DecodeError::InvalidString { tag: atom.tag })?;
        out.push(s.to_owned());
        rest = &rest[end + 1..];
    }
    Ok(out)
}

/// Key/value pairs from the `HEAD/PROP` atom, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pairs: Vec<(String, String)>,
}

impl Properties {
    pub fn from_table(table: Vec<String>) -> DecodeResult<Self> {
        if table.len() % 2 == 1 {
            return Err(DecodeError::UnpairedProperty(table.len()));
        }
        let mut iter = table.into_iter();
        let mut pairs = Vec::new();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((k, v));
        }
        Ok(Self { pairs })
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`; exclusion zones may repeat.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn integer(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.trim().parse::<f64>().ok()).map(|v| v as i32)
    }

    /// `(west, south, east, north)` in whole degrees, when all four are present.
    #[must_use]
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        Some((
            self.integer("sim/west")?,
            self.integer("sim/south")?,
            self.integer("sim/east")?,
            self.integer("sim/north")?,
        ))
    }

    /// Whether `sim/overlay` is set to 1.
    #[must_use]
    pub fn is_overlay(&self) -> bool {
        self.get("sim/overlay") == Some("1")
    }

    /// Exclusion zones as `(kind, value)`, e.g. `("obj", "-1.0/50.0/-0.9/50.1")`.
    pub fn exclusions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(k, v)| k.strip_prefix("sim/exclude_").map(|kind| (kind, v)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Name tables from the `DEFN` atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub terrain: Vec<String>,
    pub objects: Vec<String>,
    pub polygons: Vec<String>,
    pub networks: Vec<String>,
    pub rasters: Vec<String>,
}

impl Definitions {
    /// Reads every known table inside a `DEFN` group; unknown tables are skipped.
    pub fn from_group(group: &Atom<'_>) -> DecodeResult<Self> {
        let mut defs = Self::default();
        for child in group.children() {
            let child = child?;
            let table = match child.tag {
                AtomTag::TERT => &mut defs.terrain,
                AtomTag::OBJT => &mut defs.objects,
                AtomTag::POLY => &mut defs.polygons,
                AtomTag::NETW => &mut defs.networks,
                AtomTag::DEMN => &mut defs.rasters,
                other => {
                    tracing::trace!(tag = %other, "skipping unknown definition table");
                    continue;
                }
            };
            *table = read_string_table(&child)?;
        }
        Ok(defs)
    }

    pub(crate) fn lookup(table: &'static str, names: &[String], index: u32) -> DecodeResult<()> {
        if (index as usize) < names.len() {
            Ok(())
        } else {
            Err(DecodeError::InvalidDefinition {
                table,
                index,
                count: names.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteReader;
    use crate::testutil::{atom, strings};

    fn parse(bytes: &[u8]) -> Atom<'_> {
        crate::atom::Atoms::new(ByteReader::new(bytes))
            .next()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn string_table_splits_on_nul() {
        let bytes = atom(AtomTag::TERT, b"terrain_Water\0lib/a.ter\0junk");
        let table = read_string_table(&parse(&bytes)).unwrap();
        assert_eq!(table, ["terrain_Water", "lib/a.ter"]);
    }

    #[test]
    fn string_table_rejects_invalid_utf8() {
        let bytes = atom(AtomTag::OBJT, &[0xff, 0xfe, 0]);
        assert!(matches!(
            read_string_table(&parse(&bytes)),
            Err(DecodeError::InvalidString { .. })
        ));
    }

    #[test]
    fn properties_expose_bounds_and_overlay() {
        let table = [
            "sim/west", "-1", "sim/south", "51", "sim/east", "0", "sim/north", "52",
            "sim/overlay", "1", "sim/exclude_obj", "-0.5/51.1/-0.4/51.2",
        ];
        let props =
            Properties::from_table(table.iter().map(|s| (*s).to_owned()).collect()).unwrap();
        assert_eq!(props.bounds(), Some((-1, 51, 0, 52)));
        assert!(props.is_overlay());
        assert_eq!(
            props.exclusions().collect::<Vec<_>>(),
            [("obj", "-0.5/51.1/-0.4/51.2")]
        );
    }

    #[test]
    fn odd_property_table_is_rejected() {
        assert!(matches!(
            Properties::from_table(vec!["sim/west".into()]),
            Err(DecodeError::UnpairedProperty(1))
        ));
    }

    #[test]
    fn definitions_skip_unknown_tables() {
        let inner = [
            atom(AtomTag::TERT, &strings(&["a.ter", "b.ter"])),
            atom(AtomTag(*b"XTRA"), b"ignored"),
            atom(AtomTag::OBJT, &strings(&["tower.obj"])),
        ]
        .concat();
        let group_bytes = atom(AtomTag::DEFN, &inner);
        let defs = Definitions::from_group(&parse(&group_bytes)).unwrap();
        assert_eq!(defs.terrain, ["a.ter", "b.ter"]);
        assert_eq!(defs.objects, ["tower.obj"]);
        assert!(defs.polygons.is_empty());
    }
}
