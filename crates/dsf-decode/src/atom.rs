//! Container header and atom walking.
//!
//! A DSF file is `XPLNEDSF`, an `i32` version, a sequence of atoms and a
//! 16-byte MD5 footer. Each atom is an `i32` tag (stored byte-reversed), a
//! `u32` length that includes the 8-byte atom header, and a payload. Group
//! atoms (`HEAD`, `DEFN`, `GEOD`, `DEMS`) contain further atoms.

use std::fmt;

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// Magic signature at the start of every container.
pub const MAGIC: &[u8; 8] = b"XPLNEDSF";

/// The only master format version in use.
pub const VERSION: i32 = 1;

/// Magic plus version.
pub const HEADER_LEN: usize = 12;

/// Trailing MD5 digest; not verified.
pub const FOOTER_LEN: usize = 16;

/// Tag plus length.
pub const ATOM_HEADER_LEN: usize = 8;

/// A four character atom code, held in reading order (e.g. `b"HEAD"`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomTag(pub [u8; 4]);

impl AtomTag {
    pub const HEAD: Self = Self(*b"HEAD");
    pub const PROP: Self = Self(*b"PROP");
    pub const DEFN: Self = Self(*b"DEFN");
    pub const TERT: Self = Self(*b"TERT");
    pub const OBJT: Self = Self(*b"OBJT");
    pub const POLY: Self = Self(*b"POLY");
    pub const NETW: Self = Self(*b"NETW");
    pub const DEMN: Self = Self(*b"DEMN");
    pub const GEOD: Self = Self(*b"GEOD");
    pub const POOL: Self = Self(*b"POOL");
    pub const SCAL: Self = Self(*b"SCAL");
    pub const PO32: Self = Self(*b"PO32");
    pub const SC32: Self = Self(*b"SC32");
    pub const DEMS: Self = Self(*b"DEMS");
    pub const CMDS: Self = Self(*b"CMDS");

    /// Converts the on-disk byte order (reversed) into a tag.
    #[must_use]
    pub fn from_disk(bytes: [u8; 4]) -> Self {
        Self([bytes[3], bytes[2], bytes[1], bytes[0]])
    }

    /// The on-disk byte order for this tag.
    #[must_use]
    pub fn to_disk(self) -> [u8; 4] {
        let [a, b, c, d] = self.0;
        [d, c, b, a]
    }
}

impl fmt::Display for AtomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AtomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomTag({self})")
    }
}

/// Tag and total length of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub tag: AtomTag,
    /// Total length including the 8-byte header.
    pub length: usize,
}

impl AtomHeader {
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.length - ATOM_HEADER_LEN
    }
}

/// Reads an atom header, leaving `reader` at the start of the payload.
///
/// The caller must consume exactly [`AtomHeader::payload_len`] bytes or seek
/// past them. A declared length that runs past the end of the enclosing
/// group is a format error.
pub fn read_atom(reader: &mut ByteReader<'_>) -> DecodeResult<AtomHeader> {
    let offset = reader.absolute_position();
    let available = reader.remaining();
    let raw = reader.bytes(4)?;
    let tag = AtomTag::from_disk([raw[0], raw[1], raw[2], raw[3]]);
    let length = reader.read_u32()? as usize;
    if length < ATOM_HEADER_LEN || length > available {
        return Err(DecodeError::AtomOverrun {
            tag,
            offset,
            length,
            available,
        });
    }
    Ok(AtomHeader { tag, length })
}

/// A decoded atom borrowing its payload from the container bytes.
#[derive(Debug, Clone, Copy)]
pub struct Atom<'a> {
    pub tag: AtomTag,
    /// Absolute offset of the atom header.
    pub offset: usize,
    pub payload: &'a [u8],
}

impl<'a> Atom<'a> {
    /// A reader over the payload, reporting whole-file offsets.
    #[must_use]
    pub fn reader(&self) -> ByteReader<'a> {
        ByteReader::with_base(self.payload, self.offset + ATOM_HEADER_LEN)
    }

    /// Iterates the atoms nested in this group atom.
    #[must_use]
    pub fn children(&self) -> Atoms<'a> {
        Atoms::new(self.reader())
    }
}

/// Iterator over consecutive atoms until the end of a group.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct Atoms<'a> {
    reader: ByteReader<'a>,
    failed: bool,
}

impl<'a> Atoms<'a> {
    #[must_use]
    pub fn new(reader: ByteReader<'a>) -> Self {
        Self {
            reader,
            failed: false,
        }
    }

    fn next_atom(&mut self) -> DecodeResult<Atom<'a>> {
        let offset = self.reader.absolute_position();
        let header = read_atom(&mut self.reader)?;
        let payload = self.reader.bytes(header.payload_len())?;
        tracing::trace!(tag = %header.tag, offset, len = header.length, "atom");
        Ok(Atom {
            tag: header.tag,
            offset,
            payload,
        })
    }
}

impl<'a> Iterator for Atoms<'a> {
    type Item = DecodeResult<Atom<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let result = self.next_atom();
        self.failed = result.is_err();
        Some(result)
    }
}

/// A validated container: header checked, root atoms delimited.
#[derive(Debug, Clone, Copy)]
pub struct Container<'a> {
    pub version: i32,
    root: &'a [u8],
}

impl<'a> Container<'a> {
    /// Iterates the top-level atoms.
    #[must_use]
    pub fn atoms(&self) -> Atoms<'a> {
        Atoms::new(ByteReader::with_base(self.root, HEADER_LEN))
    }
}

/// Validates the magic signature, version and top-level `HEAD` atom.
///
/// The whole root atom list is walked once so that structural damage is
/// reported here rather than halfway through decoding.
pub fn read_header(data: &[u8]) -> DecodeResult<Container<'_>> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic {
            found: data.iter().take(MAGIC.len()).copied().collect(),
        });
    }
    if data.len() < HEADER_LEN + FOOTER_LEN {
        return Err(DecodeError::Truncated { len: data.len() });
    }

    let mut reader = ByteReader::new(data);
    reader.skip(MAGIC.len())?;
    let version = reader.read_i32()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let container = Container {
        version,
        root: &data[HEADER_LEN..data.len() - FOOTER_LEN],
    };

    let mut has_head = false;
    for atom in container.atoms() {
        has_head |= atom?.tag == AtomTag::HEAD;
    }
    if !has_head {
        return Err(DecodeError::MissingAtom(AtomTag::HEAD));
    }
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{atom, container};

    #[test]
    fn tags_are_reversed_on_disk() {
        assert_eq!(AtomTag::from_disk(*b"DAEH"), AtomTag::HEAD);
        assert_eq!(AtomTag::HEAD.to_disk(), *b"DAEH");
        assert_eq!(AtomTag::GEOD.to_string(), "GEOD");
    }

    #[test]
    fn header_accepts_minimal_container() {
        let data = container(&[atom(AtomTag::HEAD, &[])]);
        let parsed = read_header(&data).unwrap();
        assert_eq!(parsed.version, 1);
        let atoms: Vec<_> = parsed.atoms().collect::<DecodeResult<_>>().unwrap();
        assert_eq!(atoms.len(), 1);
        assert!(atoms[0].payload.is_empty());
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut data = container(&[atom(AtomTag::HEAD, &[])]);
        data[0] = b'Y';
        assert!(matches!(read_header(&data), Err(DecodeError::BadMagic { .. })));
    }

    #[test]
    fn header_rejects_other_versions() {
        let mut data = container(&[atom(AtomTag::HEAD, &[])]);
        data[8] = 2;
        assert!(matches!(
            read_header(&data),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn header_requires_head_atom() {
        let data = container(&[atom(AtomTag::DEFN, &[])]);
        assert!(matches!(
            read_header(&data),
            Err(DecodeError::MissingAtom(AtomTag::HEAD))
        ));
    }

    #[test]
    fn overlong_atom_is_fatal() {
        let mut head = atom(AtomTag::HEAD, &[1, 2, 3]);
        head[4] = 200;
        let data = container(&[head]);
        let err = read_header(&data).unwrap_err();
        assert!(matches!(err, DecodeError::AtomOverrun { length: 200, .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn nested_atoms_are_walked_to_group_end() {
        let inner = [atom(AtomTag::PROP, b"a\0b\0"), atom(AtomTag(*b"ZZZZ"), &[])].concat();
        let data = container(&[atom(AtomTag::HEAD, &inner)]);
        let parsed = read_header(&data).unwrap();
        let head = parsed.atoms().next().unwrap().unwrap();
        let children: Vec<_> = head.children().collect::<DecodeResult<_>>().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].tag, AtomTag::PROP);
        assert_eq!(children[0].offset, HEADER_LEN + ATOM_HEADER_LEN);
        assert_eq!(children[1].tag, AtomTag(*b"ZZZZ"));
    }

    #[test]
    fn read_atom_positions_at_payload() {
        let bytes = atom(AtomTag::CMDS, &[9, 9]);
        let mut reader = ByteReader::new(&bytes);
        let header = read_atom(&mut reader).unwrap();
        assert_eq!(header.tag, AtomTag::CMDS);
        assert_eq!(header.payload_len(), 2);
        assert_eq!(reader.position(), ATOM_HEADER_LEN);
    }
}
