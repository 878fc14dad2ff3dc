//! Decode error types.

use thiserror::Error;

use crate::atom::AtomTag;

/// Result type used throughout the decoder.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Broad classification of a [`DecodeError`].
///
/// Every variant is fatal for the tile being decoded; the kind only tells the
/// caller which part of the container was at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Magic, version, atom structure or payload layout mismatch.
    Format,
    /// An opcode outside the recognized command set.
    UnrecognizedCommand,
    /// Pools and scale tables disagree.
    PoolConsistency,
}

/// Errors raised while decoding a DSF container.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad magic signature {found:?}")]
    BadMagic { found: Vec<u8> },

    #[error("unsupported container version {0}")]
    UnsupportedVersion(i32),

    #[error("container is {len} bytes, too short for header and footer")]
    Truncated { len: usize },

    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("atom {tag} at offset {offset} declares length {length}, but {available} bytes remain")]
    AtomOverrun {
        tag: AtomTag,
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("required atom {0} is missing")]
    MissingAtom(AtomTag),

    #[error("string table in {tag} is not valid UTF-8")]
    InvalidString { tag: AtomTag },

    #[error("property table has an odd number of strings ({0})")]
    UnpairedProperty(usize),

    #[error("unknown plane encoding {encoding} in plane {plane}")]
    UnknownPlaneEncoding { encoding: u8, plane: usize },

    #[error("run-length record produces {produced} values, pool only holds {expected}")]
    RunOverflow { produced: usize, expected: usize },

    #[error("plane {plane} holds {len} values for a pool of {points} points")]
    PlaneLength { plane: usize, len: usize, points: usize },

    #[error("pool declares {planes} planes but its scale table has {scales} entries")]
    PlaneCountMismatch { planes: usize, scales: usize },

    #[error("{pools} coordinate pools but {scales} scale tables")]
    PoolCountMismatch { pools: usize, scales: usize },

    #[error("scale atom length {0} is not a whole number of (scale, offset) pairs")]
    RaggedScaleTable(usize),

    #[error("unrecognized command {opcode} at offset {offset}")]
    UnrecognizedCommand { opcode: u8, offset: usize },

    #[error("pool {index} selected but only {count} pools exist")]
    InvalidPool { index: usize, count: usize },

    #[error("no coordinate pool selected")]
    NoPoolSelected,

    #[error("point {index} out of range for pool {pool} with {count} points")]
    InvalidPoint {
        pool: usize,
        index: usize,
        count: usize,
    },

    #[error("definition {index} out of range for {table} table with {count} entries")]
    InvalidDefinition {
        table: &'static str,
        index: u32,
        count: usize,
    },
}

impl DecodeError {
    /// Returns the broad classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnrecognizedCommand { .. } => ErrorKind::UnrecognizedCommand,
            Self::PlaneCountMismatch { .. } | Self::PoolCountMismatch { .. } => {
                ErrorKind::PoolConsistency
            }
            _ => ErrorKind::Format,
        }
    }
}
