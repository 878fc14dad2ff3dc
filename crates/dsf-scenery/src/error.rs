//! Tile loading errors.

use thiserror::Error;

use dsf_decode::{DecodeError, ErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a tile could not be loaded.
#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The decode classification, or `None` for I/O failures.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Decode(e) => Some(e.kind()),
            Self::Io(_) => None,
        }
    }
}
