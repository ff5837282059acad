use std::io;

use thiserror::Error;

use crate::savegame::{tag_name, Tag};

/// Errors raised while framing, reading or writing a mission savegame.
#[derive(Error, Debug)]
pub enum SaveError {
    /// Underlying stream failure (open, short write, seek).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with `FORM ... SCEN`.
    #[error("Not a mission savegame (missing FORM/SCEN header)")]
    MagicMismatch,

    /// A chunk the loader requires is absent.
    #[error("Missing required '{}' chunk", tag_name(.0))]
    MissingChunk(Tag),

    /// The INFO chunk carries savegame version 0.
    #[error("Savegame version is 0")]
    InvalidVersion,

    /// The savegame was written by an older, incompatible build.
    #[error("Savegame version 0x{found:04x} is not supported")]
    VersionMismatch { found: u16 },

    /// A chunk's declared length disagrees with its record layout.
    #[error("'{}' chunk is {} bytes, expected {}", tag_name(.tag), .found, .expected)]
    LengthMismatch { tag: Tag, expected: usize, found: u32 },

    /// The stream ended inside a chunk.
    #[error("Unexpected end of file in '{}' chunk", tag_name(.0))]
    Truncated(Tag),

    /// A collaborator found data it refuses to repair.
    #[error("Corrupt savegame: {0}")]
    Corrupt(String),
}

impl SaveError {
    /// Map a short read inside `tag` to `Truncated`, keep everything else.
    pub fn in_chunk(e: io::Error, tag: Tag) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SaveError::Truncated(tag)
        } else {
            SaveError::Io(e)
        }
    }
}
