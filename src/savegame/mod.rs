//! Mission savegame format.
//!
//! A savegame is a `FORM` container holding a `SCEN` marker and a flat list
//! of chunks: `NAME` (description), `INFO` (version and scenario state) and
//! one chunk per entity pool. Chunk lengths are big-endian; everything
//! inside a payload is little-endian.

pub mod chunk;
pub mod descriptor;
pub mod info;
pub mod reference;
pub mod restore;
pub mod save;

use std::io::{Read, Write};

use crate::config::SaveConfig;
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::mission::house::HouseHandler;
use crate::mission::map::MapHandler;
use crate::mission::structure::StructureHandler;
use crate::mission::team::TeamHandler;
use crate::mission::unit::{UnitExtensionHandler, UnitHandler};
use crate::mission::Mission;

pub use restore::LoadOutcome;

/// Four ASCII bytes naming a chunk.
pub type Tag = [u8; 4];

pub const TAG_FORM: Tag = *b"FORM";
pub const TAG_SCEN: Tag = *b"SCEN";
pub const TAG_NAME: Tag = *b"NAME";
pub const TAG_INFO: Tag = *b"INFO";
pub const TAG_PLYR: Tag = *b"PLYR";
pub const TAG_UNIT: Tag = *b"UNIT";
pub const TAG_BLDG: Tag = *b"BLDG";
pub const TAG_MAP: Tag = *b"MAP ";
pub const TAG_TEAM: Tag = *b"TEAM";
pub const TAG_ODUN: Tag = *b"ODUN";

/// Version written at the start of every `INFO` chunk.
pub const SAVEGAME_VERSION: u16 = 0x0290;

/// Printable form of a tag, keeping trailing spaces.
pub fn tag_name(tag: &Tag) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Persists one part of the mission in its own chunk.
pub trait ChunkHandler {
    fn tag(&self) -> Tag;

    /// Read the chunk payload. `r` yields at most `length` bytes; the
    /// caller repositions the stream afterwards whatever was consumed.
    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError>;

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError>;
}

/// Saves and loads missions through a fixed list of chunk handlers.
pub struct SaveManager {
    config: SaveConfig,
    handlers: Vec<Box<dyn ChunkHandler>>,
}

impl SaveManager {
    /// Handlers are written in this order after `NAME` and `INFO`.
    pub fn new(config: SaveConfig) -> Self {
        SaveManager {
            config,
            handlers: vec![
                Box::new(HouseHandler),
                Box::new(UnitHandler),
                Box::new(StructureHandler),
                Box::new(MapHandler),
                Box::new(TeamHandler),
                Box::new(UnitExtensionHandler),
            ],
        }
    }

    /// Register a handler for another tag, or replace the one for its tag.
    pub fn with_handler(mut self, handler: Box<dyn ChunkHandler>) -> Self {
        let tag = handler.tag();
        match self.handlers.iter().position(|h| h.tag() == tag) {
            Some(i) => self.handlers[i] = handler,
            None => self.handlers.push(handler),
        }
        self
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn chunk_order(&self) -> Vec<Tag> {
        self.handlers.iter().map(|h| h.tag()).collect()
    }

    fn handler(&self, tag: Tag) -> Option<&dyn ChunkHandler> {
        self.handlers.iter().find(|h| h.tag() == tag).map(|h| h.as_ref())
    }
}

impl Default for SaveManager {
    fn default() -> Self {
        Self::new(SaveConfig::default())
    }
}
