//! Map tiles and the `MAP ` chunk.

use std::io::{Read, Write};

use log::debug;

use super::{anomaly, record_count, Mission, MAP_SIZE};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};
use crate::savegame::{ChunkHandler, Tag, TAG_MAP};

pub const MAP_TILES: usize = MAP_SIZE * MAP_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    /// 9 bits
    pub ground_tile_id: u16,
    /// 7 bits
    pub overlay_tile_id: u8,
    /// 3 bits
    pub house: u8,
    pub is_unveiled: bool,
    pub has_unit: bool,
    pub has_structure: bool,
    pub has_animation: bool,
    pub has_explosion: bool,
    pub index: u8,
}

impl Tile {
    pub fn pack(&self) -> u32 {
        (self.ground_tile_id as u32 & 0x1FF)
            | (self.overlay_tile_id as u32 & 0x7F) << 9
            | (self.house as u32 & 0x07) << 16
            | (self.is_unveiled as u32) << 19
            | (self.has_unit as u32) << 20
            | (self.has_structure as u32) << 21
            | (self.has_animation as u32) << 22
            | (self.has_explosion as u32) << 23
            | (self.index as u32) << 24
    }

    pub fn unpack(word: u32) -> Self {
        Tile {
            ground_tile_id: (word & 0x1FF) as u16,
            overlay_tile_id: ((word >> 9) & 0x7F) as u8,
            house: ((word >> 16) & 0x07) as u8,
            is_unveiled: word & (1 << 19) != 0,
            has_unit: word & (1 << 20) != 0,
            has_structure: word & (1 << 21) != 0,
            has_animation: word & (1 << 22) != 0,
            has_explosion: word & (1 << 23) != 0,
            index: (word >> 24) as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    pub tiles: Vec<Tile>,
}

impl Default for Map {
    fn default() -> Self {
        Map {
            tiles: vec![Tile::default(); MAP_TILES],
        }
    }
}

impl Map {
    pub fn tile_mut(&mut self, packed: u16) -> Option<&mut Tile> {
        self.tiles.get_mut(packed as usize)
    }
}

#[derive(Debug, Default)]
pub(crate) struct TileRecord {
    position: u16,
    tile: Tile,
}

pub(crate) fn tile_record_layout() -> Layout<TileRecord> {
    Layout::<TileRecord>::new()
        .entry(Scalar::U16, |t| t.position as u32, |t, v| t.position = v as u16)
        .callback(Scalar::U32, |t, _| t.tile.pack(), |t, raw, _| t.tile = Tile::unpack(raw))
}

/// Sparse tile list: only tiles that differ from the default are stored.
pub struct MapHandler;

impl ChunkHandler for MapHandler {
    fn tag(&self) -> Tag {
        TAG_MAP
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = tile_record_layout();
        let count = record_count(TAG_MAP, length, layout.length(), ctx)?;

        for _ in 0..count {
            let mut record = TileRecord::default();
            layout
                .load(r, &mut record, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_MAP))?;

            match mission.map.tile_mut(record.position) {
                Some(tile) => *tile = record.tile,
                None => anomaly(ctx, format!("map tile {} is outside the map", record.position))?,
            }
        }

        debug!("Loaded {} map tiles", count);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = tile_record_layout();
        let mut written = 0;

        for (position, tile) in mission.map.tiles.iter().enumerate() {
            if *tile == Tile::default() {
                continue;
            }
            let record = TileRecord {
                position: position as u16,
                tile: *tile,
            };
            layout.save(w, &record, ctx)?;
            written += 1;
        }

        debug!("Saved {} map tiles", written);
        Ok(())
    }
}
