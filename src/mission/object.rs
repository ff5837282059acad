//! State shared by units and structures.

use super::pool::HouseId;
use super::script::{script_layout, ScriptEngine};
use super::{anomaly, MAP_SIZE};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};

pub const FLAG_USED: u32 = 0x0001;
pub const FLAG_ALLOCATED: u32 = 0x0002;
pub const FLAG_NOT_ON_MAP: u32 = 0x0004;

/// Map position in 1/256 tile steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile32 {
    pub x: u16,
    pub y: u16,
}

impl Tile32 {
    pub fn from_tile(tile_x: u16, tile_y: u16) -> Self {
        Tile32 {
            x: (tile_x << 8) | 0x80,
            y: (tile_y << 8) | 0x80,
        }
    }

    pub fn on_map(self) -> bool {
        ((self.x >> 8) as usize) < MAP_SIZE && ((self.y >> 8) as usize) < MAP_SIZE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    pub index: u16,
    pub type_id: u8,
    pub linked_id: u8,
    pub flags: u32,
    pub house: HouseId,
    pub seen_by_houses: u8,
    pub position: Tile32,
    pub hitpoints: u16,
    pub script: ScriptEngine,
}

impl Object {
    /// Check fields that later systems index with. Repairs in place when
    /// the context allows it; `Ok(false)` means the object should be dropped.
    pub fn validate(&mut self, kind: &str, ctx: &SaveContext) -> Result<bool, SaveError> {
        if !self.house.is_valid() {
            anomaly(
                ctx,
                format!("{} {} belongs to invalid house {}", kind, self.index, self.house.0),
            )?;
            return Ok(false);
        }
        if self.flags & FLAG_NOT_ON_MAP == 0 && !self.position.on_map() {
            anomaly(
                ctx,
                format!(
                    "{} {} is off the map at ({}, {})",
                    kind, self.index, self.position.x, self.position.y
                ),
            )?;
            self.flags |= FLAG_NOT_ON_MAP;
        }
        if !self.script.pointers_valid() {
            anomaly(ctx, format!("{} {} has a broken script stack", kind, self.index))?;
            self.script.reset_stack();
        }
        Ok(true)
    }
}

pub fn object_layout() -> Layout<Object> {
    Layout::<Object>::new()
        .entry(Scalar::U16, |o| o.index as u32, |o, v| o.index = v as u16)
        .entry(Scalar::U8, |o| o.type_id as u32, |o, v| o.type_id = v as u8)
        .entry(Scalar::U8, |o| o.linked_id as u32, |o, v| o.linked_id = v as u8)
        .entry(Scalar::U32, |o| o.flags, |o, v| o.flags = v)
        .entry(Scalar::U8, |o| o.house.0 as u32, |o, v| o.house = HouseId(v as u8))
        .entry(Scalar::U8, |o| o.seen_by_houses as u32, |o, v| o.seen_by_houses = v as u8)
        .entry(Scalar::U16, |o| o.position.x as u32, |o, v| o.position.x = v as u16)
        .entry(Scalar::U16, |o| o.position.y as u32, |o, v| o.position.y = v as u16)
        .entry(Scalar::U16, |o| o.hitpoints as u32, |o, v| o.hitpoints = v as u16)
        .nested(script_layout(), |o| &o.script, |o| &mut o.script)
}
