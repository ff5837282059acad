//! Units: the `UNIT` chunk and its `ODUN` extension records.

use std::io::{Read, Write};

use log::debug;

use super::object::{object_layout, Object, Tile32};
use super::pool::{HouseId, TeamRef, UnitRef};
use super::{anomaly, record_count, Mission};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};
use crate::savegame::reference::{self, PoolIndex};
use crate::savegame::{ChunkHandler, Tag, TAG_ODUN, TAG_UNIT};

pub const ROUTE_LENGTH: usize = 14;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unit {
    pub o: Object,
    pub current_destination: Tile32,
    pub origin_encoded: u16,
    pub action_id: u8,
    pub next_action_id: u8,
    pub fire_delay: u8,
    pub distance_to_destination: u16,
    pub target_attack: u16,
    pub target_move: u16,
    pub amount: u8,
    pub deviated: u8,
    pub target_last: Tile32,
    /// Current and target heading, signed 8-bit on disk.
    pub orientation: [i16; 2],
    pub speed_per_tick: u8,
    pub speed_remainder: u8,
    pub speed: u8,
    pub moving_speed: u8,
    pub wobble_index: u8,
    pub sprite_offset: i16,
    pub blink_counter: u8,
    pub team: Option<TeamRef>,
    pub timer: u16,
    pub route: [u8; ROUTE_LENGTH],
    /// Absolute tick of the last shot, stored relative to the save clock.
    pub last_fire_tick: u32,
    /// Extension data kept in the `ODUN` chunk.
    pub deviated_house: HouseId,
    pub fire_twice_flip: u8,
}

pub(crate) fn unit_layout() -> Layout<Unit> {
    Layout::<Unit>::new()
        .nested(object_layout(), |u| &u.o, |u| &mut u.o)
        .entry(
            Scalar::U16,
            |u| u.current_destination.x as u32,
            |u, v| u.current_destination.x = v as u16,
        )
        .entry(
            Scalar::U16,
            |u| u.current_destination.y as u32,
            |u, v| u.current_destination.y = v as u16,
        )
        .entry(Scalar::U16, |u| u.origin_encoded as u32, |u, v| u.origin_encoded = v as u16)
        .entry(Scalar::U8, |u| u.action_id as u32, |u, v| u.action_id = v as u8)
        .entry(Scalar::U8, |u| u.next_action_id as u32, |u, v| u.next_action_id = v as u8)
        .entry(Scalar::U8, |u| u.fire_delay as u32, |u, v| u.fire_delay = v as u8)
        .empty(Scalar::U8, 1)
        .entry(
            Scalar::U16,
            |u| u.distance_to_destination as u32,
            |u, v| u.distance_to_destination = v as u16,
        )
        .entry(Scalar::U16, |u| u.target_attack as u32, |u, v| u.target_attack = v as u16)
        .entry(Scalar::U16, |u| u.target_move as u32, |u, v| u.target_move = v as u16)
        .entry(Scalar::U8, |u| u.amount as u32, |u, v| u.amount = v as u8)
        .entry(Scalar::U8, |u| u.deviated as u32, |u, v| u.deviated = v as u8)
        .entry(Scalar::U16, |u| u.target_last.x as u32, |u, v| u.target_last.x = v as u16)
        .entry(Scalar::U16, |u| u.target_last.y as u32, |u, v| u.target_last.y = v as u16)
        .entry2(
            Scalar::I8,
            Scalar::I16,
            |u| u.orientation[0] as u32,
            |u, v| u.orientation[0] = v as i16,
        )
        .entry2(
            Scalar::I8,
            Scalar::I16,
            |u| u.orientation[1] as u32,
            |u, v| u.orientation[1] = v as i16,
        )
        .entry(Scalar::U8, |u| u.speed_per_tick as u32, |u, v| u.speed_per_tick = v as u8)
        .entry(Scalar::U8, |u| u.speed_remainder as u32, |u, v| u.speed_remainder = v as u8)
        .entry(Scalar::U8, |u| u.speed as u32, |u, v| u.speed = v as u8)
        .entry(Scalar::U8, |u| u.moving_speed as u32, |u, v| u.moving_speed = v as u8)
        .entry(Scalar::U8, |u| u.wobble_index as u32, |u, v| u.wobble_index = v as u8)
        .entry2(
            Scalar::I8,
            Scalar::I16,
            |u| u.sprite_offset as u32,
            |u, v| u.sprite_offset = v as i16,
        )
        .entry(Scalar::U8, |u| u.blink_counter as u32, |u, v| u.blink_counter = v as u8)
        .empty(Scalar::U8, 1)
        .callback(
            Scalar::U16,
            |u, _| reference::encode(u.team) as u32,
            |u, raw, _| u.team = reference::decode(raw as u16),
        )
        .entry(Scalar::U16, |u| u.timer as u32, |u, v| u.timer = v as u16)
        .array(
            Scalar::U8,
            ROUTE_LENGTH,
            |u, i| u.route[i] as u32,
            |u, i, v| u.route[i] = v as u8,
        )
        .callback(
            Scalar::U32,
            |u, ctx| reference::clock_delta(ctx.clock(), u.last_fire_tick),
            |u, raw, ctx| u.last_fire_tick = reference::clock_absolute(ctx.clock(), raw),
        )
}

pub struct UnitHandler;

impl ChunkHandler for UnitHandler {
    fn tag(&self) -> Tag {
        TAG_UNIT
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = unit_layout();
        let count = record_count(TAG_UNIT, length, layout.length(), ctx)?;
        let mut loaded = 0;

        for _ in 0..count {
            let mut unit = Unit::default();
            layout
                .load(r, &mut unit, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_UNIT))?;

            if unit.o.index as usize >= UnitRef::CAPACITY {
                anomaly(ctx, format!("unit index {} exceeds the pool", unit.o.index))?;
                continue;
            }
            if !unit.o.validate("unit", ctx)? {
                continue;
            }
            let slot = UnitRef(unit.o.index);
            if let Ok(Some(_)) = mission.units.insert(slot, unit) {
                anomaly(ctx, format!("unit {} stored twice", slot.0))?;
            }
            loaded += 1;
        }

        debug!("Loaded {} units", loaded);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = unit_layout();
        for (_, unit) in mission.units.iter() {
            layout.save(w, unit, ctx)?;
        }
        debug!("Saved {} units", mission.units.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct UnitExtension {
    index: u16,
    deviated_house: u8,
    fire_twice_flip: u8,
}

pub(crate) fn unit_extension_layout() -> Layout<UnitExtension> {
    Layout::<UnitExtension>::new()
        .entry(Scalar::U16, |x| x.index as u32, |x, v| x.index = v as u16)
        .entry(Scalar::U8, |x| x.deviated_house as u32, |x, v| x.deviated_house = v as u8)
        .entry(Scalar::U8, |x| x.fire_twice_flip as u32, |x, v| x.fire_twice_flip = v as u8)
}

/// Secondary per-unit records, applied on top of units already loaded.
pub struct UnitExtensionHandler;

impl ChunkHandler for UnitExtensionHandler {
    fn tag(&self) -> Tag {
        TAG_ODUN
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = unit_extension_layout();
        let count = record_count(TAG_ODUN, length, layout.length(), ctx)?;

        for _ in 0..count {
            let mut ext = UnitExtension::default();
            layout
                .load(r, &mut ext, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_ODUN))?;

            match mission.units.get_mut(UnitRef(ext.index)) {
                Some(unit) => {
                    unit.deviated_house = HouseId(ext.deviated_house);
                    unit.fire_twice_flip = ext.fire_twice_flip;
                }
                None => anomaly(ctx, format!("extension record for missing unit {}", ext.index))?,
            }
        }

        debug!("Loaded {} unit extensions", count);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = unit_extension_layout();
        for (r, unit) in mission.units.iter() {
            let ext = UnitExtension {
                index: r.0,
                deviated_house: unit.deviated_house.0,
                fire_twice_flip: unit.fire_twice_flip,
            };
            layout.save(w, &ext, ctx)?;
        }
        Ok(())
    }
}
