//! Houses and the `PLYR` chunk.

use std::io::{Read, Write};

use log::{debug, info};

use super::object::Tile32;
use super::pool::{HouseId, UnitRef};
use super::{anomaly, record_count, Mission};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};
use crate::savegame::reference;
use crate::savegame::{ChunkHandler, Tag, TAG_PLYR};

pub const HOUSE_FLAG_USED: u16 = 0x0001;
pub const HOUSE_FLAG_HUMAN: u16 = 0x0002;

pub const AI_REBUILD_SLOTS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct House {
    pub index: HouseId,
    pub harvesters_incoming: u16,
    pub flags: u16,
    pub unit_count: u16,
    pub unit_count_max: u16,
    pub unit_count_enemy: u16,
    pub unit_count_allied: u16,
    pub structures_built: u32,
    pub credits: u16,
    pub credits_storage: u16,
    pub power_production: u16,
    pub power_usage: u16,
    pub windtrap_count: u16,
    pub credits_quota: u16,
    pub palace_position: Tile32,
    pub timer_unit_attack: u16,
    pub timer_sandworm_attack: u16,
    pub timer_structure_attack: u16,
    pub starport_time_left: u16,
    pub starport_linked: Option<UnitRef>,
    /// (structure type, packed position) per slot
    pub ai_structure_rebuild: [[u16; 2]; AI_REBUILD_SLOTS],
}

impl House {
    pub fn is_human(&self) -> bool {
        self.flags & HOUSE_FLAG_HUMAN != 0
    }
}

pub(crate) fn house_layout() -> Layout<House> {
    Layout::<House>::new()
        .entry(Scalar::U16, |h| h.index.0 as u32, |h, v| h.index = HouseId::from_raw(v))
        .entry(
            Scalar::U16,
            |h| h.harvesters_incoming as u32,
            |h, v| h.harvesters_incoming = v as u16,
        )
        .entry(Scalar::U16, |h| h.flags as u32, |h, v| h.flags = v as u16)
        .entry(Scalar::U16, |h| h.unit_count as u32, |h, v| h.unit_count = v as u16)
        .entry(Scalar::U16, |h| h.unit_count_max as u32, |h, v| h.unit_count_max = v as u16)
        .entry(Scalar::U16, |h| h.unit_count_enemy as u32, |h, v| h.unit_count_enemy = v as u16)
        .entry(Scalar::U16, |h| h.unit_count_allied as u32, |h, v| h.unit_count_allied = v as u16)
        .entry(Scalar::U32, |h| h.structures_built, |h, v| h.structures_built = v)
        .entry(Scalar::U16, |h| h.credits as u32, |h, v| h.credits = v as u16)
        .entry(Scalar::U16, |h| h.credits_storage as u32, |h, v| h.credits_storage = v as u16)
        .entry(Scalar::U16, |h| h.power_production as u32, |h, v| h.power_production = v as u16)
        .entry(Scalar::U16, |h| h.power_usage as u32, |h, v| h.power_usage = v as u16)
        .entry(Scalar::U16, |h| h.windtrap_count as u32, |h, v| h.windtrap_count = v as u16)
        .entry(Scalar::U16, |h| h.credits_quota as u32, |h, v| h.credits_quota = v as u16)
        .entry(Scalar::U16, |h| h.palace_position.x as u32, |h, v| h.palace_position.x = v as u16)
        .entry(Scalar::U16, |h| h.palace_position.y as u32, |h, v| h.palace_position.y = v as u16)
        .entry(Scalar::U16, |h| h.timer_unit_attack as u32, |h, v| h.timer_unit_attack = v as u16)
        .entry(
            Scalar::U16,
            |h| h.timer_sandworm_attack as u32,
            |h, v| h.timer_sandworm_attack = v as u16,
        )
        .entry(
            Scalar::U16,
            |h| h.timer_structure_attack as u32,
            |h, v| h.timer_structure_attack = v as u16,
        )
        .entry(Scalar::U16, |h| h.starport_time_left as u32, |h, v| h.starport_time_left = v as u16)
        .callback(
            Scalar::U16,
            |h, _| reference::encode(h.starport_linked) as u32,
            |h, raw, _| h.starport_linked = reference::decode(raw as u16),
        )
        .array(
            Scalar::U16,
            AI_REBUILD_SLOTS * 2,
            |h, i| h.ai_structure_rebuild[i / 2][i % 2] as u32,
            |h, i, v| h.ai_structure_rebuild[i / 2][i % 2] = v as u16,
        )
        // removed per-house palette and music fields
        .empty(Scalar::U16, 2)
}

pub struct HouseHandler;

impl ChunkHandler for HouseHandler {
    fn tag(&self) -> Tag {
        TAG_PLYR
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = house_layout();
        let count = record_count(TAG_PLYR, length, layout.length(), ctx)?;

        for _ in 0..count {
            let mut house = House::default();
            layout
                .load(r, &mut house, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_PLYR))?;

            if !house.index.is_valid() {
                anomaly(ctx, format!("house record with invalid index {}", house.index.0))?;
                continue;
            }
            if house.is_human() {
                mission.player_house = house.index;
            }
            if let Err(house) = mission.houses.insert(house.index, house) {
                anomaly(ctx, format!("house {} does not fit the pool", house.index))?;
            }
        }

        debug!("Loaded {} houses", count);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = house_layout();
        for (_, house) in mission.houses.iter() {
            layout.save(w, house, ctx)?;
        }
        debug!("Saved {} houses", mission.houses.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct LegacyHouse {
    index: u16,
    flags: u16,
}

pub(crate) fn legacy_house_layout() -> Layout<LegacyHouse> {
    Layout::<LegacyHouse>::new()
        .entry(Scalar::U16, |h| h.index as u32, |h, v| h.index = v as u16)
        .empty(Scalar::U16, 1)
        .entry(Scalar::U16, |h| h.flags as u32, |h, v| h.flags = v as u16)
        .empty(Scalar::U8, 40)
}

/// Scan an old-format `PLYR` chunk for the human player's house; nothing
/// else is recovered.
pub fn load_legacy_player_house(
    r: &mut dyn Read,
    length: u32,
    ctx: &SaveContext,
) -> Result<Option<HouseId>, SaveError> {
    let layout = legacy_house_layout();
    let count = record_count(TAG_PLYR, length, layout.length(), ctx)?;
    let mut player = None;

    for _ in 0..count {
        let mut house = LegacyHouse::default();
        layout
            .load(r, &mut house, ctx)
            .map_err(|e| SaveError::in_chunk(e, TAG_PLYR))?;

        let id = HouseId::from_raw(house.index as u32);
        if house.flags & HOUSE_FLAG_HUMAN != 0 && id.is_valid() {
            player = Some(id);
        }
    }

    if let Some(id) = player {
        info!("Recovered player house {} from old savegame", id);
    }
    Ok(player)
}
