//! Structures and the `BLDG` chunk.

use std::io::{Read, Write};

use log::debug;

use super::object::{object_layout, Object};
use super::pool::{HouseId, StructureRef};
use super::{anomaly, record_count, Mission};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};
use crate::savegame::reference::PoolIndex;
use crate::savegame::{ChunkHandler, Tag, TAG_BLDG};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub o: Object,
    pub creator_house: HouseId,
    pub rotation_sprite_diff: u16,
    pub object_type: u16,
    pub upgrade_level: u8,
    pub upgrade_time_left: u8,
    pub countdown: u16,
    pub build_cost_remainder: u16,
    pub state: i16,
    pub hitpoints_max: u16,
}

pub(crate) fn structure_layout() -> Layout<Structure> {
    Layout::<Structure>::new()
        .nested(object_layout(), |s| &s.o, |s| &mut s.o)
        .entry(
            Scalar::U16,
            |s| s.creator_house.0 as u32,
            |s, v| s.creator_house = HouseId::from_raw(v),
        )
        .entry(
            Scalar::U16,
            |s| s.rotation_sprite_diff as u32,
            |s, v| s.rotation_sprite_diff = v as u16,
        )
        .entry(Scalar::U16, |s| s.object_type as u32, |s, v| s.object_type = v as u16)
        .entry(Scalar::U8, |s| s.upgrade_level as u32, |s, v| s.upgrade_level = v as u8)
        .entry(Scalar::U8, |s| s.upgrade_time_left as u32, |s, v| s.upgrade_time_left = v as u8)
        .entry(Scalar::U16, |s| s.countdown as u32, |s, v| s.countdown = v as u16)
        .entry(
            Scalar::U16,
            |s| s.build_cost_remainder as u32,
            |s, v| s.build_cost_remainder = v as u16,
        )
        .entry(Scalar::I16, |s| s.state as u32, |s, v| s.state = v as i16)
        .entry(Scalar::U16, |s| s.hitpoints_max as u32, |s, v| s.hitpoints_max = v as u16)
}

pub struct StructureHandler;

impl ChunkHandler for StructureHandler {
    fn tag(&self) -> Tag {
        TAG_BLDG
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = structure_layout();
        let count = record_count(TAG_BLDG, length, layout.length(), ctx)?;
        let mut loaded = 0;

        for _ in 0..count {
            let mut structure = Structure::default();
            layout
                .load(r, &mut structure, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_BLDG))?;

            if structure.o.index as usize >= StructureRef::CAPACITY {
                anomaly(ctx, format!("structure index {} exceeds the pool", structure.o.index))?;
                continue;
            }
            if !structure.o.validate("structure", ctx)? {
                continue;
            }
            if !structure.creator_house.is_valid() {
                anomaly(
                    ctx,
                    format!(
                        "structure {} has invalid creator {}",
                        structure.o.index, structure.creator_house
                    ),
                )?;
                structure.creator_house = structure.o.house;
            }
            if structure.o.hitpoints > structure.hitpoints_max {
                anomaly(
                    ctx,
                    format!(
                        "structure {} has {} of {} hitpoints",
                        structure.o.index, structure.o.hitpoints, structure.hitpoints_max
                    ),
                )?;
                structure.o.hitpoints = structure.hitpoints_max;
            }

            let slot = StructureRef(structure.o.index);
            if let Ok(Some(_)) = mission.structures.insert(slot, structure) {
                anomaly(ctx, format!("structure {} stored twice", slot.0))?;
            }
            loaded += 1;
        }

        debug!("Loaded {} structures", loaded);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = structure_layout();
        for (_, structure) in mission.structures.iter() {
            layout.save(w, structure, ctx)?;
        }
        debug!("Saved {} structures", mission.structures.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::object::{Tile32, FLAG_USED};
    use std::io::Cursor;

    fn sample_structure(index: u16) -> Structure {
        Structure {
            o: Object {
                index,
                type_id: 3,
                flags: FLAG_USED,
                house: HouseId::HARKONNEN,
                position: Tile32::from_tile(5, 5),
                hitpoints: 400,
                ..Default::default()
            },
            creator_house: HouseId::HARKONNEN,
            state: -1,
            hitpoints_max: 500,
            countdown: 12,
            ..Default::default()
        }
    }

    #[test_log::test]
    fn structures_round_trip() {
        let mut mission = Mission::new();
        mission.structures.insert(StructureRef(0), sample_structure(0)).unwrap();
        mission.structures.insert(StructureRef(81), sample_structure(81)).unwrap();

        let ctx = SaveContext::new(0);
        let mut bytes = Vec::new();
        StructureHandler.save(&mission, &mut bytes, &ctx).unwrap();

        let mut loaded = Mission::new();
        StructureHandler
            .load(&mut loaded, &mut Cursor::new(&bytes), bytes.len() as u32, &ctx)
            .unwrap();
        assert_eq!(loaded.structures, mission.structures);
    }

    #[test_log::test]
    fn excess_hitpoints_are_clamped_when_lenient() {
        let mut source = Mission::new();
        let mut structure = sample_structure(2);
        structure.o.hitpoints = 900;
        source.structures.insert(StructureRef(2), structure).unwrap();

        let ctx = SaveContext::new(0);
        let mut bytes = Vec::new();
        StructureHandler.save(&source, &mut bytes, &ctx).unwrap();

        let mut loaded = Mission::new();
        StructureHandler
            .load(&mut loaded, &mut Cursor::new(&bytes), bytes.len() as u32, &ctx)
            .unwrap();
        assert_eq!(loaded.structures.get(StructureRef(2)).unwrap().o.hitpoints, 500);
    }

    #[test_log::test]
    fn wide_creator_house_is_invalid() {
        let ctx = SaveContext::new(0);
        let mut bytes = Vec::new();
        structure_layout().save(&mut bytes, &sample_structure(4), &ctx).unwrap();
        let at = object_layout().length();
        bytes[at..at + 2].copy_from_slice(&0x0100u16.to_le_bytes());

        let mut loaded = Mission::new();
        {
            let _strict = ctx.strict_scope();
            let length = bytes.len() as u32;
            let result = StructureHandler.load(&mut loaded, &mut Cursor::new(&bytes), length, &ctx);
            assert!(matches!(result, Err(SaveError::Corrupt(_))));
        }

        StructureHandler
            .load(&mut loaded, &mut Cursor::new(&bytes), bytes.len() as u32, &ctx)
            .unwrap();
        let structure = loaded.structures.get(StructureRef(4)).unwrap();
        assert_eq!(structure.creator_house, HouseId::HARKONNEN);
    }
}
