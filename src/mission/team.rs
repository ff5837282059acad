//! AI teams and the `TEAM` chunk.

use std::io::{Read, Write};

use log::debug;

use super::object::Tile32;
use super::pool::{HouseId, TeamRef};
use super::script::{script_layout, ScriptEngine};
use super::{anomaly, record_count, Mission};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::descriptor::{Layout, Scalar};
use crate::savegame::reference::PoolIndex;
use crate::savegame::{ChunkHandler, Tag, TAG_TEAM};

pub const TEAM_FLAG_USED: u16 = 0x0001;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Team {
    pub index: u16,
    pub flags: u16,
    pub members: u16,
    pub min_members: u16,
    pub max_members: u16,
    pub movement_type: u16,
    pub action: u16,
    pub action_start: u16,
    pub house: HouseId,
    pub position: Tile32,
    pub target_tile: u16,
    /// Encoded target, resolved by the AI against the current pools.
    pub target: u16,
    pub script: ScriptEngine,
}

pub(crate) fn team_layout() -> Layout<Team> {
    Layout::<Team>::new()
        .entry(Scalar::U16, |t| t.index as u32, |t, v| t.index = v as u16)
        .entry(Scalar::U16, |t| t.flags as u32, |t, v| t.flags = v as u16)
        .entry(Scalar::U16, |t| t.members as u32, |t, v| t.members = v as u16)
        .entry(Scalar::U16, |t| t.min_members as u32, |t, v| t.min_members = v as u16)
        .entry(Scalar::U16, |t| t.max_members as u32, |t, v| t.max_members = v as u16)
        .entry(Scalar::U16, |t| t.movement_type as u32, |t, v| t.movement_type = v as u16)
        .entry(Scalar::U16, |t| t.action as u32, |t, v| t.action = v as u16)
        .entry(Scalar::U16, |t| t.action_start as u32, |t, v| t.action_start = v as u16)
        .entry(Scalar::U8, |t| t.house.0 as u32, |t, v| t.house = HouseId(v as u8))
        .empty(Scalar::U8, 1)
        .entry(Scalar::U16, |t| t.position.x as u32, |t, v| t.position.x = v as u16)
        .entry(Scalar::U16, |t| t.position.y as u32, |t, v| t.position.y = v as u16)
        .entry(Scalar::U16, |t| t.target_tile as u32, |t, v| t.target_tile = v as u16)
        .entry(Scalar::U16, |t| t.target as u32, |t, v| t.target = v as u16)
        .nested(script_layout(), |t| &t.script, |t| &mut t.script)
}

pub struct TeamHandler;

impl ChunkHandler for TeamHandler {
    fn tag(&self) -> Tag {
        TAG_TEAM
    }

    fn load(
        &self,
        mission: &mut Mission,
        r: &mut dyn Read,
        length: u32,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = team_layout();
        let count = record_count(TAG_TEAM, length, layout.length(), ctx)?;
        let mut loaded = 0;

        for _ in 0..count {
            let mut team = Team::default();
            layout
                .load(r, &mut team, ctx)
                .map_err(|e| SaveError::in_chunk(e, TAG_TEAM))?;

            if team.index as usize >= TeamRef::CAPACITY {
                anomaly(ctx, format!("team index {} exceeds the pool", team.index))?;
                continue;
            }
            if !team.house.is_valid() {
                anomaly(
                    ctx,
                    format!("team {} belongs to invalid house {}", team.index, team.house.0),
                )?;
                continue;
            }
            if team.members > team.max_members {
                anomaly(
                    ctx,
                    format!(
                        "team {} has {} of at most {} members",
                        team.index, team.members, team.max_members
                    ),
                )?;
                team.members = team.max_members;
            }
            if !team.script.pointers_valid() {
                anomaly(ctx, format!("team {} has a broken script stack", team.index))?;
                team.script.reset_stack();
            }

            let slot = TeamRef(team.index);
            if let Ok(Some(_)) = mission.teams.insert(slot, team) {
                anomaly(ctx, format!("team {} stored twice", slot.0))?;
            }
            loaded += 1;
        }

        debug!("Loaded {} teams", loaded);
        Ok(())
    }

    fn save(
        &self,
        mission: &Mission,
        w: &mut dyn Write,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let layout = team_layout();
        for (_, team) in mission.teams.iter() {
            layout.save(w, team, ctx)?;
        }
        debug!("Saved {} teams", mission.teams.len());
        Ok(())
    }
}
