//! Contents of the `INFO` and `NAME` chunks.

use std::io::{self, Read, Write};

use super::descriptor::{Layout, Scalar};
use super::reference::{self, clock_absolute, clock_delta};
use super::SAVEGAME_VERSION;
use crate::mission::pool::HouseId;
use crate::mission::{Mission, Scenario};

/// Longest description stored, terminator included.
pub const DESCRIPTION_LIMIT: usize = 255;

fn scenario_layout() -> Layout<Scenario> {
    Layout::<Scenario>::new()
        .entry(Scalar::U16, |s| s.score as u32, |s, v| s.score = v as u16)
        .entry(Scalar::U16, |s| s.win_flags as u32, |s, v| s.win_flags = v as u16)
        .entry(Scalar::U16, |s| s.lose_flags as u32, |s, v| s.lose_flags = v as u16)
        .entry(Scalar::U32, |s| s.map_seed, |s, v| s.map_seed = v)
        .entry(Scalar::U16, |s| s.map_scale as u32, |s, v| s.map_scale = v as u16)
        .entry(Scalar::U16, |s| s.time_out as u32, |s, v| s.time_out = v as u16)
        // briefing picture names, no longer stored
        .empty(Scalar::U8, 14)
        .entry(Scalar::U16, |s| s.killed_allied as u32, |s, v| s.killed_allied = v as u16)
        .entry(Scalar::U16, |s| s.killed_enemy as u32, |s, v| s.killed_enemy = v as u16)
        .entry(Scalar::U16, |s| s.destroyed_allied as u32, |s, v| s.destroyed_allied = v as u16)
        .entry(Scalar::U16, |s| s.destroyed_enemy as u32, |s, v| s.destroyed_enemy = v as u16)
        .entry(Scalar::U16, |s| s.harvested_allied as u32, |s, v| s.harvested_allied = v as u16)
        .entry(Scalar::U16, |s| s.harvested_enemy as u32, |s, v| s.harvested_enemy = v as u16)
}

/// `INFO` payload of the current savegame version.
pub fn info_layout() -> Layout<Mission> {
    Layout::<Mission>::new()
        // checked by the loader before this layout runs
        .callback(Scalar::U16, |_, _| SAVEGAME_VERSION as u32, |_, _, _| {})
        .nested(scenario_layout(), |m| &m.scenario, |m| &mut m.scenario)
        .entry(Scalar::U16, |m| m.credits_no_silo as u32, |m, v| m.credits_no_silo = v as u16)
        .entry(Scalar::U16, |m| m.minimap_position as u32, |m, v| m.minimap_position = v as u16)
        .entry(
            Scalar::U16,
            |m| m.selection_rectangle_position as u32,
            |m, v| m.selection_rectangle_position = v as u16,
        )
        .entry2(
            Scalar::U8,
            Scalar::U16,
            |m| m.selection_type as u32,
            |m, v| m.selection_type = v as u16,
        )
        .entry(
            Scalar::U16,
            |m| m.structure_active_type as u32,
            |m, v| m.structure_active_type = v as u16,
        )
        .entry(
            Scalar::U16,
            |m| m.structure_active_position as u32,
            |m, v| m.structure_active_position = v as u16,
        )
        .callback(
            Scalar::U16,
            |m, _| reference::encode(m.structure_active) as u32,
            |m, raw, _| m.structure_active = reference::decode(raw as u16),
        )
        .callback(
            Scalar::U16,
            |m, _| reference::encode(m.unit_active) as u32,
            |m, raw, _| m.unit_active = reference::decode(raw as u16),
        )
        .entry(Scalar::U16, |m| m.active_action as u32, |m, v| m.active_action = v as u16)
        // strategic map fast-forward flag
        .empty(Scalar::U32, 1)
        .entry(Scalar::U16, |m| m.scenario_id as u32, |m, v| m.scenario_id = v as u16)
        .entry(Scalar::U16, |m| m.campaign_id as u32, |m, v| m.campaign_id = v as u16)
        .array(Scalar::U32, 2, |m, i| m.hints_shown[i], |m, i, v| m.hints_shown[i] = v)
        .callback(
            Scalar::U32,
            |m, ctx| clock_delta(ctx.clock(), m.tick_scenario_start),
            |m, raw, ctx| m.tick_scenario_start = clock_absolute(ctx.clock(), raw),
        )
        .entry(Scalar::U8, |m| m.player_house.0 as u32, |m, v| m.player_house = HouseId(v as u8))
        .empty(Scalar::U8, 1)
        // the unit pool is not loaded yet; committed after dispatch
        .callback(
            Scalar::U16,
            |m, _| reference::encode(m.selected_unit) as u32,
            |m, raw, _| m.selected_unit_pending.stage(reference::decode(raw as u16)),
        )
}

/// The part of an old `INFO` chunk that is still understood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyInfo {
    pub scenario_id: u16,
    pub campaign_id: u16,
}

pub fn legacy_info_layout() -> Layout<LegacyInfo> {
    Layout::<LegacyInfo>::new()
        .empty(Scalar::U8, 250)
        .entry(Scalar::U16, |i| i.scenario_id as u32, |i, v| i.scenario_id = v as u16)
        .entry(Scalar::U16, |i| i.campaign_id as u32, |i, v| i.campaign_id = v as u16)
}

/// Write `description` NUL-terminated, cut to fit [`DESCRIPTION_LIMIT`].
pub fn write_name(w: &mut dyn Write, description: &str) -> io::Result<()> {
    let text = description.split('\0').next().unwrap_or("");
    let mut end = text.len().min(DESCRIPTION_LIMIT - 1);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    w.write_all(&text.as_bytes()[..end])?;
    w.write_all(&[0])
}

/// Read a `NAME` payload of `length` bytes, stopping at the terminator.
pub fn read_name(r: &mut dyn Read, length: u32) -> io::Result<String> {
    let mut bytes = Vec::with_capacity(length as usize);
    r.take(length as u64).read_to_end(&mut bytes)?;
    if bytes.len() < length as usize {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
