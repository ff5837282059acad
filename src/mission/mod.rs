//! In-memory mission state and the chunk handlers that persist it.

pub mod generate;
pub mod house;
pub mod map;
pub mod object;
pub mod pool;
pub mod script;
pub mod structure;
pub mod team;
pub mod unit;

use log::{debug, warn};

use crate::context::SaveContext;
use crate::error::SaveError;
use crate::savegame::reference::Deferred;
use crate::savegame::{tag_name, Tag};
use house::House;
use map::Map;
use pool::{HouseId, Pool, StructureRef, TeamRef, UnitRef};
use structure::Structure;
use team::Team;
use unit::Unit;

/// Map edge length in tiles.
pub const MAP_SIZE: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    pub score: u16,
    pub win_flags: u16,
    pub lose_flags: u16,
    pub map_seed: u32,
    pub map_scale: u16,
    pub time_out: u16,
    pub killed_allied: u16,
    pub killed_enemy: u16,
    pub destroyed_allied: u16,
    pub destroyed_enemy: u16,
    pub harvested_allied: u16,
    pub harvested_enemy: u16,
}

/// Everything a savegame captures about the running mission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mission {
    pub scenario_id: u16,
    pub campaign_id: u16,
    pub player_house: HouseId,
    pub scenario: Scenario,

    pub credits_no_silo: u16,
    pub minimap_position: u16,
    pub selection_rectangle_position: u16,
    pub selection_type: u16,
    pub structure_active_type: u16,
    pub structure_active_position: u16,
    pub structure_active: Option<StructureRef>,
    pub unit_active: Option<UnitRef>,
    pub active_action: u16,
    pub hints_shown: [u32; 2],
    pub tick_scenario_start: u32,

    /// Unit under the cursor. Restored only once the map is loaded.
    pub selected_unit: Option<UnitRef>,
    pub selected_unit_pending: Deferred<Option<UnitRef>>,

    /// Set when an older savegame was loaded and the scenario must be
    /// started over instead of resumed.
    pub restart_required: bool,

    pub map: Map,
    pub houses: Pool<HouseId, House>,
    pub units: Pool<UnitRef, Unit>,
    pub structures: Pool<StructureRef, Structure>,
    pub teams: Pool<TeamRef, Team>,
}

impl Mission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply values that were decoded before the pools they refer to
    /// existed. A selection whose unit did not survive the load is cleared.
    pub fn commit_pending(&mut self) {
        if let Some(selected) = self.selected_unit_pending.take() {
            self.selected_unit = selected.filter(|&r| self.units.contains(r));
            if selected.is_some() && self.selected_unit.is_none() {
                warn!("Selected unit {:?} is gone, clearing selection", selected);
            }
            debug!("Committed selection {:?}", self.selected_unit);
        }
    }

    pub fn player(&self) -> Option<&House> {
        self.houses.get(self.player_house)
    }
}

/// Report a data anomaly: an error while strict, a warning otherwise so the
/// caller can repair and continue.
pub(crate) fn anomaly(ctx: &SaveContext, message: String) -> Result<(), SaveError> {
    if ctx.is_strict() {
        return Err(SaveError::Corrupt(message));
    }
    warn!("{}; repairing", message);
    Ok(())
}

/// Number of whole records in a chunk of `length` bytes.
pub(crate) fn record_count(
    tag: Tag,
    length: u32,
    record_len: usize,
    ctx: &SaveContext,
) -> Result<usize, SaveError> {
    let length = length as usize;
    if length % record_len != 0 {
        anomaly(
            ctx,
            format!(
                "'{}' chunk of {} bytes is not a whole number of {}-byte records",
                tag_name(&tag),
                length,
                record_len
            ),
        )?;
    }
    Ok(length / record_len)
}
