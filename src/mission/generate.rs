//! Randomly populated missions for demos and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::house::{House, HOUSE_FLAG_HUMAN, HOUSE_FLAG_USED};
use super::map::{Tile, MAP_TILES};
use super::object::{Object, Tile32, FLAG_ALLOCATED, FLAG_USED};
use super::pool::{HouseId, StructureRef, TeamRef, UnitRef, HOUSE_COUNT};
use super::script::{ScriptEngine, SCRIPT_STACK, SCRIPT_VARIABLES};
use super::structure::Structure;
use super::team::{Team, TEAM_FLAG_USED};
use super::unit::{Unit, ROUTE_LENGTH};
use super::{Mission, MAP_SIZE};
use crate::savegame::reference::PoolIndex;

/// Same seed, same mission.
pub fn seeded_mission(seed: u64) -> Mission {
    let mut rng = StdRng::seed_from_u64(seed);
    random_mission(&mut rng)
}

/// A mission whose every field passes strict validation.
pub fn random_mission<R: Rng>(rng: &mut R) -> Mission {
    let mut mission = Mission::new();
    mission.scenario_id = rng.gen_range(1..23);
    mission.campaign_id = rng.gen_range(0..9);
    mission.scenario.score = rng.gen();
    mission.scenario.win_flags = rng.gen_range(0..16);
    mission.scenario.lose_flags = rng.gen_range(0..16);
    mission.scenario.map_seed = rng.gen();
    mission.scenario.map_scale = rng.gen_range(0..3);
    mission.scenario.time_out = rng.gen();
    mission.scenario.killed_enemy = rng.gen_range(0..500);
    mission.scenario.harvested_allied = rng.gen();
    mission.credits_no_silo = rng.gen();
    mission.minimap_position = rng.gen_range(0..MAP_TILES as u16);
    mission.selection_type = rng.gen_range(0..5);
    mission.active_action = rng.gen_range(0..0x20);
    mission.hints_shown = [rng.gen(), rng.gen()];
    mission.tick_scenario_start = rng.gen();

    let player = HouseId(rng.gen_range(0..HOUSE_COUNT as u8));
    mission.player_house = player;
    for index in 0..HOUSE_COUNT as u8 {
        if index != player.0 && rng.gen_bool(0.4) {
            continue;
        }
        let id = HouseId(index);
        mission.houses.insert(id, random_house(rng, id, id == player)).ok();
    }

    for _ in 0..rng.gen_range(1..40) {
        let index = rng.gen_range(0..UnitRef::CAPACITY as u16);
        mission.units.insert(UnitRef(index), random_unit(rng, index)).ok();
    }
    for _ in 0..rng.gen_range(1..25) {
        let index = rng.gen_range(0..StructureRef::CAPACITY as u16);
        mission
            .structures
            .insert(StructureRef(index), random_structure(rng, index))
            .ok();
    }
    for _ in 0..rng.gen_range(0..TeamRef::CAPACITY) {
        let index = rng.gen_range(0..TeamRef::CAPACITY as u16);
        mission.teams.insert(TeamRef(index), random_team(rng, index)).ok();
    }

    for _ in 0..rng.gen_range(0..300) {
        let position = rng.gen_range(0..MAP_TILES);
        mission.map.tiles[position] = random_tile(rng);
    }

    let units: Vec<UnitRef> = mission.units.iter().map(|(r, _)| r).collect();
    mission.selected_unit = pick(rng, &units);
    mission.unit_active = pick(rng, &units);
    let structures: Vec<StructureRef> = mission.structures.iter().map(|(r, _)| r).collect();
    mission.structure_active = pick(rng, &structures);

    mission
}

fn pick<R: Rng, T: Copy>(rng: &mut R, items: &[T]) -> Option<T> {
    if items.is_empty() || rng.gen_bool(0.2) {
        return None;
    }
    Some(items[rng.gen_range(0..items.len())])
}

fn random_position<R: Rng>(rng: &mut R) -> Tile32 {
    Tile32 {
        x: rng.gen_range(0..(MAP_SIZE as u16) << 8),
        y: rng.gen_range(0..(MAP_SIZE as u16) << 8),
    }
}

fn random_script<R: Rng>(rng: &mut R) -> ScriptEngine {
    let mut script = ScriptEngine {
        delay: rng.gen_range(0..100),
        script_offset: rng.gen(),
        return_value: rng.gen(),
        frame_pointer: rng.gen_range(0..=SCRIPT_STACK as u8 + 2),
        stack_pointer: rng.gen_range(0..=SCRIPT_STACK as u8),
        is_subroutine: rng.gen_range(0..2),
        ..Default::default()
    };
    for i in 0..SCRIPT_VARIABLES {
        script.variables[i] = rng.gen();
    }
    for i in script.stack_pointer as usize..SCRIPT_STACK {
        script.stack[i] = rng.gen();
    }
    script
}

fn random_object<R: Rng>(rng: &mut R, index: u16) -> Object {
    Object {
        index,
        type_id: rng.gen_range(0..27),
        linked_id: rng.gen(),
        flags: FLAG_USED | FLAG_ALLOCATED,
        house: HouseId(rng.gen_range(0..HOUSE_COUNT as u8)),
        seen_by_houses: rng.gen_range(0..0x40),
        position: random_position(rng),
        hitpoints: rng.gen_range(1..300),
        script: random_script(rng),
    }
}

fn random_house<R: Rng>(rng: &mut R, id: HouseId, human: bool) -> House {
    let mut house = House {
        index: id,
        harvesters_incoming: rng.gen_range(0..3),
        flags: HOUSE_FLAG_USED | if human { HOUSE_FLAG_HUMAN } else { 0 },
        unit_count: rng.gen_range(0..50),
        unit_count_max: rng.gen_range(25..100),
        structures_built: rng.gen(),
        credits: rng.gen(),
        credits_storage: rng.gen(),
        power_production: rng.gen_range(0..1000),
        power_usage: rng.gen_range(0..1000),
        windtrap_count: rng.gen_range(0..10),
        credits_quota: rng.gen(),
        palace_position: random_position(rng),
        timer_unit_attack: rng.gen(),
        timer_sandworm_attack: rng.gen(),
        timer_structure_attack: rng.gen(),
        starport_time_left: rng.gen(),
        starport_linked: if rng.gen_bool(0.3) {
            Some(UnitRef(rng.gen_range(0..UnitRef::CAPACITY as u16)))
        } else {
            None
        },
        ..Default::default()
    };
    for slot in house.ai_structure_rebuild.iter_mut() {
        *slot = [rng.gen_range(0..19), rng.gen_range(0..MAP_TILES as u16)];
    }
    house
}

fn random_unit<R: Rng>(rng: &mut R, index: u16) -> Unit {
    let mut unit = Unit {
        o: random_object(rng, index),
        current_destination: random_position(rng),
        origin_encoded: rng.gen(),
        action_id: rng.gen_range(0..15),
        next_action_id: rng.gen_range(0..15),
        fire_delay: rng.gen(),
        distance_to_destination: rng.gen(),
        target_attack: rng.gen(),
        target_move: rng.gen(),
        amount: rng.gen_range(0..100),
        deviated: rng.gen_range(0..120),
        target_last: random_position(rng),
        orientation: [rng.gen::<i8>() as i16, rng.gen::<i8>() as i16],
        speed_per_tick: rng.gen(),
        speed_remainder: rng.gen(),
        speed: rng.gen(),
        moving_speed: rng.gen(),
        wobble_index: rng.gen_range(0..8),
        sprite_offset: rng.gen::<i8>() as i16,
        blink_counter: rng.gen_range(0..10),
        team: if rng.gen_bool(0.25) {
            Some(TeamRef(rng.gen_range(0..TeamRef::CAPACITY as u16)))
        } else {
            None
        },
        timer: rng.gen(),
        last_fire_tick: rng.gen(),
        deviated_house: HouseId(rng.gen_range(0..HOUSE_COUNT as u8)),
        fire_twice_flip: rng.gen_range(0..2),
        ..Default::default()
    };
    for step in unit.route.iter_mut().take(rng.gen_range(0..ROUTE_LENGTH)) {
        *step = rng.gen_range(0..8);
    }
    unit
}

fn random_structure<R: Rng>(rng: &mut R, index: u16) -> Structure {
    let o = random_object(rng, index);
    Structure {
        hitpoints_max: o.hitpoints + rng.gen_range(0..200),
        creator_house: o.house,
        o,
        rotation_sprite_diff: rng.gen_range(0..8),
        object_type: rng.gen_range(0..19),
        upgrade_level: rng.gen_range(0..3),
        upgrade_time_left: rng.gen_range(0..100),
        countdown: rng.gen(),
        build_cost_remainder: rng.gen(),
        state: rng.gen_range(-2..4),
    }
}

fn random_team<R: Rng>(rng: &mut R, index: u16) -> Team {
    let max_members = rng.gen_range(1..10);
    Team {
        index,
        flags: TEAM_FLAG_USED,
        members: rng.gen_range(0..=max_members),
        min_members: rng.gen_range(0..=max_members),
        max_members,
        movement_type: rng.gen_range(0..4),
        action: rng.gen_range(0..6),
        action_start: rng.gen_range(0..6),
        house: HouseId(rng.gen_range(0..HOUSE_COUNT as u8)),
        position: random_position(rng),
        target_tile: rng.gen_range(0..MAP_TILES as u16),
        target: rng.gen(),
        script: random_script(rng),
    }
}

fn random_tile<R: Rng>(rng: &mut R) -> Tile {
    Tile {
        ground_tile_id: rng.gen_range(0..0x200),
        overlay_tile_id: rng.gen_range(0..0x80),
        house: rng.gen_range(0..HOUSE_COUNT as u8),
        is_unveiled: rng.gen(),
        has_unit: rng.gen(),
        has_structure: rng.gen(),
        has_animation: rng.gen(),
        has_explosion: rng.gen(),
        index: rng.gen(),
    }
}
