use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use missionsave::mission::generate::seeded_mission;
use missionsave::mission::house::{HOUSE_FLAG_HUMAN, HOUSE_FLAG_USED};
use missionsave::mission::object::{Object, Tile32, FLAG_ALLOCATED, FLAG_USED};
use missionsave::mission::pool::{HouseId, UnitRef};
use missionsave::mission::unit::Unit;
use missionsave::savegame::chunk::ChunkWriter;
use missionsave::savegame::info::{info_layout, write_name};
use missionsave::savegame::restore::scan_chunks;
use missionsave::savegame::{
    SAVEGAME_VERSION, TAG_BLDG, TAG_INFO, TAG_MAP, TAG_NAME, TAG_ODUN, TAG_PLYR, TAG_TEAM, TAG_UNIT,
};
use missionsave::{LoadOutcome, Mission, SaveConfig, SaveContext, SaveError, SaveManager};
use test_log::test;

const CLOCK: u32 = 0x0001_2000;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("missionsave-{}-{}.sav", name, std::process::id()))
}

fn save_bytes(manager: &SaveManager, mission: &Mission, description: &str) -> Vec<u8> {
    manager
        .save_to(mission, Cursor::new(Vec::new()), &SaveContext::new(CLOCK), description)
        .unwrap()
        .into_inner()
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Offset of the header of the first chunk tagged `tag`.
fn chunk_offset(bytes: &[u8], tag: &[u8; 4]) -> usize {
    scan_chunks(Cursor::new(bytes))
        .unwrap()
        .into_iter()
        .find(|h| &h.tag == tag)
        .map(|h| h.payload_start as usize - 8)
        .unwrap()
}

/// Old-format house record: index, unused word, flags, 40 unused bytes.
fn legacy_house(index: u16, flags: u16) -> Vec<u8> {
    let mut record = Vec::with_capacity(46);
    record.extend_from_slice(&index.to_le_bytes());
    record.extend_from_slice(&[0, 0]);
    record.extend_from_slice(&flags.to_le_bytes());
    record.resize(46, 0);
    record
}

fn fix_form_length(bytes: &mut [u8]) {
    let total = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&total.to_be_bytes());
}

#[test]
fn populated_missions_round_trip() {
    let manager = SaveManager::default();
    for seed in [1u64, 17, 4242, 90_001] {
        let mission = seeded_mission(seed);
        let first = save_bytes(&manager, &mission, "round trip");

        let mut loaded = Mission::new();
        let outcome = manager
            .load_from(&mut loaded, Cursor::new(&first), &SaveContext::new(CLOCK))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Resumed);
        assert_eq!(loaded, mission, "seed {}", seed);

        let second = save_bytes(&manager, &loaded, "round trip");
        assert_eq!(first, second, "seed {}", seed);
    }
}

#[test]
fn chunks_are_spaced_by_padded_length() {
    let bytes = save_bytes(&SaveManager::default(), &seeded_mission(5), "odd");

    assert_eq!(&bytes[0..4], b"FORM");
    assert_eq!(be_u32(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(&bytes[8..12], b"SCEN");

    let mut offset = 12;
    let mut tags = Vec::new();
    while offset < bytes.len() {
        let length = be_u32(&bytes, offset + 4) as usize;
        tags.push([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
        if length % 2 == 1 {
            assert_eq!(bytes[offset + 8 + length], 0, "pad byte after {:?}", tags.last());
        }
        offset += 8 + length + (length & 1);
    }
    assert_eq!(offset, bytes.len());
    assert_eq!(
        tags,
        vec![TAG_NAME, TAG_INFO, TAG_PLYR, TAG_UNIT, TAG_BLDG, TAG_MAP, TAG_TEAM, TAG_ODUN]
    );
}

#[test]
fn hello_savegame_layout_and_reload() {
    let path = temp_path("hello");
    let manager = SaveManager::default();
    let ctx = SaveContext::new(CLOCK);
    let mut mission = Mission::new();
    mission.scenario_id = 12;
    mission.campaign_id = 4;

    assert!(manager.save(&mission, &ctx, &path, "hello"));

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"FORM");
    assert_eq!(be_u32(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(&bytes[8..12], b"SCEN");
    assert_eq!(&bytes[12..16], b"NAME");
    assert_eq!(be_u32(&bytes, 16), 6);
    assert_eq!(&bytes[20..26], b"hello\0");
    assert_eq!(&bytes[26..30], b"INFO");

    let mut loaded = Mission::new();
    assert!(manager.load(&mut loaded, &ctx, &path));
    assert_eq!(loaded.scenario_id, 12);
    assert_eq!(loaded.campaign_id, 4);
    assert_eq!(manager.read_description(Cursor::new(bytes)).unwrap(), "hello");

    fs::remove_file(&path).ok();
}

#[test]
fn old_version_takes_the_legacy_path() {
    let mut info = Vec::new();
    info.extend_from_slice(&0x0100u16.to_le_bytes());
    info.resize(250, 0xCC);
    info.extend_from_slice(&7u16.to_le_bytes());
    info.extend_from_slice(&3u16.to_le_bytes());

    let mut writer = ChunkWriter::open(Cursor::new(Vec::new())).unwrap();
    writer.write_chunk(TAG_NAME, |w| write_name(w, "ancient")).unwrap();
    writer.write_chunk(TAG_INFO, |w| w.write_all(&info)).unwrap();
    writer
        .write_chunk(TAG_PLYR, |w| {
            let other = legacy_house(0, HOUSE_FLAG_USED);
            let player = legacy_house(2, HOUSE_FLAG_USED | HOUSE_FLAG_HUMAN);
            w.write_all(&[other, player].concat())
        })
        .unwrap();
    // old unit records must not reach the pools
    writer.write_chunk(TAG_UNIT, |w| w.write_all(&[0xEE; 31])).unwrap();
    let bytes = writer.close().unwrap().into_inner();

    let before = seeded_mission(33);
    let mut mission = before.clone();
    let ctx = SaveContext::new(CLOCK);
    let outcome = SaveManager::default()
        .load_from(&mut mission, Cursor::new(bytes), &ctx)
        .unwrap();

    assert_eq!(outcome, LoadOutcome::RestartRequired);
    assert!(mission.restart_required);
    assert_eq!(mission.scenario_id, 7);
    assert_eq!(mission.campaign_id, 3);
    assert_eq!(mission.player_house, HouseId::ORDOS);
    assert_eq!(mission.units, before.units);
    assert_eq!(mission.structures, before.structures);
    assert_eq!(mission.teams, before.teams);
    assert_eq!(ctx.strict_depth(), 0);
}

#[test]
fn unknown_chunk_between_unit_and_bldg_is_skipped() {
    let manager = SaveManager::default();
    let mission = seeded_mission(77);
    assert!(!mission.structures.is_empty());
    let mut bytes = save_bytes(&manager, &mission, "xtra");

    let at = chunk_offset(&bytes, &TAG_BLDG);
    let mut xtra = b"XTRA".to_vec();
    xtra.extend_from_slice(&10u32.to_be_bytes());
    xtra.extend_from_slice(&[0x5A, 0x00, 0xFF, 0x13, 0x37, 0x01, 0x02, 0x03, 0x04, 0x05]);
    bytes.splice(at..at, xtra);
    fix_form_length(&mut bytes);

    let tags: Vec<_> = scan_chunks(Cursor::new(&bytes))
        .unwrap()
        .into_iter()
        .map(|h| h.tag)
        .collect();
    assert_eq!(&tags[3..6], &[TAG_UNIT, *b"XTRA", TAG_BLDG]);

    let mut loaded = Mission::new();
    manager
        .load_from(&mut loaded, Cursor::new(&bytes), &SaveContext::new(CLOCK))
        .unwrap();
    assert_eq!(loaded.structures, mission.structures);
    assert_eq!(loaded, mission);
}

#[test]
fn foreign_file_leaves_the_mission_alone() {
    let path = temp_path("foreign");
    fs::write(&path, b"RIFF\x10\0\0\0WAVEfmt \0\0\0\0").unwrap();

    let ctx = SaveContext::new(CLOCK);
    let before = seeded_mission(9);
    let mut mission = before.clone();
    assert!(!SaveManager::default().load(&mut mission, &ctx, &path));
    assert_eq!(mission, before);
    assert_eq!(ctx.strict_depth(), 0);

    fs::remove_file(&path).ok();
}

#[test]
fn missing_file_fails_to_load() {
    let mut mission = Mission::new();
    assert!(!SaveManager::default().load(
        &mut mission,
        &SaveContext::new(0),
        &temp_path("does-not-exist")
    ));
}

#[test]
fn info_length_mismatch_is_fatal() {
    let source = seeded_mission(3);
    let ctx = SaveContext::new(CLOCK);

    let mut writer = ChunkWriter::open(Cursor::new(Vec::new())).unwrap();
    writer.write_chunk(TAG_NAME, |w| write_name(w, "long info")).unwrap();
    writer
        .write_chunk(TAG_INFO, |w| {
            info_layout().save(w, &source, &ctx)?;
            w.write_all(&[0, 0])
        })
        .unwrap();
    let bytes = writer.close().unwrap().into_inner();

    let before = seeded_mission(4);
    let mut mission = before.clone();
    let err = SaveManager::default()
        .load_from(&mut mission, Cursor::new(bytes), &ctx)
        .unwrap_err();
    match err {
        SaveError::LengthMismatch { tag, expected, found } => {
            assert_eq!(tag, TAG_INFO);
            assert_eq!(expected, info_layout().length());
            assert_eq!(found as usize, expected + 2);
        }
        other => panic!("unexpected error {}", other),
    }
    assert_eq!(mission, before);
    assert_eq!(ctx.strict_depth(), 0);
}

#[test]
fn truncated_chunk_fails_without_changes() {
    let manager = SaveManager::default();
    let bytes = save_bytes(&manager, &seeded_mission(21), "cut");
    let cut = chunk_offset(&bytes, &TAG_UNIT) + 8 + 20;

    let before = seeded_mission(22);
    let mut mission = before.clone();
    let ctx = SaveContext::new(CLOCK);
    let err = manager
        .load_from(&mut mission, Cursor::new(&bytes[..cut]), &ctx)
        .unwrap_err();
    assert!(matches!(err, SaveError::Truncated(tag) if tag == TAG_UNIT), "{}", err);
    assert_eq!(mission, before);
    assert_eq!(ctx.strict_depth(), 0);
}

#[test]
fn trailing_chunk_longer_than_the_file_is_truncated() {
    let manager = SaveManager::default();
    let mut bytes = save_bytes(&manager, &seeded_mission(5), "overrun");
    bytes.extend_from_slice(b"XTRA");
    bytes.extend_from_slice(&100u32.to_be_bytes());
    bytes.extend_from_slice(&[1, 2, 3]);
    fix_form_length(&mut bytes);

    let before = seeded_mission(6);
    let mut mission = before.clone();
    let ctx = SaveContext::new(CLOCK);
    let err = manager
        .load_from(&mut mission, Cursor::new(&bytes), &ctx)
        .unwrap_err();
    assert!(matches!(err, SaveError::Truncated(tag) if &tag == b"XTRA"), "{}", err);
    assert_eq!(mission, before);
    assert_eq!(ctx.strict_depth(), 0);
}

fn mission_with_stray_unit() -> Mission {
    let mut mission = seeded_mission(60);
    let stray = Unit {
        o: Object {
            index: 101,
            flags: FLAG_USED | FLAG_ALLOCATED,
            house: HouseId(7),
            position: Tile32::from_tile(3, 3),
            ..Default::default()
        },
        ..Default::default()
    };
    mission.units.insert(UnitRef(101), stray).unwrap();
    mission
}

#[test]
fn strict_load_rejects_anomalies() {
    let lenient = SaveManager::new(SaveConfig {
        strict_validation: false,
        ..SaveConfig::default()
    });
    let bytes = save_bytes(&lenient, &mission_with_stray_unit(), "stray");

    let ctx = SaveContext::new(CLOCK);
    let mut mission = Mission::new();
    let err = SaveManager::default()
        .load_from(&mut mission, Cursor::new(&bytes), &ctx)
        .unwrap_err();
    assert!(matches!(err, SaveError::Corrupt(_)), "{}", err);
    assert_eq!(mission, Mission::new());
    assert_eq!(ctx.strict_depth(), 0);
}

#[test]
fn lenient_load_repairs_anomalies() {
    let lenient = SaveManager::new(SaveConfig {
        strict_validation: false,
        ..SaveConfig::default()
    });
    let source = mission_with_stray_unit();
    let bytes = save_bytes(&lenient, &source, "stray");

    let mut mission = Mission::new();
    let outcome = lenient
        .load_from(&mut mission, Cursor::new(&bytes), &SaveContext::new(CLOCK))
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Resumed);
    assert!(!mission.units.contains(UnitRef(101)));
    assert_eq!(mission.units.len(), source.units.len() - 1);
    assert_eq!(mission.structures, source.structures);
}

#[test]
fn current_version_is_written() {
    let bytes = save_bytes(&SaveManager::default(), &Mission::new(), "");
    let info = chunk_offset(&bytes, &TAG_INFO) + 8;
    assert_eq!(u16::from_le_bytes([bytes[info], bytes[info + 1]]), SAVEGAME_VERSION);
}
