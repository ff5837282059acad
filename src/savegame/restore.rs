//! Loading savegames.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, error, info, warn};

use super::chunk::{ChunkHeader, ChunkReader};
use super::info::{info_layout, legacy_info_layout, read_name, LegacyInfo};
use super::{tag_name, SaveManager, SAVEGAME_VERSION, TAG_INFO, TAG_NAME, TAG_PLYR};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::mission::house::load_legacy_player_house;
use crate::mission::Mission;

/// How a successful load left the mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fully restored; play continues where it was saved.
    Resumed,
    /// Only the scenario identity was recovered from an older savegame;
    /// the scenario has to be started again.
    RestartRequired,
}

impl SaveManager {
    /// Load `path` into `mission`. Failures are logged and leave the mission
    /// as it was.
    pub fn load(&self, mission: &mut Mission, ctx: &SaveContext, path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open savegame {:?}: {}", path, e);
                return false;
            }
        };

        match self.load_from(mission, BufReader::new(file), ctx) {
            Ok(LoadOutcome::Resumed) => {
                info!("Loaded savegame {:?}", path);
                true
            }
            Ok(LoadOutcome::RestartRequired) => {
                warn!("Savegame {:?} is from an older version; the scenario will restart", path);
                true
            }
            Err(e) => {
                error!("Failed to load savegame {:?}: {}", path, e);
                false
            }
        }
    }

    /// Load a savegame from `reader`. The result is built on the side and
    /// only replaces `mission` once every chunk has been read.
    pub fn load_from<R: Read + Seek>(
        &self,
        mission: &mut Mission,
        reader: R,
        ctx: &SaveContext,
    ) -> Result<LoadOutcome, SaveError> {
        let _strict = self.config.strict_validation.then(|| ctx.strict_scope());

        let mut chunks = ChunkReader::open(reader)?;
        let info = chunks
            .find_chunk(TAG_INFO)?
            .ok_or(SaveError::MissingChunk(TAG_INFO))?;
        let version = read_version(&mut chunks, &info)?;
        debug!("Savegame version 0x{:04x}", version);

        if version == 0 {
            return Err(SaveError::InvalidVersion);
        }
        if version != SAVEGAME_VERSION {
            if !self.config.accept_legacy {
                return Err(SaveError::VersionMismatch { found: version });
            }
            return self.load_legacy(mission, &mut chunks, ctx, version);
        }

        let layout = info_layout();
        layout.check_length(TAG_INFO, info.length)?;

        let mut staged = Mission::new();
        chunks.inner_mut().seek(SeekFrom::Start(info.payload_start))?;
        layout
            .load(&mut chunks.inner_mut().take(info.length as u64), &mut staged, ctx)
            .map_err(|e| SaveError::in_chunk(e, TAG_INFO))?;

        chunks.rewind()?;
        self.dispatch(&mut chunks, &mut staged, ctx)?;
        staged.commit_pending();

        *mission = staged;
        Ok(LoadOutcome::Resumed)
    }

    fn dispatch<R: Read + Seek>(
        &self,
        chunks: &mut ChunkReader<R>,
        mission: &mut Mission,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        while let Some(header) = chunks.next_chunk()? {
            match header.tag {
                TAG_NAME | TAG_INFO => {}
                tag => match self.handler(tag) {
                    Some(handler) => {
                        debug!("Loading '{}' chunk ({} bytes)", tag_name(&tag), header.length);
                        let mut payload = chunks.inner_mut().take(header.length as u64);
                        handler.load(mission, &mut payload, header.length, ctx)?;
                    }
                    None => warn!(
                        "Skipping unknown '{}' chunk ({} bytes)",
                        tag_name(&tag),
                        header.length
                    ),
                },
            }
            chunks.skip(&header)?;
        }
        Ok(())
    }

    /// Recover the scenario and the player's house from an older savegame
    /// and flag the mission for a restart. Everything else is left alone.
    fn load_legacy<R: Read + Seek>(
        &self,
        mission: &mut Mission,
        chunks: &mut ChunkReader<R>,
        ctx: &SaveContext,
        version: u16,
    ) -> Result<LoadOutcome, SaveError> {
        warn!(
            "Savegame version 0x{:04x} differs from 0x{:04x}; recovering scenario only",
            version, SAVEGAME_VERSION
        );

        chunks.rewind()?;
        let info = chunks
            .find_chunk(TAG_INFO)?
            .ok_or(SaveError::MissingChunk(TAG_INFO))?;
        let mut legacy = LegacyInfo::default();
        legacy_info_layout()
            .load(&mut chunks.inner_mut().take(info.length as u64), &mut legacy, ctx)
            .map_err(|e| SaveError::in_chunk(e, TAG_INFO))?;

        chunks.rewind()?;
        let plyr = chunks
            .find_chunk(TAG_PLYR)?
            .ok_or(SaveError::MissingChunk(TAG_PLYR))?;
        let mut payload = chunks.inner_mut().take(plyr.length as u64);
        let player = load_legacy_player_house(&mut payload, plyr.length, ctx)?;

        let mut staged = mission.clone();
        staged.scenario_id = legacy.scenario_id;
        staged.campaign_id = legacy.campaign_id;
        if let Some(house) = player {
            staged.player_house = house;
        }
        staged.restart_required = true;

        info!(
            "Recovered scenario {} of campaign {} from old savegame",
            legacy.scenario_id, legacy.campaign_id
        );
        *mission = staged;
        Ok(LoadOutcome::RestartRequired)
    }

    /// Description stored in the `NAME` chunk, without loading anything else.
    pub fn read_description<R: Read + Seek>(&self, reader: R) -> Result<String, SaveError> {
        let mut chunks = ChunkReader::open(reader)?;
        let name = chunks
            .find_chunk(TAG_NAME)?
            .ok_or(SaveError::MissingChunk(TAG_NAME))?;
        read_name(chunks.inner_mut(), name.length).map_err(|e| SaveError::in_chunk(e, TAG_NAME))
    }
}

/// Version stored in the first two bytes of `INFO`. Leaves the stream inside
/// the chunk payload.
fn read_version<R: Read + Seek>(
    chunks: &mut ChunkReader<R>,
    info: &ChunkHeader,
) -> Result<u16, SaveError> {
    if info.length < 2 {
        return Err(SaveError::Truncated(TAG_INFO));
    }
    let mut bytes = [0u8; 2];
    chunks
        .inner_mut()
        .read_exact(&mut bytes)
        .map_err(|e| SaveError::in_chunk(e, TAG_INFO))?;
    Ok(u16::from_le_bytes(bytes))
}

/// Every chunk header in the container, in file order.
pub fn scan_chunks<R: Read + Seek>(reader: R) -> Result<Vec<ChunkHeader>, SaveError> {
    let mut chunks = ChunkReader::open(reader)?;
    let mut headers = Vec::new();
    while let Some(header) = chunks.next_chunk()? {
        chunks.skip(&header)?;
        headers.push(header);
    }
    Ok(headers)
}

/// Savegame version of the container in `reader`.
pub fn read_savegame_version<R: Read + Seek>(reader: R) -> Result<u16, SaveError> {
    let mut chunks = ChunkReader::open(reader)?;
    let info = chunks
        .find_chunk(TAG_INFO)?
        .ok_or(SaveError::MissingChunk(TAG_INFO))?;
    read_version(&mut chunks, &info)
}
