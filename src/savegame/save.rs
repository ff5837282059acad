//! Writing savegames. Always produces the current version.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use log::{error, info};

use super::chunk::ChunkWriter;
use super::info::{info_layout, write_name};
use super::{SaveManager, TAG_INFO, TAG_NAME};
use crate::context::SaveContext;
use crate::error::SaveError;
use crate::mission::Mission;

impl SaveManager {
    /// Save `mission` to `path`. A failure is logged and may leave a
    /// partially written file behind.
    pub fn save(
        &self,
        mission: &Mission,
        ctx: &SaveContext,
        path: &Path,
        description: &str,
    ) -> bool {
        let file = match File::create(path) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to create savegame {:?}: {}", path, e);
                return false;
            }
        };

        match self.save_to(mission, BufWriter::new(file), ctx, description) {
            Ok(_) => {
                info!("Saved {:?} to {:?}", description, path);
                true
            }
            Err(e) => {
                error!("Failed to save {:?}: {}", path, e);
                false
            }
        }
    }

    /// Write `NAME`, `INFO` and one chunk per handler to `writer`, returning
    /// the flushed writer.
    pub fn save_to<W: Write + Seek>(
        &self,
        mission: &Mission,
        writer: W,
        ctx: &SaveContext,
        description: &str,
    ) -> Result<W, SaveError> {
        let _strict = self.config.strict_validation.then(|| ctx.strict_scope());

        let mut chunks = ChunkWriter::open(writer)?;
        chunks.write_chunk(TAG_NAME, |w| write_name(w, description))?;

        let layout = info_layout();
        chunks.write_chunk(TAG_INFO, |w| layout.save(w, mission, ctx))?;

        for handler in &self.handlers {
            chunks.write_chunk(handler.tag(), |w| handler.save(mission, w, ctx))?;
        }

        Ok(chunks.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::savegame::chunk::ChunkReader;
    use crate::savegame::SAVEGAME_VERSION;
    use std::io::{Cursor, Read};

    #[test_log::test]
    fn info_chunk_follows_name() {
        let bytes = SaveManager::default()
            .save_to(&Mission::new(), Cursor::new(Vec::new()), &SaveContext::new(0), "hello")
            .unwrap()
            .into_inner();

        let mut chunks = ChunkReader::open(Cursor::new(bytes)).unwrap();
        let name = chunks.next_chunk().unwrap().unwrap();
        assert_eq!(name.tag, TAG_NAME);
        assert_eq!(name.length, 6);
        chunks.skip(&name).unwrap();

        let info = chunks.next_chunk().unwrap().unwrap();
        assert_eq!(info.tag, TAG_INFO);
        assert_eq!(info.length as usize, info_layout().length());
        let mut version = [0u8; 2];
        chunks.inner_mut().read_exact(&mut version).unwrap();
        assert_eq!(u16::from_le_bytes(version), SAVEGAME_VERSION);
    }

    #[test_log::test]
    fn strict_scope_closes_after_save() {
        let ctx = SaveContext::new(0);
        SaveManager::default()
            .save_to(&Mission::new(), Cursor::new(Vec::new()), &ctx, "")
            .unwrap();
        assert_eq!(ctx.strict_depth(), 0);
    }

    #[test_log::test]
    fn save_to_a_directory_fails() {
        let ctx = SaveContext::new(0);
        assert!(!SaveManager::default().save(&Mission::new(), &ctx, &std::env::temp_dir(), "nope"));
    }
}
