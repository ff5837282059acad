//! Chunked mission savegames.
//!
//! [`savegame`] holds the container codec, the declarative field layouts and
//! the save/load orchestration; [`mission`] holds the state being saved and
//! the per-chunk handlers.

pub mod config;
pub mod context;
pub mod error;
pub mod mission;
pub mod savegame;

pub use config::SaveConfig;
pub use context::{SaveContext, StrictScope};
pub use error::SaveError;
pub use mission::Mission;
pub use savegame::{ChunkHandler, LoadOutcome, SaveManager};
