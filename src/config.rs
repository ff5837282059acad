//! Savegame behaviour settings, read from a TOML file.

use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Open a strict validation scope around every load and save.
    pub strict_validation: bool,
    /// Recover older savegames through the restart-forcing legacy path.
    /// When false a version mismatch fails the load.
    pub accept_legacy: bool,
    /// Default `env_logger` filter for the command-line tool.
    pub log_filter: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        SaveConfig {
            strict_validation: true,
            accept_legacy: true,
            log_filter: "info".to_string(),
        }
    }
}

impl SaveConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Invalid savegame config: {}", e))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = SaveConfig::from_toml_str("accept_legacy = false\n").unwrap();
        assert!(!config.accept_legacy);
        assert!(config.strict_validation);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(SaveConfig::from_toml_str("").unwrap(), SaveConfig::default());
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(SaveConfig::from_toml_str("strict_validation = \"yes\"").is_err());
    }
}
