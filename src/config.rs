use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codepage::Language;
use crate::game::{self, GameVariant};

/// Optional per-directory settings file.
pub const SETTINGS_FILE: &str = "magos.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io{ path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Parse{ path: PathBuf, source: toml::de::Error },
    #[error("unknown game '{0}'")]
    UnknownGame(String),
    #[error("no game given, use one of: {0}")]
    NoGame(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub game: Option<String>,
    pub language: Option<Language>,
    pub strings: PathBuf,
    pub scripts: PathBuf,
    pub objects: PathBuf,
    /// Soundbank to split into samples on extraction.
    pub voices: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings{
            game: None,
            language: None,
            strings: PathBuf::from("strings.txt"),
            scripts: PathBuf::from("scripts.txt"),
            objects: PathBuf::from("objects.txt"),
            voices: None,
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str, path: &Path) -> Result<Settings, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse{ path: path.to_path_buf(), source })
    }

    /// Reads `magos.toml` from the game directory. A missing file gives the defaults.
    pub fn load(game_dir: &Path) -> Result<Settings, ConfigError> {
        let path = game_dir.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => {
                info!("using settings from {}", path.display());
                Settings::from_toml(&text, &path)
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(source) => Err(ConfigError::Io{ path, source }),
        }
    }

    pub fn variant(&self) -> Result<&'static GameVariant, ConfigError> {
        match &self.game {
            Some(id) => game::find_variant(id).ok_or_else(|| ConfigError::UnknownGame(id.clone())),
            None => Err(ConfigError::NoGame(game::variant_ids().join(", "))),
        }
    }

    pub fn language_for(&self, variant: &GameVariant) -> Language {
        self.language.unwrap_or(variant.default_language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml("", Path::new("magos.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.scripts, PathBuf::from("scripts.txt"));
    }

    #[test]
    fn reads_fields() {
        let text = "game = \"simon2-talkie\"\nlanguage = \"he\"\nstrings = \"heb.txt\"\nvoices = \"SIMON2.VOC\"\n";
        let settings = Settings::from_toml(text, Path::new("magos.toml")).unwrap();
        assert_eq!(settings.language, Some(Language::Hebrew));
        assert_eq!(settings.strings, PathBuf::from("heb.txt"));
        assert_eq!(settings.objects, PathBuf::from("objects.txt"));
        assert_eq!(settings.voices, Some(PathBuf::from("SIMON2.VOC")));
        let variant = settings.variant().unwrap();
        assert_eq!(variant.basefile, "GSPTR30");
        assert_eq!(settings.language_for(variant), Language::Hebrew);
    }

    #[test]
    fn rejects_unknown_keys_and_games() {
        assert!(matches!(Settings::from_toml("colour = 1\n", Path::new("x")), Err(ConfigError::Parse{ .. })));
        let settings = Settings{ game: Some("elvira1".into()), ..Settings::default() };
        assert!(matches!(settings.variant(), Err(ConfigError::UnknownGame(_))));
        assert!(matches!(Settings::default().variant(), Err(ConfigError::NoGame(_))));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/agostools/dir")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
