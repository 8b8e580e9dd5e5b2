use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::numeric::NegativeInputPolicy;
use crate::utils::path::{get_database_path, get_export_directory};

/// Loggnivå för binären
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Höj nivån med antal `-v`
    pub fn raised_by(&self, steps: u8) -> Self {
        let all = [Self::Error, Self::Warn, Self::Info, Self::Debug, Self::Trace];
        let current = all.iter().position(|l| l == self).unwrap_or(2);
        all[(current + steps as usize).min(all.len() - 1)]
    }
}

/// Applikationsinställningar som inte sparas i databasen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSettings {
    pub database_path: PathBuf,
    pub export_directory: PathBuf,
    pub log_level: LogLevel,
    pub negative_input_policy: NegativeInputPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            database_path: get_database_path(),
            export_directory: get_export_directory(),
            log_level: LogLevel::default(),
            negative_input_policy: NegativeInputPolicy::default(),
        }
    }
}

impl AppSettings {
    /// Saknad eller trasig fil ger standardvärden
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Ogiltig inställningsfil {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}

impl<'de> Deserialize<'de> for AppSettings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct AppSettingsHelper {
            database_path: Option<PathBuf>,
            export_directory: Option<PathBuf>,
            log_level: Option<LogLevel>,
            negative_input_policy: Option<NegativeInputPolicy>,
        }

        let helper = AppSettingsHelper::deserialize(deserializer)?;
        let defaults = AppSettings::default();

        Ok(AppSettings {
            database_path: helper.database_path.unwrap_or(defaults.database_path),
            export_directory: helper.export_directory.unwrap_or(defaults.export_directory),
            log_level: helper.log_level.unwrap_or(defaults.log_level),
            negative_input_policy: helper
                .negative_input_policy
                .unwrap_or(defaults.negative_input_policy),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_toml_roundtrip() {
        let settings = AppSettings {
            database_path: PathBuf::from("/data/ops.db"),
            export_directory: PathBuf::from("/data/exports"),
            log_level: LogLevel::Debug,
            negative_input_policy: NegativeInputPolicy::ClampToZero,
        };
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let loaded: AppSettings = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_settings_fall_back_per_field() {
        let partial = r#"
negative_input_policy = "clamp_to_zero"
"#;
        let loaded: AppSettings = toml::from_str(partial).unwrap();
        assert_eq!(loaded.negative_input_policy, NegativeInputPolicy::ClampToZero);
        assert_eq!(loaded.log_level, LogLevel::Info);
        assert_eq!(loaded.database_path, get_database_path());
    }

    #[test]
    fn test_save_to_creates_parent_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = AppSettings {
            log_level: LogLevel::Warn,
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let loaded = AppSettings::load_from(Path::new("/nonexistent/opsboard/settings.toml"));
        assert_eq!(loaded, AppSettings::default());
    }

    #[test]
    fn test_log_level_raise() {
        assert_eq!(LogLevel::Info.raised_by(1), LogLevel::Debug);
        assert_eq!(LogLevel::Info.raised_by(5), LogLevel::Trace);
        assert_eq!(LogLevel::Warn.raised_by(0), LogLevel::Warn);
    }
}
