//! Application-level configuration loading: player colour palette and room-code generation.

use std::{
    env, fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WHOSE_SONG_CONFIG_PATH";
const DEFAULT_ROOM_CODE_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    colors: Vec<String>,
    room_code_attempts: u32,
}

impl AppConfig {
    /// Load the configuration from `WHOSE_SONG_CONFIG_PATH` or `config/app.json`,
    /// falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load from `path`, falling back to defaults on any failure.
    pub fn load_from(path: &Path) -> Self {
        match read_raw(path) {
            Ok(raw) => {
                let config = Self::from(raw);
                info!(
                    path = %path.display(),
                    colors = config.colors.len(),
                    room_code_attempts = config.room_code_attempts,
                    "loaded configuration"
                );
                config
            }
            Err(ConfigLoadError::Read(err)) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file; using built-in defaults");
                Self::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "using built-in defaults");
                Self::default()
            }
        }
    }

    /// Player colour palette, in assignment order.
    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// Palette spelling of `color`, if it belongs to the palette.
    pub fn palette_color(&self, color: &str) -> Option<&str> {
        self.colors
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(color))
            .map(String::as_str)
    }

    /// First palette colour not listed in `used`, wrapping to the first entry when all are taken.
    pub fn first_unused_color(&self, used: &[&str]) -> Option<&str> {
        self.colors
            .iter()
            .find(|candidate| used.iter().all(|existing| !existing.eq_ignore_ascii_case(candidate)))
            .or_else(|| self.colors.first())
            .map(String::as_str)
    }

    /// How many random room codes are tried before creation fails.
    pub fn room_code_attempts(&self) -> u32 {
        self.room_code_attempts
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            room_code_attempts: DEFAULT_ROOM_CODE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    colors: Vec<String>,
    #[serde(default)]
    room_code_attempts: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let colors = if value.colors.is_empty() {
            default_colors()
        } else {
            value.colors
        };
        Self {
            colors,
            room_code_attempts: value
                .room_code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(DEFAULT_ROOM_CODE_ATTEMPTS),
        }
    }
}

#[derive(Debug, Error)]
enum ConfigLoadError {
    #[error("failed to read config: {0}")]
    Read(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_colors() -> Vec<String> {
    [
        "#F6E6A8", "#F2C27B", "#F7A6A1", "#E86A5A", "#C6B7E2", "#CFEAF0", "#8BB7DE", "#7FC58E",
        "#C9D87A", "#FAF3E3",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_lookup_ignores_case() {
        let config = AppConfig::default();
        assert_eq!(config.palette_color("#f6e6a8"), Some("#F6E6A8"));
        assert_eq!(config.palette_color("#e86a5a"), Some("#E86A5A"));
        assert_eq!(config.palette_color("#000000"), None);
    }

    #[test]
    fn first_unused_color_skips_taken_entries() {
        let config = AppConfig::default();
        assert_eq!(config.first_unused_color(&[]), Some("#F6E6A8"));
        assert_eq!(config.first_unused_color(&["#f6e6a8"]), Some("#F2C27B"));

        let all: Vec<&str> = config.colors().iter().map(String::as_str).collect();
        assert_eq!(config.first_unused_color(&all), Some("#F6E6A8"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("does/not/exist.json"));
        assert_eq!(config.colors().len(), 10);
        assert_eq!(config.room_code_attempts(), DEFAULT_ROOM_CODE_ATTEMPTS);
    }

    #[test]
    fn raw_config_falls_back_per_field() {
        let raw: RawConfig = serde_json::from_str(r##"{ "roomCodeAttempts": 0 }"##).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.colors().len(), 10);
        assert_eq!(config.room_code_attempts(), DEFAULT_ROOM_CODE_ATTEMPTS);

        let raw: RawConfig =
            serde_json::from_str(r##"{ "colors": ["#123456"], "roomCodeAttempts": 3 }"##).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.colors(), ["#123456".to_string()]);
        assert_eq!(config.room_code_attempts(), 3);
    }
}
