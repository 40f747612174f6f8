//! Application Settings
//!
//! Persistent settings stored as JSON in ~/.config/revisit/settings.json,
//! overridable per process through `REVISIT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::arbiter::ArbiterPolicy;
use crate::constants::paths;
use crate::data::validate_file_size;
use crate::error::{Result, RevisitError};

pub const ENV_STORE: &str = "REVISIT_STORE";
pub const ENV_CAPTURE_DIR: &str = "REVISIT_CAPTURE_DIR";
pub const ENV_SOCKET: &str = "REVISIT_SOCKET";
pub const ENV_RECORD_EXACT_REVISITS: &str = "REVISIT_RECORD_EXACT_REVISITS";
pub const ENV_LOG: &str = "REVISIT_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Known-identity store CSV
    pub store_path: PathBuf,
    /// Where named captures are written
    pub capture_dir: PathBuf,
    /// Daemon socket
    pub socket_path: PathBuf,
    /// Append exact revisits as new log entries instead of only confirming them
    pub record_exact_revisits: bool,
    /// tracing-subscriber filter directive
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let data = paths::user_data_dir();
        Self {
            store_path: data.join(paths::STORE_FILE),
            capture_dir: data.join(paths::CAPTURE_DIR),
            socket_path: PathBuf::from(paths::SOCKET_PATH),
            record_exact_revisits: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn arbiter_policy(&self) -> ArbiterPolicy {
        ArbiterPolicy {
            record_exact_revisits: self.record_exact_revisits,
        }
    }

    /// Apply `REVISIT_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_STORE) {
            self.store_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_CAPTURE_DIR) {
            self.capture_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_SOCKET) {
            self.socket_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_RECORD_EXACT_REVISITS) {
            self.record_exact_revisits = parse_bool(&v).ok_or_else(|| RevisitError::InvalidConfig {
                field: ENV_RECORD_EXACT_REVISITS.to_string(),
                reason: format!("expected a boolean, got {:?}", v),
            })?;
        }
        if let Ok(v) = std::env::var(ENV_LOG) {
            self.log_level = v;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get the settings file path
pub fn get_settings_path() -> Result<PathBuf> {
    let dir = paths::user_config_dir()
        .ok_or_else(|| RevisitError::config("Could not determine config directory"))?;
    Ok(dir.join(paths::SETTINGS_FILE))
}

/// Load settings from the default location, then apply environment overrides
pub fn load_settings() -> Result<Settings> {
    let mut settings = load_settings_from(&get_settings_path()?)?;
    settings.apply_env()?;
    Ok(settings)
}

/// Load settings from a JSON file. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    validate_file_size(path)?;

    let content = fs::read_to_string(path).map_err(|e| RevisitError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content)
        .map_err(|e| RevisitError::config(format!("Failed to parse settings JSON: {}", e)))
}

/// Save settings to the default location
pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let path = get_settings_path()?;
    save_settings_to(settings, &path)?;
    Ok(path)
}

/// Save settings to a JSON file
/// Uses atomic write (temp file + rename) to prevent corruption on crash
pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RevisitError::config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let json = serde_json::to_string_pretty(settings)?;

    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| RevisitError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(json.as_bytes()).map_err(|e| RevisitError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    file.sync_all().map_err(|e| RevisitError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;

    drop(file);

    fs::rename(&temp_path, path).map_err(|e| RevisitError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for key in [ENV_STORE, ENV_CAPTURE_DIR, ENV_SOCKET, ENV_RECORD_EXACT_REVISITS, ENV_LOG] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.record_exact_revisits);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg").join("settings.json");
        let settings = Settings {
            store_path: PathBuf::from("/tmp/fp.csv"),
            record_exact_revisits: true,
            ..Settings::default()
        };
        save_settings_to(&settings, &path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"log_level": "debug"}"#).unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.store_path, Settings::default().store_path);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(load_settings_from(&path), Err(RevisitError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_STORE, "/data/store.csv");
        std::env::set_var(ENV_RECORD_EXACT_REVISITS, "yes");

        let mut settings = Settings::default();
        settings.apply_env().unwrap();
        assert_eq!(settings.store_path, PathBuf::from("/data/store.csv"));
        assert!(settings.record_exact_revisits);
        assert!(settings.arbiter_policy().record_exact_revisits);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_rejects_bad_bool() {
        clear_env();
        std::env::set_var(ENV_RECORD_EXACT_REVISITS, "maybe");
        let mut settings = Settings::default();
        assert!(matches!(
            settings.apply_env(),
            Err(RevisitError::InvalidConfig { .. })
        ));
        clear_env();
    }
}
