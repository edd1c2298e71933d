use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adb::Adb;
use crate::error::{BridgeError, Result};
use crate::fastboot::Fastboot;

pub const DEFAULT_ADB_PROGRAM: &str = "adb";
pub const DEFAULT_FASTBOOT_PROGRAM: &str = "fastboot";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolSettings {
    /// Program name or absolute path. Empty means "use the default name and
    /// let the platform search path find it".
    pub command_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub adb: ToolSettings,
    #[serde(default)]
    pub fastboot: ToolSettings,
}

impl BridgeConfig {
    pub fn adb_program(&self) -> String {
        resolve_program(&self.adb.command_path, DEFAULT_ADB_PROGRAM)
    }

    pub fn fastboot_program(&self) -> String {
        resolve_program(&self.fastboot.command_path, DEFAULT_FASTBOOT_PROGRAM)
    }

    /// Builds the normal-mode client from the configured path. Purely a
    /// constructor; nothing runs until the caller asks.
    pub fn adb(&self) -> Adb {
        Adb::new(self.adb_program())
    }

    /// Builds the bootloader-mode client from the configured path.
    pub fn fastboot(&self) -> Fastboot {
        Fastboot::new(self.fastboot_program())
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("BLACKTEA_BRIDGE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".blacktea_bridge_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".blacktea_bridge_config.backup.json")
}

pub fn load_config() -> Result<BridgeConfig> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &BridgeConfig) -> Result<()> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| BridgeError::config(format!("failed to read config: {err}")))?;
    let config: BridgeConfig = serde_json::from_str(&raw)
        .map_err(|err| BridgeError::config(format!("failed to parse config: {err}")))?;
    Ok(config)
}

pub fn save_config_to_path(config: &BridgeConfig, path: &Path, backup_path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| BridgeError::config(format!("failed to serialize config: {err}")))?;
    fs::write(path, payload)
        .map_err(|err| BridgeError::config(format!("failed to write config: {err}")))?;
    Ok(())
}

/// Strips one layer of wrapping quotes, the kind that survives a copy-paste
/// from a shell or a Windows file dialog.
pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

fn resolve_program(configured: &str, default: &str) -> String {
    let normalized = normalize_command_path(configured);
    if normalized.is_empty() {
        default.to_string()
    } else {
        normalized
    }
}
