//! Application settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use hitloop_registry::RegistryConfig;
use hitloop_sim::{VirtualDeviceConfig, World, DEFAULT_SEED};
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// TCP address frames are accepted on
    pub listen_addr: String,
    /// Registry layout and timing
    #[serde(default)]
    pub registry: RegistryConfig,
    /// How often device snapshots are logged (ms)
    pub snapshot_interval_ms: u64,
    /// Simulated devices to run alongside real ones
    #[serde(default)]
    pub simulated_devices: Vec<VirtualDeviceConfig>,
    /// Extra simulated devices with random placement
    #[serde(default)]
    pub random_devices: usize,
    /// Seed for simulated motion
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Floor the simulated devices move on
    #[serde(default)]
    pub world: World,
    /// Period between simulated frame batches (ms)
    #[serde(default = "default_emit_interval")]
    pub emit_interval_ms: u64,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_emit_interval() -> u64 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5003".to_string(),
            registry: RegistryConfig::default(),
            snapshot_interval_ms: 2000,
            simulated_devices: Vec::new(),
            random_devices: 0,
            seed: DEFAULT_SEED,
            world: World::default(),
            emit_interval_ms: 50,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for hitloop
    /// Uses $XDG_CONFIG_HOME/hitloop on Linux/macOS, falls back to ~/.config/hitloop
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("hitloop"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("hitloop"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a file, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }
}
