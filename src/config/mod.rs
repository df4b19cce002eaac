//! Spawn configuration persisted next to the definitions file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::NpcError;

/// Default location, relative to the server's working directory
pub const DEFAULT_CONFIG_PATH: &str = "npcs/config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpawnConfig {
    /// Custom NPC load around a player above which custom spawning pauses
    pub max_spawns: i32,
    /// One-in-N chance per tick and definition of a custom spawn
    pub spawn_rate: i32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            max_spawns: 5,
            spawn_rate: 600,
        }
    }
}

impl SpawnConfig {
    /// Read the config, falling back to defaults when the file is missing
    /// or unreadable. A missing file is created with the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            if let Err(err) = config.save(path) {
                warn!(path = %path.display(), error = %err, "Could not write default spawn config");
            }
            return config;
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Invalid spawn config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, NpcError> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&content)?.sanitized();
        info!(
            max_spawns = config.max_spawns,
            spawn_rate = config.spawn_rate,
            "Loaded spawn config"
        );
        Ok(config)
    }

    /// Replace non-positive values, which the commands would reject, with
    /// the defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.max_spawns < 1 {
            warn!(max_spawns = self.max_spawns, "MaxSpawns must be positive, using default");
            self.max_spawns = defaults.max_spawns;
        }
        if self.spawn_rate < 1 {
            warn!(spawn_rate = self.spawn_rate, "SpawnRate must be positive, using default");
            self.spawn_rate = defaults.spawn_rate;
        }
        self
    }

    pub fn save(&self, path: &Path) -> Result<(), NpcError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
