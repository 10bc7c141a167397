use crate::anticheat::GameRule;
use crate::error::{PadSwitchError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Profile records themselves live one-per-file under `profiles/`, see
/// `profile.rs`; only the active selection and app-wide toggles live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub auto_start: bool,
    pub start_minimized: bool,
    pub auto_forward_on_launch: bool,
    pub active_profile_id: Option<String>,
    /// Auto-launch the anti-cheat process watcher at startup.
    pub auto_switch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_start: false,
            start_minimized: false,
            auto_forward_on_launch: false,
            active_profile_id: None,
            auto_switch: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub settings: Settings,
    #[serde(default)]
    pub game_rules: Vec<GameRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            game_rules: vec![],
        }
    }
}

impl AppConfig {
    fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| PadSwitchError::Config("Cannot find config directory".into()))?
            .join("padswitch");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("config.json"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, data)?;
        Ok(())
    }
}
