//! Order/Nickname Store: persists the user's preferred card order and any
//! nicknames they've given controllers. See spec §4.12.
//!
//! Both are best-effort: a missing or corrupt file yields the default
//! value rather than failing, and a save failure is logged, never
//! propagated — losing a cosmetic preference isn't worth interrupting the
//! user's session over.

use crate::device::VisualOrder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("padswitch"))
}

fn order_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("slot-order.json"))
}

fn nicknames_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("nicknames.json"))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NicknameFile {
    /// "VID:PID" -> user-chosen display name.
    nicknames: HashMap<String, String>,
}

pub struct OrderStore;

impl OrderStore {
    pub fn load_order() -> VisualOrder {
        load_json(order_path().as_deref()).unwrap_or_default()
    }

    pub fn save_order(order: &VisualOrder) {
        save_json(order_path().as_deref(), order);
    }

    pub fn load_nicknames() -> HashMap<String, String> {
        load_json::<NicknameFile>(nicknames_path().as_deref())
            .unwrap_or_default()
            .nicknames
    }

    pub fn save_nicknames(nicknames: &HashMap<String, String>) {
        save_json(
            nicknames_path().as_deref(),
            &NicknameFile {
                nicknames: nicknames.clone(),
            },
        );
    }
}

fn load_json<T: serde::de::DeserializeOwned + Default>(path: Option<&Path>) -> Option<T> {
    let path = path?;
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

fn save_json<T: Serialize>(path: Option<&Path>, value: &T) {
    let Some(path) = path else { return };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("failed to create {}: {}", parent.display(), e);
            return;
        }
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                log::warn!("failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => log::warn!("failed to serialize {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_json_on_missing_path_returns_none() {
        let result: Option<NicknameFile> = load_json(Some(Path::new("/nonexistent/padswitch/nicknames.json")));
        assert!(result.is_none());
    }

    #[test]
    fn load_order_on_fresh_system_returns_default() {
        // Exercises the `None` config dir / missing file path without
        // touching the real filesystem.
        let result: Option<VisualOrder> = load_json(None);
        assert!(result.is_none());
    }
}
