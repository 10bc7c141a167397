//! VID→brand and VID+PID→friendly-name lookups, plus the integrated-gamepad
//! flag. See spec §4.5.

use serde::Deserialize;
use std::collections::HashMap;

const EMBEDDED_VENDORS: &str = include_str!("../resources/known-vendors.json");
const EMBEDDED_DEVICES: &str = include_str!("../resources/known-devices.json");

#[derive(Debug, Clone, Deserialize)]
struct KnownDeviceEntry {
    name: String,
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    integrated: bool,
}

#[derive(Debug, Clone)]
pub struct KnownDevice {
    pub name: String,
    pub confirmed: bool,
}

/// Two read-only maps loaded once at startup. Both are case-insensitive on
/// their hex keys; an absent or corrupt data file yields empty maps rather
/// than failing startup.
pub struct KnowledgeBase {
    vendors: HashMap<String, String>,
    devices: HashMap<(String, String), KnownDeviceEntry>,
}

impl KnowledgeBase {
    /// Load from `resource_dir` (as resolved by the Tauri path API) if
    /// present and parseable, falling back to the copy embedded in the
    /// binary at build time.
    pub fn load(resource_dir: Option<&std::path::Path>) -> Self {
        let vendors = resource_dir
            .and_then(|dir| std::fs::read_to_string(dir.join("known-vendors.json")).ok())
            .or_else(|| Some(EMBEDDED_VENDORS.to_string()))
            .and_then(|s| serde_json::from_str::<HashMap<String, String>>(&s).ok())
            .unwrap_or_default();

        let devices_raw = resource_dir
            .and_then(|dir| std::fs::read_to_string(dir.join("known-devices.json")).ok())
            .or_else(|| Some(EMBEDDED_DEVICES.to_string()))
            .and_then(|s| serde_json::from_str::<HashMap<String, KnownDeviceEntry>>(&s).ok())
            .unwrap_or_default();

        let devices = devices_raw
            .into_iter()
            .filter_map(|(key, entry)| {
                let (vid, pid) = key.split_once(':')?;
                Some(((vid.to_ascii_uppercase(), pid.to_ascii_uppercase()), entry))
            })
            .collect();

        Self {
            vendors: vendors
                .into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect(),
            devices,
        }
    }

    pub fn brand_for(&self, vid: &str) -> Option<String> {
        self.vendors.get(&vid.to_ascii_uppercase()).cloned()
    }

    pub fn known_device(&self, vid: &str, pid: &str) -> Option<KnownDevice> {
        self.devices
            .get(&(vid.to_ascii_uppercase(), pid.to_ascii_uppercase()))
            .map(|e| KnownDevice {
                name: e.name.clone(),
                confirmed: e.confirmed,
            })
    }

    pub fn is_integrated(&self, vid: &str, pid: &str) -> bool {
        self.devices
            .get(&(vid.to_ascii_uppercase(), pid.to_ascii_uppercase()))
            .map(|e| e.integrated)
            .unwrap_or(false)
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::load(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_fallback_parses() {
        let kb = KnowledgeBase::load(None);
        // Sanity: at least the well-known Microsoft vendor entry resolves.
        assert!(kb.brand_for("045E").is_some());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let kb = KnowledgeBase::load(None);
        assert_eq!(kb.brand_for("045e"), kb.brand_for("045E"));
    }

    #[test]
    fn absent_file_and_bad_dir_yields_embedded_not_empty() {
        let kb = KnowledgeBase::load(Some(std::path::Path::new("/nonexistent/dir")));
        assert!(kb.brand_for("045E").is_some());
    }
}
