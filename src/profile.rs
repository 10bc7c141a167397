//! Per-game profile record and its own persistence store. Spec.md §6 names
//! the record shape and §4.13 names the resolver that consumes it, but not
//! the store; this follows the teacher's `config.rs` save discipline,
//! split into one file per profile under `profiles/` so individual
//! profiles can be copied, versioned, or hand-edited independently.

use crate::error::{PadSwitchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One saved device-to-slot preference. Identified by vid:pid rather than
/// by slot or instance path, since both of those change across sessions as
/// the OS reassigns XInput slots and Windows mints a fresh instance path
/// for a Bluetooth reconnect; `profile_resolver` re-derives the concrete
/// `SlotAssignment` from whichever physical interface currently matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub vid: String,
    pub pid: String,
    pub target_slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub entries: Vec<ProfileEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(name: String, entries: Vec<ProfileEntry>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            entries,
            created_at: now,
            updated_at: now,
        }
    }
}

fn profiles_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| PadSwitchError::Config("cannot find config directory".into()))?
        .join("padswitch")
        .join("profiles");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Strip path separators and control characters so a profile name can't
/// escape the profiles directory or produce an invalid filename.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct ProfileStore;

impl ProfileStore {
    fn path_for(profile: &Profile) -> Result<PathBuf> {
        Ok(profiles_dir()?.join(format!("{}.json", sanitize_filename(&profile.name))))
    }

    pub fn list() -> Result<Vec<Profile>> {
        let dir = profiles_dir()?;
        let mut profiles = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(data) => match serde_json::from_str::<Profile>(&data) {
                    Ok(profile) => profiles.push(profile),
                    Err(e) => log::warn!("skipping malformed profile {:?}: {}", entry.path(), e),
                },
                Err(e) => log::warn!("failed to read profile {:?}: {}", entry.path(), e),
            }
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    pub fn save(profile: &mut Profile) -> Result<()> {
        profile.updated_at = Utc::now();
        let path = Self::path_for(profile)?;
        let json = serde_json::to_string_pretty(profile)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn delete(profile: &Profile) -> Result<()> {
        let path = Self::path_for(profile)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_strips_separators() {
        assert_eq!(sanitize_filename("Elden/Ring\\Save"), "Elden_Ring_Save");
    }

    #[test]
    fn sanitize_filename_empty_becomes_untitled() {
        assert_eq!(sanitize_filename("   "), "untitled");
    }

    #[test]
    fn new_profile_gets_a_v4_id_and_matching_timestamps() {
        let profile = Profile::new("Elden Ring".into(), vec![]);
        assert_eq!(profile.id.len(), 36);
        assert_eq!(profile.created_at, profile.updated_at);
    }
}
