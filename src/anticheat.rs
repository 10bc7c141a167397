//! Anti-Cheat Guard: watches for configured game processes to auto-switch
//! profiles, and separately flags when a running process belongs to a
//! known kernel-level anti-cheat family so the UI can warn before the user
//! saves a profile that hides devices behind it. See spec §4.14.
//!
//! Generalizes the teacher's `process_watcher.rs` ToolHelp32 polling loop:
//! same thread/atomic-flag shape, decoupled from Tauri so the match/detect
//! logic is plain and unit-testable, with the app-facing side effects
//! (profile activation, events) delivered through a callback instead of
//! reaching into `AppState` directly.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const EMBEDDED_ANTICHEAT_GAMES: &str = include_str!("../resources/anticheat-games.json");

/// Auto-activates `profile_id` whenever `exe_name` is seen running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRule {
    pub id: String,
    pub exe_name: String,
    pub profile_id: String,
    pub enabled: bool,
}

impl GameRule {
    pub fn new(exe_name: String, profile_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            exe_name,
            profile_id,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AnticheatFamilyEntry {
    family: String,
    processes: Vec<String>,
}

/// Known kernel-level anti-cheat process families, loaded once at startup.
pub struct AnticheatKb {
    families: Vec<AnticheatFamilyEntry>,
}

impl AnticheatKb {
    pub fn load(resource_dir: Option<&std::path::Path>) -> Self {
        let raw = resource_dir
            .and_then(|dir| std::fs::read_to_string(dir.join("anticheat-games.json")).ok())
            .unwrap_or_else(|| EMBEDDED_ANTICHEAT_GAMES.to_string());
        let families = serde_json::from_str(&raw).unwrap_or_default();
        Self { families }
    }

    /// The family name of the first match, if any running process name is
    /// a known anti-cheat process (case-insensitive).
    pub fn detect(&self, running: &[String]) -> Option<&str> {
        self.families
            .iter()
            .find(|f| {
                f.processes
                    .iter()
                    .any(|ac| running.iter().any(|p| p.eq_ignore_ascii_case(ac)))
            })
            .map(|f| f.family.as_str())
    }
}

impl Default for AnticheatKb {
    fn default() -> Self {
        Self::load(None)
    }
}

/// Public wrapper over the platform process list, for one-off checks (e.g.
/// the profile-save anti-cheat warning) that don't need the full watcher.
pub fn snapshot_running_processes() -> Vec<String> {
    list_running_processes()
}

/// First enabled rule whose `exe_name` is currently running.
pub fn match_rule<'a>(processes: &[String], rules: &'a [GameRule]) -> Option<&'a GameRule> {
    rules
        .iter()
        .filter(|r| r.enabled)
        .find(|r| processes.iter().any(|p| p.eq_ignore_ascii_case(&r.exe_name)))
}

#[derive(Debug, Clone)]
pub enum WatcherEvent {
    /// A rule's game launched; switch to this profile.
    GameLaunched { rule_id: String, profile_id: String },
    /// The previously-matched game exited; revert to whatever was active
    /// before it launched (`None` if nothing was).
    GameExited,
}

pub type EventCallback = Arc<dyn Fn(WatcherEvent) + Send + Sync>;

pub struct ProcessWatcher {
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl ProcessWatcher {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn start(&mut self, rules: Vec<GameRule>, on_event: EventCallback) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = std::thread::Builder::new()
            .name("padswitch-anticheat-watcher".into())
            .spawn(move || watcher_loop(running, rules, on_event))
            .expect("failed to spawn anti-cheat watcher thread");

        self.thread_handle = Some(handle);
        log::info!("process watcher started");
    }

    pub fn stop(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        log::info!("process watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for ProcessWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watcher_loop(running: Arc<AtomicBool>, rules: Vec<GameRule>, on_event: EventCallback) {
    let mut active_rule_id: Option<String> = None;

    while running.load(Ordering::SeqCst) {
        let processes = list_running_processes();
        let matched = match_rule(&processes, &rules);

        match (&active_rule_id, matched) {
            (None, Some(rule)) => {
                log::info!("game detected: {} — activating profile {}", rule.exe_name, rule.profile_id);
                on_event(WatcherEvent::GameLaunched {
                    rule_id: rule.id.clone(),
                    profile_id: rule.profile_id.clone(),
                });
                active_rule_id = Some(rule.id.clone());
            }
            (Some(_), None) => {
                log::info!("game exited — reverting");
                on_event(WatcherEvent::GameExited);
                active_rule_id = None;
            }
            (Some(current_id), Some(rule)) if *current_id != rule.id => {
                log::info!("game switch — activating profile {}", rule.profile_id);
                on_event(WatcherEvent::GameLaunched {
                    rule_id: rule.id.clone(),
                    profile_id: rule.profile_id.clone(),
                });
                active_rule_id = Some(rule.id.clone());
            }
            _ => {}
        }

        for _ in 0..30 {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

#[cfg(windows)]
fn list_running_processes() -> Vec<String> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };

    unsafe {
        let snapshot = match CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("CreateToolhelp32Snapshot failed: {}", e);
                return vec![];
            }
        };

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut names = Vec::new();

        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let end = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let name = String::from_utf16_lossy(&entry.szExeFile[..end]);
                if !name.is_empty() {
                    names.push(name);
                }

                entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;
                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }

        let _ = CloseHandle(snapshot);
        names
    }
}

#[cfg(not(windows))]
fn list_running_processes() -> Vec<String> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_rule_finds_enabled_rule_by_process_name() {
        let rules = vec![GameRule::new("eldenring.exe".into(), "profile-1".into())];
        let processes = vec!["explorer.exe".to_string(), "EldenRing.exe".to_string()];
        let matched = match_rule(&processes, &rules);
        assert_eq!(matched.unwrap().profile_id, "profile-1");
    }

    #[test]
    fn match_rule_skips_disabled_rules() {
        let mut rule = GameRule::new("eldenring.exe".into(), "profile-1".into());
        rule.enabled = false;
        let processes = vec!["eldenring.exe".to_string()];
        assert!(match_rule(&processes, &[rule]).is_none());
    }

    #[test]
    fn anticheat_kb_detects_known_family_case_insensitively() {
        let kb = AnticheatKb::default();
        let running = vec!["explorer.exe".to_string(), "easyanticheat.exe".to_string()];
        assert_eq!(kb.detect(&running), Some("Easy Anti-Cheat"));
    }

    #[test]
    fn anticheat_kb_returns_none_for_unremarkable_process_list() {
        let kb = AnticheatKb::default();
        let running = vec!["explorer.exe".to_string(), "chrome.exe".to_string()];
        assert_eq!(kb.detect(&running), None);
    }
}
