use crate::anticheat::{self, GameRule};
use crate::bus_classifier;
use crate::config::Settings;
use crate::device::{DriverStatus, MatchedController, SlotAssignment};
use crate::error::{PadSwitchError, Result};
use crate::hid_enum;
use crate::matcher;
use crate::profile::{Profile, ProfileEntry, ProfileStore};
use crate::profile_resolver;
use crate::slot_prober;
use crate::state::AppState;
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager, State};

/// Enumerate physical slots and HID interfaces and associate them. Shared
/// by every command that needs a fresh read of "what's plugged in".
fn snapshot_controllers(state: &AppState) -> Result<Vec<MatchedController>> {
    let slots = slot_prober::snapshot();
    let hids = hid_enum::devices()?;
    let matched = matcher::match_controllers(&slots, &hids, &state.kb);
    state.lock_inner().last_snapshot = matched.clone();
    Ok(matched)
}

#[tauri::command]
pub fn get_connected_devices(state: State<AppState>) -> Result<Vec<MatchedController>> {
    let matched = snapshot_controllers(&state)?;
    let order = state.lock_inner().order.clone();
    let keyed: Vec<(String, MatchedController)> = matched
        .into_iter()
        .map(|m| {
            let key = m
                .physical
                .as_ref()
                .map(|p| p.vid_pid())
                .unwrap_or_else(|| format!("SLOT:{}", m.slot_index));
            (key, m)
        })
        .collect();
    let sorted = order.apply(keyed);
    state
        .lock_inner()
        .reorder
        .sync_order(sorted.iter().map(|(key, _)| key.clone()).collect());
    Ok(sorted.into_iter().map(|(_, m)| m).collect())
}

#[tauri::command]
pub fn check_driver_status(state: State<AppState>) -> Result<DriverStatus> {
    Ok(DriverStatus {
        hidhide_installed: state.forwarding.filter_available(),
        vigembus_installed: state.forwarding.vigem_installed(),
        hidhide_version: None,
        vigembus_version: None,
    })
}

/// Toggle visibility of one physical HID interface, independent of the
/// Forwarding Service's own hide/unhide bookkeeping (this is the manual
/// "eye" control in the device list).
#[tauri::command]
pub fn toggle_device(state: State<AppState>, instance_path: String, hidden: bool) -> Result<()> {
    let instance_id = hid_enum::hidhide_instance_id(&instance_path);
    if hidden {
        state.forwarding.hide_device(&instance_id)
    } else {
        state.forwarding.unhide_device(&instance_id)
    }
}

#[tauri::command]
pub fn start_forwarding(
    app: AppHandle,
    state: State<AppState>,
    assignments: Vec<SlotAssignment>,
) -> Result<()> {
    let hids = hid_enum::devices()?;
    state.forwarding.start(&assignments, &hids)?;
    let _ = app.emit("forwarding-status", serde_json::json!({ "active": true }));
    Ok(())
}

#[tauri::command]
pub fn update_mapping(state: State<AppState>, assignments: Vec<SlotAssignment>) -> Result<()> {
    state.forwarding.update_mapping(&assignments)
}

#[tauri::command]
pub fn stop_forwarding(app: AppHandle, state: State<AppState>) -> Result<()> {
    state.forwarding.stop()?;
    let _ = app.emit("forwarding-status", serde_json::json!({ "active": false }));
    Ok(())
}

#[tauri::command]
pub fn is_forwarding(state: State<AppState>) -> bool {
    state.forwarding.is_forwarding()
}

// --- Profile commands ---

#[tauri::command]
pub fn get_profiles() -> Result<Vec<Profile>> {
    ProfileStore::list()
}

#[derive(Debug, Serialize)]
pub struct SaveProfileResult {
    pub profile: Profile,
    /// Name of a detected kernel-level anti-cheat family, if one is
    /// currently running — surfaced so the UI can warn that hiding
    /// devices behind it may trigger a ban.
    pub anticheat_warning: Option<String>,
}

#[tauri::command]
pub fn save_profile(
    state: State<AppState>,
    name: String,
    entries: Vec<ProfileEntry>,
) -> Result<SaveProfileResult> {
    let mut profile = Profile::new(name, entries);
    ProfileStore::save(&mut profile)?;

    let running = anticheat::snapshot_running_processes();
    let anticheat_warning = state.anticheat_kb.detect(&running).map(|f| f.to_string());

    Ok(SaveProfileResult {
        profile,
        anticheat_warning,
    })
}

#[tauri::command]
pub fn delete_profile(state: State<AppState>, profile_id: String) -> Result<()> {
    let profiles = ProfileStore::list()?;
    let Some(profile) = profiles.into_iter().find(|p| p.id == profile_id) else {
        return Ok(());
    };
    ProfileStore::delete(&profile)?;

    let mut inner = state.lock_inner();
    inner.config.game_rules.retain(|r| r.profile_id != profile_id);
    if inner.config.settings.active_profile_id.as_deref() == Some(profile_id.as_str()) {
        inner.config.settings.active_profile_id = None;
    }
    inner.config.save()?;
    Ok(())
}

#[tauri::command]
pub fn activate_profile(
    app: AppHandle,
    state: State<AppState>,
    profile_id: String,
) -> Result<Vec<SlotAssignment>> {
    let profiles = ProfileStore::list()?;
    let profile = profiles
        .into_iter()
        .find(|p| p.id == profile_id)
        .ok_or_else(|| PadSwitchError::Config("profile not found".into()))?;

    let connected = snapshot_controllers(&state)?;
    let assignments = profile_resolver::resolve(&profile, &connected);

    if state.forwarding.is_forwarding() {
        state.forwarding.update_mapping(&assignments)?;
    } else {
        let hids = hid_enum::devices()?;
        state.forwarding.start(&assignments, &hids)?;
    }

    {
        let mut inner = state.lock_inner();
        inner.config.settings.active_profile_id = Some(profile_id.clone());
        inner.config.save()?;
    }

    crate::tray::rebuild_tray_menu(&app);
    let _ = app.emit(
        "profile-activated",
        serde_json::json!({ "profile_id": profile_id, "assignments": assignments }),
    );

    Ok(assignments)
}

/// Nuclear reset: stop forwarding, deactivate and clear the filter driver,
/// clear the active profile. Use when controllers stop working.
#[tauri::command]
pub fn reset_all(app: AppHandle, state: State<AppState>) -> Result<()> {
    log::info!("reset all: starting full reset");

    state.lock_watcher().stop();
    state.forwarding.revert_all()?;

    {
        let mut inner = state.lock_inner();
        inner.config.settings.active_profile_id = None;
        let _ = inner.config.save();
    }

    let _ = app.emit("forwarding-status", serde_json::json!({ "active": false }));
    let _ = app.emit(
        "profile-activated",
        serde_json::json!({ "profile_id": null, "assignments": [] }),
    );
    crate::tray::rebuild_tray_menu(&app);

    log::info!("reset all: complete");
    Ok(())
}

// --- Environment commands ---

#[tauri::command]
pub fn is_elevated() -> bool {
    crate::platform::is_elevated()
}

/// Poll all XInput slots for a button press. Returns the slot that first
/// receives input, or `None` after ~5 seconds with no input. Used by the
/// "Identify" feature to confirm a card's physical slot.
#[tauri::command]
pub fn detect_xinput_slot() -> Result<Option<u8>> {
    let baseline: [u16; 4] = std::array::from_fn(|i| slot_prober::poll_buttons(i as u8).unwrap_or(0));

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        for slot in 0..4u8 {
            if let Some(buttons) = slot_prober::poll_buttons(slot) {
                if buttons & !baseline[slot as usize] != 0 {
                    return Ok(Some(slot));
                }
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(16));
    }
    Ok(None)
}

/// Classify the bus a HID interface is reachable through, for the UI
/// detail pane (already computed as part of `get_connected_devices`, but
/// exposed standalone for ad hoc inspection of one path).
#[tauri::command]
pub fn classify_bus(instance_path: String) -> String {
    format!("{:?}", bus_classifier::bus_for(&instance_path))
}

// --- Game rule commands ---

#[tauri::command]
pub fn get_game_rules(state: State<AppState>) -> Vec<GameRule> {
    state.lock_inner().config.game_rules.clone()
}

#[tauri::command]
pub fn add_game_rule(state: State<AppState>, exe_name: String, profile_id: String) -> Result<GameRule> {
    let profiles = ProfileStore::list()?;
    if !profiles.iter().any(|p| p.id == profile_id) {
        return Err(PadSwitchError::Config(format!(
            "profile '{}' does not exist",
            profile_id
        )));
    }
    let rule = GameRule::new(exe_name, profile_id);
    let mut inner = state.lock_inner();
    inner.config.game_rules.push(rule.clone());
    inner.config.save()?;
    Ok(rule)
}

#[tauri::command]
pub fn delete_game_rule(state: State<AppState>, rule_id: String) -> Result<()> {
    let mut inner = state.lock_inner();
    inner.config.game_rules.retain(|r| r.id != rule_id);
    inner.config.save()?;
    Ok(())
}

#[tauri::command]
pub fn toggle_game_rule(state: State<AppState>, rule_id: String, enabled: bool) -> Result<()> {
    let mut inner = state.lock_inner();
    if let Some(rule) = inner.config.game_rules.iter_mut().find(|r| r.id == rule_id) {
        rule.enabled = enabled;
    }
    inner.config.save()?;
    Ok(())
}

// --- Process watcher commands ---

#[tauri::command]
pub fn start_process_watcher(app: AppHandle, state: State<AppState>) -> Result<()> {
    let rules = state.lock_inner().config.game_rules.clone();
    let forwarding = state.forwarding.clone();
    let app_for_events = app.clone();

    state.lock_watcher().start(
        rules,
        std::sync::Arc::new(move |event| handle_watcher_event(&app_for_events, &forwarding, event)),
    );
    Ok(())
}

#[tauri::command]
pub fn stop_process_watcher(state: State<AppState>) -> Result<()> {
    state.lock_watcher().stop();
    Ok(())
}

#[tauri::command]
pub fn is_watcher_running(state: State<AppState>) -> bool {
    state.lock_watcher().is_running()
}

pub(crate) fn handle_watcher_event(
    app: &AppHandle,
    forwarding: &std::sync::Arc<crate::forwarding_service::ForwardingService>,
    event: anticheat::WatcherEvent,
) {
    match event {
        anticheat::WatcherEvent::GameLaunched { profile_id, .. } => {
            log::info!("game launched, activating profile {}", profile_id);
            let Some(state) = app.try_state::<AppState>() else { return };
            let profiles = ProfileStore::list().unwrap_or_default();
            let Some(profile) = profiles.into_iter().find(|p| p.id == profile_id) else {
                return;
            };
            let connected = snapshot_controllers(&state).unwrap_or_default();
            let assignments = profile_resolver::resolve(&profile, &connected);
            let result = if forwarding.is_forwarding() {
                forwarding.update_mapping(&assignments)
            } else {
                hid_enum::devices().and_then(|hids| forwarding.start(&assignments, &hids))
            };
            if let Err(e) = result {
                log::error!("auto-activate failed: {}", e);
            }
            let _ = app.emit(
                "profile-activated",
                serde_json::json!({ "profile_id": profile_id, "assignments": assignments }),
            );
        }
        anticheat::WatcherEvent::GameExited => {
            log::info!("game exited");
            let _ = app.emit(
                "profile-activated",
                serde_json::json!({ "profile_id": null, "assignments": [] }),
            );
        }
    }
}

// --- Settings commands ---

#[tauri::command]
pub fn get_settings(state: State<AppState>) -> Settings {
    state.lock_inner().config.settings.clone()
}

#[tauri::command]
pub fn update_settings(state: State<AppState>, settings: Settings) -> Result<()> {
    let mut inner = state.lock_inner();
    inner.config.settings = settings;
    inner.config.save()
}

// --- Reorder commands ---

#[tauri::command]
pub fn begin_reorder(state: State<AppState>, index: usize) {
    state.lock_inner().reorder.begin_reorder(index);
}

#[tauri::command]
pub fn move_reorder(state: State<AppState>, forward: bool) {
    state.lock_inner().reorder.move_focused(forward);
}

#[tauri::command]
pub fn cancel_reorder(state: State<AppState>) {
    state.lock_inner().reorder.cancel();
}

/// Confirm the in-progress reorder: persist the new order and, if
/// forwarding is active, re-derive target slots from card position and
/// hand them to `update_mapping` (§4.10's "trigger forwarding apply").
#[tauri::command]
pub fn confirm_reorder(state: State<AppState>) -> Result<()> {
    let mut inner = state.lock_inner();
    let Some(new_order) = inner.reorder.confirm() else {
        return Ok(());
    };
    inner.order.order = new_order.clone();
    crate::order_store::OrderStore::save_order(&inner.order);

    if !state.forwarding.is_forwarding() {
        return Ok(());
    }

    let assignments: Vec<SlotAssignment> = new_order
        .iter()
        .enumerate()
        .filter_map(|(target_slot, key)| {
            let matched = inner.last_snapshot.iter().find(|m| {
                m.physical.as_ref().map(|p| p.vid_pid()).as_deref() == Some(key.as_str())
            })?;
            Some(SlotAssignment {
                target_slot: target_slot as u8,
                source_slot: Some(matched.slot_index),
                source_path: matched.physical.as_ref().map(|p| p.path.clone()),
            })
        })
        .collect();
    drop(inner);

    state.forwarding.update_mapping(&assignments)
}

#[tauri::command]
pub fn set_nickname(state: State<AppState>, vid_pid: String, nickname: String) {
    let mut inner = state.lock_inner();
    inner.nicknames.insert(vid_pid, nickname);
    crate::order_store::OrderStore::save_nicknames(&inner.nicknames);
}

#[tauri::command]
pub fn get_nicknames(state: State<AppState>) -> std::collections::HashMap<String, String> {
    state.lock_inner().nicknames.clone()
}
