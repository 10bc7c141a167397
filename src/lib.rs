mod anticheat;
mod bus_classifier;
mod commands;
mod config;
mod crash_guard;
mod device;
mod error;
mod forwarding_channel;
mod forwarding_service;
mod hid_enum;
mod hidhide;
mod knowledge_base;
mod matcher;
mod order_store;
mod platform;
mod profile;
mod profile_resolver;
mod reorder;
mod slot_prober;
mod state;
mod tray;
mod vigem;

use state::AppState;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::init();

    let app_state = AppState::new();
    crash_guard::install_panic_hook(app_state.forwarding.clone());

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            commands::get_connected_devices,
            commands::check_driver_status,
            commands::toggle_device,
            commands::start_forwarding,
            commands::update_mapping,
            commands::stop_forwarding,
            commands::is_forwarding,
            commands::get_profiles,
            commands::save_profile,
            commands::delete_profile,
            commands::activate_profile,
            commands::reset_all,
            commands::is_elevated,
            commands::detect_xinput_slot,
            commands::classify_bus,
            commands::get_game_rules,
            commands::add_game_rule,
            commands::delete_game_rule,
            commands::toggle_game_rule,
            commands::start_process_watcher,
            commands::stop_process_watcher,
            commands::is_watcher_running,
            commands::get_settings,
            commands::update_settings,
            commands::begin_reorder,
            commands::move_reorder,
            commands::confirm_reorder,
            commands::cancel_reorder,
            commands::set_nickname,
            commands::get_nicknames,
        ])
        .setup(|app| {
            tray::setup_tray(app.handle())?;

            let state = app.state::<AppState>();

            // Spec §4.8 step 1: unconditionally clear the filter before any
            // UI exists. This is P0 — without it, a crash followed by a
            // cold start leaves every physical gamepad hidden system-wide,
            // and a stale lockfile is not a reliable signal that it ran
            // (the lockfile itself can be lost along with the crash).
            if let Err(e) = state.forwarding.revert_all() {
                log::error!("cold-start filter clear failed: {}", e);
            }

            if crash_guard::needs_recovery() {
                crash_guard::recover_with(|| {
                    let mut inner = state.lock_inner();
                    inner.config.settings.active_profile_id = None;
                    let _ = inner.config.save();
                });
            }
            crash_guard::mark_session_start();

            if state.lock_inner().config.settings.auto_switch {
                let rules = state.lock_inner().config.game_rules.clone();
                let forwarding = state.forwarding.clone();
                let app_handle = app.handle().clone();
                state.lock_watcher().start(
                    rules,
                    std::sync::Arc::new(move |event| {
                        commands::handle_watcher_event(&app_handle, &forwarding, event)
                    }),
                );
            }

            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                // §4.8 step 2: the exit hook must actually clean up, not
                // just drop the marker that says a clean exit happened.
                let state = app.state::<AppState>();
                if let Err(e) = state.forwarding.revert_all() {
                    log::error!("exit-time filter clear failed: {}", e);
                }
                crash_guard::mark_session_end();
            }
        });
}
