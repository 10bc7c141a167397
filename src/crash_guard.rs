//! Crash-Safety Guard: detects a dirty shutdown (app exited while devices
//! were mid-remap) and drives recovery on the next launch. See spec §4.8.
//!
//! A lockfile under the config directory marks "session in progress". Its
//! presence at startup means the previous run never reached a clean exit —
//! crash, kill, or power loss. A panic hook is also installed so a panic
//! mid-session logs before the process dies, leaving the lockfile in place
//! for the next launch to find.

use crate::forwarding_service::ForwardingService;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

fn lockfile_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("padswitch").join("padswitch.lock"))
}

/// Returns true if the previous session's lockfile is still present, i.e.
/// the app did not reach a clean `RunEvent::Exit`.
pub fn needs_recovery() -> bool {
    lockfile_path().map(|p| p.exists()).unwrap_or(false)
}

/// Mark this session as in progress. Call once at startup, after recovery
/// (if any) has run.
pub fn mark_session_start() {
    let Some(path) = lockfile_path() else { return };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&path, std::process::id().to_string());
}

/// Mark this session as cleanly exited. Call from the `RunEvent::Exit`
/// handler.
pub fn mark_session_end() {
    if let Some(path) = lockfile_path() {
        let _ = std::fs::remove_file(&path);
    }
}

/// Remove a stale lockfile and run `recover`, swallowing whatever it
/// returns — recovery is always best-effort, since there's no user present
/// to report a failure to at this point in startup.
pub fn recover_with<F: FnOnce()>(recover: F) {
    if let Some(path) = lockfile_path() {
        let _ = std::fs::remove_file(&path);
    }
    log::warn!("dirty shutdown detected, running recovery");
    recover();
    log::info!("dirty shutdown recovery complete");
}

/// Install a panic hook that clears the input filter before falling through
/// to the default hook (so a human still sees a backtrace on stderr). A
/// panic in any thread — including a forwarding channel's — must not leave
/// physical gamepads hidden system-wide (§4.8 step 2). The cleanup call is
/// wrapped in `catch_unwind`: a panic inside the panic hook would abort the
/// process instead of unwinding. Does not touch the lockfile — a panic
/// leaves it in place so the next launch treats it as a dirty shutdown.
pub fn install_panic_hook(forwarding: Arc<ForwardingService>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("panic: {}", info);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| forwarding.revert_all()));
        match result {
            Ok(Err(e)) => log::error!("panic-path filter cleanup failed: {}", e),
            Err(_) => log::error!("panic-path filter cleanup itself panicked"),
            Ok(Ok(())) => {}
        }
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recover_with_runs_closure_even_without_a_lockfile() {
        let mut ran = false;
        recover_with(|| ran = true);
        assert!(ran);
    }
}
