//! Thin OS-privilege helpers that don't belong to any one core module.
//! Device/driver access lives in `slot_prober`, `hid_enum`,
//! `bus_classifier`, `matcher`, `vigem`, and `hidhide` instead, each
//! cfg-split internally.

#[cfg(windows)]
mod imp {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    pub fn is_elevated() -> bool {
        unsafe {
            let mut token = Default::default();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
                return false;
            }

            let mut elevation = TOKEN_ELEVATION::default();
            let mut returned = 0u32;
            let ok = GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut std::ffi::c_void),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            );
            let _ = CloseHandle(token);
            ok.is_ok() && elevation.TokenIsElevated != 0
        }
    }

    /// Candidate OS overlay-helper executables that need to keep seeing a
    /// hidden gamepad so the Guide button still reaches them (e.g. the Xbox
    /// Game Bar presence writer). Only paths that actually exist are
    /// returned; an empty result is not an error (see spec open question —
    /// forwarding proceeds permissively without Guide-button routing).
    pub fn overlay_helper_paths() -> Vec<String> {
        let Ok(system_root) = std::env::var("SystemRoot") else {
            return Vec::new();
        };
        ["GameBarPresenceWriter.exe", "GameBar.exe"]
            .iter()
            .map(|name| format!("{}\\System32\\{}", system_root, name))
            .filter(|path| std::path::Path::new(path).exists())
            .collect()
    }
}

#[cfg(not(windows))]
mod imp {
    pub fn is_elevated() -> bool {
        false
    }

    pub fn overlay_helper_paths() -> Vec<String> {
        Vec::new()
    }
}

pub fn is_elevated() -> bool {
    imp::is_elevated()
}

pub fn overlay_helper_paths() -> Vec<String> {
    imp::overlay_helper_paths()
}

/// Path to this executable, for registering the HidHide app allow-list
/// rule. `None` if the OS can't answer (should not happen in practice).
pub fn current_exe_path() -> Option<String> {
    std::env::current_exe()
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}
