//! Input Filter Adapter: hides physical HID interfaces from every process
//! except the ones on HidHide's own allow-list. See spec §4.7.
//!
//! HidHide is a filter driver by Nefarius (Benjamin Höglinger-Stelzer).
//! Reference: https://github.com/nefarius/HidHide
//!
//! Both the real adapter and the null adapter (selected when the driver
//! device can't be opened) implement `InputFilter`, so callers never branch
//! on driver presence themselves.

use crate::error::Result;

/// Operations the Forwarding Service needs from the filter driver. A single
/// trait object lets the rest of the core stay oblivious to whether the
/// driver is actually installed.
pub trait InputFilter: Send {
    fn is_available(&self) -> bool;
    fn add_app_rule(&self, exe_path: &str) -> Result<()>;
    fn hide(&self, instance_id: &str) -> Result<()>;
    fn unhide(&self, instance_id: &str) -> Result<()>;
    /// Deactivate globally, clear the blocked list, clear the app allow-list.
    /// Each sub-step runs even if an earlier one failed; the first error
    /// encountered (if any) is returned after all three have been attempted.
    fn clear_all(&self) -> Result<()>;
    fn set_active(&self, active: bool) -> Result<()>;
}

/// Used when the HidHide device can't be opened: every call succeeds as a
/// no-op and `is_available` reports false so callers can surface that to
/// the user instead of silently doing nothing.
pub struct NullFilter;

impl InputFilter for NullFilter {
    fn is_available(&self) -> bool {
        false
    }

    fn add_app_rule(&self, _exe_path: &str) -> Result<()> {
        Ok(())
    }

    fn hide(&self, _instance_id: &str) -> Result<()> {
        Ok(())
    }

    fn unhide(&self, _instance_id: &str) -> Result<()> {
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        Ok(())
    }

    fn set_active(&self, _active: bool) -> Result<()> {
        Ok(())
    }
}

/// Open the filter driver if present, falling back to `NullFilter`.
pub fn open() -> Box<dyn InputFilter> {
    #[cfg(windows)]
    {
        match imp::HidHide::open() {
            Ok(h) => Box::new(h),
            Err(e) => {
                log::warn!("HidHide unavailable, falling back to null filter: {}", e);
                Box::new(NullFilter)
            }
        }
    }
    #[cfg(not(windows))]
    {
        Box::new(NullFilter)
    }
}

#[cfg(windows)]
pub mod imp {
    use super::InputFilter;
    use crate::error::{PadSwitchError, Result};
    use std::ffi::c_void;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
    };
    use windows::Win32::System::IO::DeviceIoControl;

    const HIDHIDE_DEVICE_PATH: &str = r"\\.\HidHide";

    const IOCTL_GET_WHITELIST: u32 = 0x80016000;
    const IOCTL_SET_WHITELIST: u32 = 0x80016004;
    const IOCTL_GET_BLACKLIST: u32 = 0x80016008;
    const IOCTL_SET_BLACKLIST: u32 = 0x8001600C;
    const IOCTL_GET_ACTIVE: u32 = 0x80016010;
    const IOCTL_SET_ACTIVE: u32 = 0x80016014;

    /// Holds an open handle to the HidHide control device. `Send` because
    /// the handle doesn't alias any thread-local state; Windows handles are
    /// safe to use from whichever thread currently owns them.
    pub struct HidHide {
        handle: HANDLE,
    }

    unsafe impl Send for HidHide {}

    impl HidHide {
        pub fn open() -> Result<Self> {
            let wide = to_wide(HIDHIDE_DEVICE_PATH);
            let handle = unsafe {
                CreateFileW(
                    PCWSTR(wide.as_ptr()),
                    (windows::Win32::Storage::FileSystem::FILE_GENERIC_READ
                        | windows::Win32::Storage::FileSystem::FILE_GENERIC_WRITE)
                        .0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE,
                    None,
                    OPEN_EXISTING,
                    FILE_ATTRIBUTE_NORMAL,
                    None,
                )
            }
            .map_err(|e| {
                PadSwitchError::FilterUnavailable(format!("CreateFileW on {} failed: {}", HIDHIDE_DEVICE_PATH, e))
            })?;
            Ok(Self { handle })
        }

        fn ioctl_get(&self, code: u32) -> Result<Vec<u8>> {
            let mut buf = vec![0u8; 8192];
            let mut returned: u32 = 0;
            let ok = unsafe {
                DeviceIoControl(
                    self.handle,
                    code,
                    None,
                    0,
                    Some(buf.as_mut_ptr() as *mut c_void),
                    buf.len() as u32,
                    Some(&mut returned),
                    None,
                )
            };
            ok.map_err(|e| {
                PadSwitchError::FilterMutationFailed(format!("ioctl get {:#x} failed: {}", code, e))
            })?;
            buf.truncate(returned as usize);
            Ok(buf)
        }

        fn ioctl_set(&self, code: u32, payload: &[u8]) -> Result<()> {
            let mut payload = payload.to_vec();
            unsafe {
                DeviceIoControl(
                    self.handle,
                    code,
                    Some(payload.as_mut_ptr() as *mut c_void),
                    payload.len() as u32,
                    None,
                    0,
                    None,
                    None,
                )
            }
            .map_err(|e| {
                PadSwitchError::FilterMutationFailed(format!("ioctl set {:#x} failed: {}", code, e))
            })
        }

        fn get_strings(&self, code: u32) -> Result<Vec<String>> {
            let bytes = self.ioctl_get(code)?;
            Ok(decode_multi_string(&bytes))
        }

        fn set_strings(&self, code: u32, list: &[String]) -> Result<()> {
            self.ioctl_set(code, &encode_multi_string(list))
        }
    }

    impl Drop for HidHide {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }

    impl InputFilter for HidHide {
        fn is_available(&self) -> bool {
            true
        }

        fn add_app_rule(&self, exe_path: &str) -> Result<()> {
            let mut list = self.get_strings(IOCTL_GET_WHITELIST)?;
            if !list.iter().any(|p| p.eq_ignore_ascii_case(exe_path)) {
                list.push(exe_path.to_string());
                self.set_strings(IOCTL_SET_WHITELIST, &list)?;
            }
            Ok(())
        }

        fn hide(&self, instance_id: &str) -> Result<()> {
            let mut list = self.get_strings(IOCTL_GET_BLACKLIST)?;
            if !list.iter().any(|p| p.eq_ignore_ascii_case(instance_id)) {
                list.push(instance_id.to_string());
                self.set_strings(IOCTL_SET_BLACKLIST, &list)?;
            }
            Ok(())
        }

        fn unhide(&self, instance_id: &str) -> Result<()> {
            let mut list = self.get_strings(IOCTL_GET_BLACKLIST)?;
            let before = list.len();
            list.retain(|p| !p.eq_ignore_ascii_case(instance_id));
            if list.len() != before {
                self.set_strings(IOCTL_SET_BLACKLIST, &list)?;
            }
            Ok(())
        }

        fn clear_all(&self) -> Result<()> {
            let mut first_err = None;

            if let Err(e) = self.set_active_inner(false) {
                first_err.get_or_insert(e);
            }
            if let Err(e) = self.set_strings(IOCTL_SET_BLACKLIST, &[]) {
                first_err.get_or_insert(e);
            }
            if let Err(e) = self.set_strings(IOCTL_SET_WHITELIST, &[]) {
                first_err.get_or_insert(e);
            }

            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn set_active(&self, active: bool) -> Result<()> {
            self.set_active_inner(active)
        }
    }

    impl HidHide {
        fn set_active_inner(&self, active: bool) -> Result<()> {
            self.ioctl_set(IOCTL_SET_ACTIVE, &[active as u8])
        }

        #[allow(dead_code)]
        fn is_active(&self) -> Result<bool> {
            let bytes = self.ioctl_get(IOCTL_GET_ACTIVE)?;
            Ok(bytes.first().copied().unwrap_or(0) != 0)
        }
    }

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Decode a UTF-16LE byte buffer holding zero or more NUL-terminated
    /// strings, itself terminated by an extra NUL (or simply end-of-buffer).
    fn decode_multi_string(bytes: &[u8]) -> Vec<String> {
        let u16s: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        u16s.split(|&c| c == 0)
            .map(|chunk| String::from_utf16_lossy(chunk))
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Encode as double-null-terminated UTF-16LE: each string NUL-terminated,
    /// the whole list closed with one extra NUL (or exactly one NUL if empty).
    fn encode_multi_string(list: &[String]) -> Vec<u8> {
        let mut units: Vec<u16> = Vec::new();
        for s in list {
            units.extend(s.encode_utf16());
            units.push(0);
        }
        units.push(0);
        units.iter().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn round_trips_empty_list() {
            let encoded = encode_multi_string(&[]);
            assert_eq!(decode_multi_string(&encoded), Vec::<String>::new());
        }

        #[test]
        fn round_trips_multiple_entries() {
            let list = vec![
                r"USB\VID_045E&PID_028E\IG_00".to_string(),
                r"USB\VID_054C&PID_05C4\IG_00".to_string(),
            ];
            let encoded = encode_multi_string(&list);
            assert_eq!(decode_multi_string(&encoded), list);
        }
    }
}

#[cfg(not(windows))]
pub mod imp {
    pub use super::NullFilter as HidHide;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_filter_reports_unavailable_and_no_ops() {
        let filter = NullFilter;
        assert!(!filter.is_available());
        assert!(filter.add_app_rule("C:\\pad.exe").is_ok());
        assert!(filter.hide("USB\\VID_0000&PID_0000").is_ok());
        assert!(filter.unhide("USB\\VID_0000&PID_0000").is_ok());
        assert!(filter.clear_all().is_ok());
        assert!(filter.set_active(true).is_ok());
    }
}
