//! Enumerates connected HID interfaces, robust across USB and Bluetooth
//! transports. See spec §4.2.

use crate::device::HidDevice;
use crate::error::Result;

/// Derive the dedup key spec §4.2 describes: drop the `\\?\` prefix and the
/// trailing `#{interface-guid}` suffix, then uppercase.
pub fn instance_id(path: &str) -> String {
    let trimmed = path.strip_prefix(r"\\?\").unwrap_or(path);
    let without_suffix = match trimmed.rfind('#') {
        Some(pos) if trimmed[pos..].starts_with("#{") => &trimmed[..pos],
        _ => trimmed,
    };
    without_suffix.to_ascii_uppercase()
}

/// Same dedup key, transformed for HidHide's instance-id convention
/// (`#` → `\`), per spec §4.7.
pub fn hidhide_instance_id(path: &str) -> String {
    instance_id(path).replace('#', r"\")
}

/// A Bluetooth-Classic path encodes VID with an 8-hex "VID&" segment: the
/// first 4 hex chars are a transport subcode that must be stripped, the
/// last 4 are the real VID. PID follows as a plain 4-hex "PID&" segment.
pub fn extract_bt_classic_vid_pid(path: &str) -> Option<(String, String)> {
    let upper = path.to_ascii_uppercase();
    let vid_pos = upper.find("VID&")?;
    let vid_field = upper.get(vid_pos + 4..vid_pos + 12)?;
    if !vid_field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let vid = vid_field[4..8].to_string();

    let pid_pos = upper.find("PID&")?;
    let pid_field = upper.get(pid_pos + 4..pid_pos + 8)?;
    if !pid_field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some((vid, pid_field.to_string()))
}

/// True if `path` looks like a Bluetooth-Classic instance path (contains an
/// 8-hex "VID&" segment, as opposed to the plain 4-hex USB convention).
pub fn is_bt_classic_path(path: &str) -> bool {
    let upper = path.to_ascii_uppercase();
    match upper.find("VID&") {
        Some(pos) => upper
            .get(pos + 4..pos + 12)
            .map(|field| field.len() == 8 && field.bytes().all(|b| b.is_ascii_hexdigit()))
            .unwrap_or(false),
        None => false,
    }
}

/// Enumerate all connected HID interfaces, unioning the generic HID
/// interface class with the Bluetooth HOGP service class (covers OS
/// versions where BLE HID interfaces appear only under the latter),
/// deduplicated by instance id.
pub fn devices() -> Result<Vec<HidDevice>> {
    let mut raw = imp::scan(imp::GUID_HID);
    raw.extend(imp::scan(imp::GUID_HOGP));

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        let key = instance_id(&entry.path);
        if !seen.insert(key) {
            continue;
        }
        out.push(entry.into_hid_device());
    }
    Ok(out)
}

/// Raw enumeration result before VID/PID resolution.
struct RawHidEntry {
    path: String,
    product_name: Option<String>,
    attr_vid: Option<u16>,
    attr_pid: Option<u16>,
}

impl RawHidEntry {
    fn into_hid_device(self) -> HidDevice {
        let (vid, pid) = if is_bt_classic_path(&self.path) {
            extract_bt_classic_vid_pid(&self.path)
                .unwrap_or_else(|| (format!("{:04X}", self.attr_vid.unwrap_or(0)), format!("{:04X}", self.attr_pid.unwrap_or(0))))
        } else {
            (
                format!("{:04X}", self.attr_vid.unwrap_or(0)),
                format!("{:04X}", self.attr_pid.unwrap_or(0)),
            )
        };
        HidDevice::new(&vid, &pid, self.product_name, self.path)
    }
}

#[cfg(windows)]
mod imp {
    use super::RawHidEntry;
    use windows::core::{GUID, PCWSTR};
    use windows::Win32::Devices::DeviceAndDriverInstallation::{
        SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
        SetupDiGetDeviceInterfaceDetailW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT,
        SP_DEVICE_INTERFACE_DATA,
    };
    use windows::Win32::Devices::HumanInterfaceDevice::{
        HidD_GetAttributes, HidD_GetProductString, HIDD_ATTRIBUTES,
    };
    use windows::Win32::Foundation::{CloseHandle, GENERIC_READ, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
    };

    // GUID_DEVINTERFACE_HID: {4D1E55B2-F16F-11CF-88CB-001111000030}
    pub const GUID_HID: GUID = GUID::from_values(
        0x4D1E55B2,
        0xF16F,
        0x11CF,
        [0x88, 0xCB, 0x00, 0x11, 0x11, 0x00, 0x00, 0x30],
    );

    // HID-over-GATT service class GUID, as exposed for BLE HID interfaces on
    // OS versions that surface them separately from GUID_DEVINTERFACE_HID:
    // {00001812-0000-1000-8000-00805F9B34FB}
    pub const GUID_HOGP: GUID = GUID::from_values(
        0x00001812,
        0x0000,
        0x1000,
        [0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB],
    );

    pub fn scan(guid: GUID) -> Vec<RawHidEntry> {
        let mut out = Vec::new();
        unsafe {
            let dev_info = match SetupDiGetClassDevsW(
                Some(&guid),
                PCWSTR::null(),
                None,
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            ) {
                Ok(h) => h,
                Err(e) => {
                    log::warn!("SetupDiGetClassDevsW failed for {:?}: {}", guid, e);
                    return out;
                }
            };

            let mut index = 0u32;
            loop {
                let mut iface = SP_DEVICE_INTERFACE_DATA {
                    cbSize: std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
                    ..Default::default()
                };
                if SetupDiEnumDeviceInterfaces(dev_info, None, &guid, index, &mut iface).is_err() {
                    break;
                }
                index += 1;

                if let Some(path) = interface_path(dev_info, &iface) {
                    out.push(probe_path(path));
                }
            }

            let _ = SetupDiDestroyDeviceInfoList(dev_info);
        }
        out
    }

    unsafe fn interface_path(
        dev_info: windows::Win32::Devices::DeviceAndDriverInstallation::HDEVINFO,
        iface: &SP_DEVICE_INTERFACE_DATA,
    ) -> Option<String> {
        let mut required: u32 = 0;
        let _ = SetupDiGetDeviceInterfaceDetailW(dev_info, iface, None, 0, Some(&mut required), None);
        if required == 0 {
            return None;
        }

        // SP_DEVICE_INTERFACE_DETAIL_DATA_W is a variable-length struct: a
        // DWORD cbSize header followed by the wide-char path. We allocate a
        // raw byte buffer and write the header, matching the teacher's
        // `setupdi.rs` fixed-size-struct convention but sized dynamically
        // since paths can exceed MAX_PATH for deep Bluetooth instance ids.
        let mut buf = vec![0u8; required as usize];
        let cb_size_on_this_platform = if cfg!(target_pointer_width = "64") { 8u32 } else { 6u32 };
        buf[0..4].copy_from_slice(&cb_size_on_this_platform.to_le_bytes());

        let detail = buf.as_mut_ptr()
            as *mut windows::Win32::Devices::DeviceAndDriverInstallation::SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        let ok = SetupDiGetDeviceInterfaceDetailW(
            dev_info,
            iface,
            Some(detail),
            required,
            None,
            None,
        );
        if ok.is_err() {
            return None;
        }

        let path_ptr = (*detail).DevicePath.as_ptr();
        let path_slice = std::slice::from_raw_parts(path_ptr, (required as usize - 4) / 2);
        let len = path_slice.iter().position(|&c| c == 0).unwrap_or(path_slice.len());
        Some(String::from_utf16_lossy(&path_slice[..len]))
    }

    fn probe_path(path: String) -> RawHidEntry {
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            let handle = match CreateFileW(
                PCWSTR(wide.as_ptr()),
                GENERIC_READ.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                Default::default(),
                None,
            ) {
                Ok(h) => h,
                Err(_) => {
                    return RawHidEntry {
                        path,
                        product_name: None,
                        attr_vid: None,
                        attr_pid: None,
                    }
                }
            };

            let mut attrs = HIDD_ATTRIBUTES {
                Size: std::mem::size_of::<HIDD_ATTRIBUTES>() as u32,
                ..Default::default()
            };
            let got_attrs = HidD_GetAttributes(handle, &mut attrs).as_bool();

            let mut name_buf = [0u16; 128];
            let got_name = HidD_GetProductString(
                handle,
                name_buf.as_mut_ptr() as *mut _,
                (name_buf.len() * 2) as u32,
            )
            .as_bool();

            let _ = CloseHandle(handle);

            let product_name = if got_name {
                let len = name_buf.iter().position(|&c| c == 0).unwrap_or(name_buf.len());
                let s = String::from_utf16_lossy(&name_buf[..len]);
                if s.is_empty() { None } else { Some(s) }
            } else {
                None
            };

            RawHidEntry {
                path,
                product_name,
                attr_vid: if got_attrs { Some(attrs.VendorID) } else { None },
                attr_pid: if got_attrs { Some(attrs.ProductID) } else { None },
            }
        }
    }

    // Kept so the struct is referenced even if HANDLE's automatic Drop impl
    // changes across `windows` crate versions.
    #[allow(dead_code)]
    fn _assert_handle_is_copy(_h: HANDLE) {}
}

#[cfg(not(windows))]
mod imp {
    use super::RawHidEntry;

    pub const GUID_HID: u8 = 0;
    pub const GUID_HOGP: u8 = 1;

    pub fn scan(_guid: u8) -> Vec<RawHidEntry> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_drops_prefix_and_guid_suffix_then_upper_cases() {
        let path = r"\\?\hid#vid_045e&pid_028e#7&1234abcd&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";
        assert_eq!(
            instance_id(path),
            r"HID#VID_045E&PID_028E#7&1234ABCD&0&0000"
        );
    }

    #[test]
    fn hidhide_instance_id_replaces_hash_with_backslash() {
        let path = r"\\?\hid#vid_045e&pid_028e#7&1#{guid}";
        assert_eq!(hidhide_instance_id(path), r"HID\VID_045E&PID_028E\7&1");
    }

    #[test]
    fn extracts_bt_classic_vid_and_pid() {
        let path = r"\\?\BTHENUM#{00001124-0000-1000-8000-00805f9b34fb}_VID&0002045e_PID&02e0#8&1";
        let (vid, pid) = extract_bt_classic_vid_pid(path).unwrap();
        assert_eq!(vid, "045E");
        assert_eq!(pid, "02E0");
    }

    #[test]
    fn usb_path_is_not_bt_classic() {
        let path = r"\\?\USB#VID_045E&PID_028E#6&1";
        assert!(!is_bt_classic_path(path));
    }
}
