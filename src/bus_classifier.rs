//! Classifies a HID device's transport from its path / instance id. See spec
//! §4.3. `classify_instance_id` is pure and OS-independent; `bus_for` adds
//! the GATT-service-UUID check and the bounded PnP parent-chain walk.

use crate::device::BusType;

/// Known VID:PID pairs for first-party wireless dongles (Xbox Wireless
/// Adapter variants).
const WIRELESS_ADAPTER_PAIRS: &[(&str, &str)] = &[("045E", "02FE"), ("045E", "02E6")];

/// Bluetooth HID-over-GATT service UUID (0x1812) and the HOGP profile UUID,
/// as they appear embedded in a device interface path.
const HOGP_SERVICE_UUID: &str = "00001812-0000-1000-8000-00805f9b34fb";
const HOGP_PROFILE_UUID: &str = "00001124-0000-1000-8000-00805f9b34fb";

/// Classify a single instance id / path fragment. Strict precedence order —
/// never throws; unmatched input is `Unknown`.
pub fn classify_instance_id(id: &str) -> BusType {
    let upper = id.to_ascii_uppercase();

    if upper.contains("BTHLEDEVICE") || upper.contains("BTHLE") {
        return BusType::BluetoothLE;
    }
    if upper.contains("BTHENUM") {
        return BusType::BluetoothClassic;
    }
    if upper.starts_with("BTH") {
        return BusType::BluetoothLE;
    }
    for (vid, pid) in WIRELESS_ADAPTER_PAIRS {
        if upper.contains(&format!("VID_{vid}")) && upper.contains(&format!("PID_{pid}")) {
            return BusType::WirelessAdapter;
        }
    }
    if upper.starts_with(r"USB\VID_") {
        return BusType::Usb;
    }
    BusType::Unknown
}

/// Full classification for a device path, including the GATT-UUID shortcut
/// and the PnP ancestor walk.
pub fn bus_for(path: &str) -> BusType {
    let lower = path.to_ascii_lowercase();
    if lower.contains(HOGP_SERVICE_UUID) || lower.contains(HOGP_PROFILE_UUID) {
        return BusType::BluetoothLE;
    }

    let direct = classify_instance_id(path);
    if direct != BusType::Unknown {
        return direct;
    }

    imp::walk_pnp_ancestors(path)
}

#[cfg(windows)]
mod imp {
    use super::{classify_instance_id, BusType};
    use windows::core::PCWSTR;
    use windows::Win32::Devices::DeviceAndDriverInstallation::{
        CM_Get_Device_IDW, CM_Get_Parent, CM_Locate_DevNodeW, CM_LOCATE_DEVNODE_NORMAL, CR_SUCCESS,
    };

    const MAX_ANCESTORS: usize = 12;

    /// Extract the device instance id prefix from a full interface path, e.g.
    /// `\\?\USB#VID_045E&PID_028E#6&...#{guid}` → `USB\VID_045E&PID_028E\6&...`.
    fn instance_id_from_path(path: &str) -> Option<String> {
        let trimmed = path.strip_prefix(r"\\?\")?;
        let without_guid = trimmed.rsplit_once('#').map(|(h, _)| h).unwrap_or(trimmed);
        Some(without_guid.replace('#', r"\"))
    }

    pub fn walk_pnp_ancestors(path: &str) -> BusType {
        let Some(instance_id) = instance_id_from_path(path) else {
            return BusType::Unknown;
        };

        let wide: Vec<u16> = instance_id
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let mut devinst = 0u32;
        let locate = unsafe {
            CM_Locate_DevNodeW(
                &mut devinst,
                PCWSTR(wide.as_ptr()),
                CM_LOCATE_DEVNODE_NORMAL,
            )
        };
        if locate != CR_SUCCESS {
            return BusType::Unknown;
        }

        let mut current = devinst;
        for _ in 0..MAX_ANCESTORS {
            let mut parent = 0u32;
            let result = unsafe { CM_Get_Parent(&mut parent, current, 0) };
            if result != CR_SUCCESS {
                break;
            }
            current = parent;

            if let Some(id) = device_id_of(current) {
                let classified = classify_instance_id(&id);
                if classified != BusType::Unknown {
                    return classified;
                }
            }
        }

        BusType::Unknown
    }

    fn device_id_of(devinst: u32) -> Option<String> {
        let mut buf = [0u16; 512];
        let result = unsafe { CM_Get_Device_IDW(devinst, &mut buf, 0) };
        if result != CR_SUCCESS {
            return None;
        }
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Some(String::from_utf16_lossy(&buf[..len]))
    }
}

#[cfg(not(windows))]
mod imp {
    use super::BusType;

    pub fn walk_pnp_ancestors(_path: &str) -> BusType {
        BusType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bthle_wins_over_bthenum_when_both_present() {
        let id = r"BTHENUM\{...}_BTHLEDEVICE_VID&00010000";
        assert_eq!(classify_instance_id(id), BusType::BluetoothLE);
    }

    #[test]
    fn bthenum_alone_is_bluetooth_classic() {
        let id = r"BTHENUM\{00001124-0000-1000-8000-00805f9b34fb}_VID&0002045e_PID&02e0";
        assert_eq!(classify_instance_id(id), BusType::BluetoothClassic);
    }

    #[test]
    fn bth_prefix_without_enum_is_ble() {
        assert_eq!(classify_instance_id(r"BTH\MS_BTHPAN"), BusType::BluetoothLE);
    }

    #[test]
    fn wireless_adapter_pair_detected() {
        let id = r"USB\VID_045E&PID_02E6\6&1a2b3c&0&0000";
        assert_eq!(classify_instance_id(id), BusType::WirelessAdapter);
    }

    #[test]
    fn usb_prefix_is_usb() {
        assert_eq!(
            classify_instance_id(r"USB\VID_045E&PID_028E\6&1"),
            BusType::Usb
        );
    }

    #[test]
    fn unrecognized_is_unknown() {
        assert_eq!(classify_instance_id(r"ROOT\LEGACY_DRIVER\0000"), BusType::Unknown);
    }

    #[test]
    fn hogp_service_uuid_in_path_is_ble_before_direct_classification() {
        let path = r"\\?\BTH\00001812-0000-1000-8000-00805f9b34fb#6&1#{guid}";
        assert_eq!(bus_for(path), BusType::BluetoothLE);
    }
}
