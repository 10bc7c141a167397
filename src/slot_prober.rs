//! Polls the OS's four fixed XInput slots and reports connection / battery
//! state. See spec §4.1.

use crate::device::{Connection, PhysicalSlotState};

/// Map one of XInput's four discrete battery levels to a percentage.
fn map_battery_level(level: u8) -> u8 {
    match level {
        0 => 0,   // BATTERY_LEVEL_EMPTY
        1 => 20,  // BATTERY_LEVEL_LOW
        2 => 60,  // BATTERY_LEVEL_MEDIUM
        _ => 100, // BATTERY_LEVEL_FULL
    }
}

/// Snapshot all four XInput slots. Never fails — a slot that errors on any
/// call is reported disconnected (this also covers "ghost" slots: a kernel
/// node lingers so capabilities succeeds, but the state read fails).
pub fn snapshot() -> [PhysicalSlotState; 4] {
    std::array::from_fn(|i| imp::probe_slot(i as u8))
}

/// Current button mask for a slot, or `None` if it's not connected. Used by
/// the "Identify" flow to find which slot just received a press.
pub fn poll_buttons(index: u8) -> Option<u16> {
    imp::poll_buttons(index)
}

#[cfg(windows)]
mod imp {
    use super::{map_battery_level, Connection, PhysicalSlotState};
    use windows::Win32::UI::Input::XboxController::{
        XInputGetBatteryInformation, XInputGetCapabilities, XInputGetState,
        BATTERY_DEVTYPE_GAMEPAD, XINPUT_BATTERY_INFORMATION, XINPUT_CAPABILITIES,
        XINPUT_CAPS_WIRELESS, XINPUT_STATE,
    };

    const ERROR_SUCCESS: u32 = 0;

    pub fn probe_slot(index: u8) -> PhysicalSlotState {
        let mut caps = XINPUT_CAPABILITIES::default();
        let caps_result = unsafe { XInputGetCapabilities(index as u32, 0, &mut caps) };
        if caps_result != ERROR_SUCCESS {
            return PhysicalSlotState::disconnected(index);
        }

        let mut state = XINPUT_STATE::default();
        let state_result = unsafe { XInputGetState(index as u32, &mut state) };
        if state_result != ERROR_SUCCESS {
            // Ghost slot: capabilities succeeded but the state read failed.
            return PhysicalSlotState::disconnected(index);
        }

        // Wireless-ness comes from the capability flags, never from the
        // battery API — XInputGetBatteryInformation falsely reports "wired"
        // (BATTERY_TYPE_DISCONNECTED/WIRED) for some Bluetooth gamepads.
        let wireless = (caps.Flags & XINPUT_CAPS_WIRELESS as u16) != 0;
        let connection = if wireless {
            Connection::Wireless
        } else {
            Connection::Wired
        };

        let battery = if wireless {
            let mut info = XINPUT_BATTERY_INFORMATION::default();
            let battery_result = unsafe {
                XInputGetBatteryInformation(index as u32, BATTERY_DEVTYPE_GAMEPAD, &mut info)
            };
            if battery_result == ERROR_SUCCESS {
                Some(map_battery_level(info.BatteryLevel.0 as u8))
            } else {
                None
            }
        } else {
            None
        };

        PhysicalSlotState {
            index,
            connected: true,
            connection,
            battery,
        }
    }

    pub fn poll_buttons(index: u8) -> Option<u16> {
        let mut state = XINPUT_STATE::default();
        if unsafe { XInputGetState(index as u32, &mut state) } != ERROR_SUCCESS {
            return None;
        }
        Some(state.Gamepad.wButtons)
    }
}

#[cfg(not(windows))]
mod imp {
    use super::PhysicalSlotState;

    pub fn probe_slot(index: u8) -> PhysicalSlotState {
        PhysicalSlotState::disconnected(index)
    }

    pub fn poll_buttons(_index: u8) -> Option<u16> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_battery_level_covers_four_discrete_steps() {
        assert_eq!(map_battery_level(0), 0);
        assert_eq!(map_battery_level(1), 20);
        assert_eq!(map_battery_level(2), 60);
        assert_eq!(map_battery_level(3), 100);
    }

    #[test]
    fn disconnected_slot_has_no_battery_and_is_wired() {
        let slot = PhysicalSlotState::disconnected(2);
        assert_eq!(slot.index, 2);
        assert!(!slot.connected);
        assert_eq!(slot.battery, None);
        assert_eq!(slot.connection, Connection::Wired);
    }

    #[test]
    fn snapshot_always_has_four_indexed_entries() {
        let snap = snapshot();
        for (i, slot) in snap.iter().enumerate() {
            assert_eq!(slot.index, i as u8);
        }
    }
}
