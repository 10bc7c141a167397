use serde::{Deserialize, Serialize};

/// How a physical slot's controller is connected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Connection {
    Wired,
    Wireless,
}

/// One of the OS's four fixed XInput player-index slots.
///
/// Invariant: `!connected` implies `battery == None` and `connection == Wired`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhysicalSlotState {
    pub index: u8,
    pub connected: bool,
    pub connection: Connection,
    /// One of 0, 20, 60, 100 when wireless and connected; otherwise `None`.
    pub battery: Option<u8>,
}

impl PhysicalSlotState {
    pub fn disconnected(index: u8) -> Self {
        Self {
            index,
            connected: false,
            connection: Connection::Wired,
            battery: None,
        }
    }
}

/// Bus a HID interface is reachable through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BusType {
    Usb,
    BluetoothClassic,
    BluetoothLE,
    WirelessAdapter,
    Unknown,
}

/// One enumerated HID interface.
///
/// Invariant: `vid`/`pid` are always 4 uppercase hex characters, regardless
/// of the transport the path string encodes them in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HidDevice {
    pub vid: String,
    pub pid: String,
    pub product_name: Option<String>,
    pub path: String,
}

impl HidDevice {
    pub fn new(vid: &str, pid: &str, product_name: Option<String>, path: String) -> Self {
        Self {
            vid: normalize_hex4(vid),
            pid: normalize_hex4(pid),
            product_name,
            path,
        }
    }

    pub fn vid_pid(&self) -> String {
        format!("{}:{}", self.vid, self.pid)
    }
}

/// Upper-case and left-pad/truncate a hex id to exactly 4 characters.
/// HID/XInput vendor and product ids are 16-bit; callers always pass values
/// that already fit, but normalizing here keeps the 4-hex-uppercase
/// invariant true regardless of the string the platform layer produced it
/// from (raw integer formatting vs. path substring extraction).
pub fn normalize_hex4(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    if upper.len() >= 4 {
        upper[upper.len() - 4..].to_string()
    } else {
        format!("{:0>4}", upper)
    }
}

/// A slot annotated with whatever physical HID interface (if any) was
/// associated with it, plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedController {
    pub slot_index: u8,
    pub connected: bool,
    pub physical: Option<HidDevice>,
    pub bus: BusType,
    pub is_integrated: bool,
    pub known_name: Option<String>,
    pub vendor_brand: Option<String>,
    pub battery: Option<u8>,
}

impl MatchedController {
    pub fn empty(slot_index: u8) -> Self {
        Self {
            slot_index,
            connected: false,
            physical: None,
            bus: BusType::Unknown,
            is_integrated: false,
            known_name: None,
            vendor_brand: None,
            battery: None,
        }
    }
}

/// The user's desired mapping: a source (physical slot or saved device) to a
/// target XInput slot. Used both as Forwarding Service input and as the
/// serialized per-game profile entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub target_slot: u8,
    pub source_slot: Option<u8>,
    pub source_path: Option<String>,
}

/// Persisted preferred visual order of controller cards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualOrder {
    /// "VID:PID" strings, most-preferred first.
    pub order: Vec<String>,
    pub slot_map: [i32; 4],
}

impl VisualOrder {
    /// Sort `connected` (VID:PID, arbitrary payload) so entries in `self.order`
    /// come first in saved order; unknown entries are appended, natural order
    /// preserved.
    pub fn apply<T>(&self, connected: Vec<(String, T)>) -> Vec<(String, T)> {
        let rank = |vid_pid: &str| -> Option<usize> { self.order.iter().position(|o| o == vid_pid) };
        let mut indexed: Vec<(Option<usize>, usize, (String, T))> = connected
            .into_iter()
            .enumerate()
            .map(|(i, item)| (rank(&item.0), i, item))
            .collect();
        indexed.sort_by(|a, b| match (a.0, b.0) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });
        indexed.into_iter().map(|(_, _, item)| item).collect()
    }

    /// Move `moved` to sit directly before `before` in the saved order.
    /// Either key not yet present in `self.order` is inserted at the end
    /// first (new devices are unranked until the user drags them).
    pub fn move_before(&mut self, moved: &str, before: &str) {
        if moved == before {
            return;
        }
        if !self.order.iter().any(|o| o == moved) {
            self.order.push(moved.to_string());
        }
        if !self.order.iter().any(|o| o == before) {
            self.order.push(before.to_string());
        }
        let Some(moved_pos) = self.order.iter().position(|o| o == moved) else {
            return;
        };
        let entry = self.order.remove(moved_pos);
        let target_pos = self.order.iter().position(|o| o == before).unwrap_or(self.order.len());
        self.order.insert(target_pos, entry);
    }
}

/// Visual state of a reorder-grid card, driven by `reorder.rs`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardState {
    Normal,
    Focused,
    Selected,
    Dimmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverStatus {
    pub hidhide_installed: bool,
    pub vigembus_installed: bool,
    pub hidhide_version: Option<String>,
    pub vigembus_version: Option<String>,
}

impl Default for DriverStatus {
    fn default() -> Self {
        Self {
            hidhide_installed: false,
            vigembus_installed: false,
            hidhide_version: None,
            vigembus_version: None,
        }
    }
}

/// XInput gamepad state for forwarding: buttons mask (16-bit incl. Guide bit
/// 0x0400), triggers, thumbsticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

pub const GUIDE_BUTTON_BIT: u16 = 0x0400;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_hex4_upper_cases_and_truncates() {
        assert_eq!(normalize_hex4("045e"), "045E");
        assert_eq!(normalize_hex4("0002045e"), "045E");
        assert_eq!(normalize_hex4("28e"), "028E");
    }

    #[test]
    fn vid_pid_is_colon_joined() {
        let hid = HidDevice::new("045e", "028e", None, "path".into());
        assert_eq!(hid.vid_pid(), "045E:028E");
    }

    #[test]
    fn visual_order_sorts_saved_first_then_appends_unknown() {
        let order = VisualOrder {
            order: vec!["045E:028E".into(), "054C:0CE6".into()],
            slot_map: [-1; 4],
        };
        let connected = vec![
            ("UNKN:0001".to_string(), 1),
            ("054C:0CE6".to_string(), 2),
            ("045E:028E".to_string(), 3),
        ];
        let sorted = order.apply(connected);
        assert_eq!(sorted[0].0, "045E:028E");
        assert_eq!(sorted[1].0, "054C:0CE6");
        assert_eq!(sorted[2].0, "UNKN:0001");
    }

    #[test]
    fn move_before_reorders_existing_entries() {
        let mut order = VisualOrder {
            order: vec!["A".into(), "B".into(), "C".into()],
            slot_map: [-1; 4],
        };
        order.move_before("C", "A");
        assert_eq!(order.order, vec!["C", "A", "B"]);
    }

    #[test]
    fn move_before_inserts_unranked_entries_first() {
        let mut order = VisualOrder::default();
        order.move_before("B", "A");
        assert_eq!(order.order, vec!["B", "A"]);
    }
}
