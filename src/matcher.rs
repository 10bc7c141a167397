//! Associates each OS slot with its HID interface and annotates identity.
//! See spec §4.4. Pure function over the slot snapshot and the HID list —
//! no OS calls, fully unit-testable.

use crate::bus_classifier::bus_for;
use crate::device::{HidDevice, MatchedController, PhysicalSlotState};
use crate::knowledge_base::KnowledgeBase;

/// Marker substring for an exact slot association: `IG_0N` where N is the
/// slot index.
fn ig_marker(slot: u8) -> String {
    format!("IG_0{}", slot)
}

/// Two-pass match: exact `IG_0N` association, then a fallback scan of any
/// other `IG_0X` for still-unmatched slots, sharing a claimed-paths set so
/// no HID interface is bound to more than one slot.
pub fn match_controllers(
    slots: &[PhysicalSlotState],
    hids: &[HidDevice],
    kb: &KnowledgeBase,
) -> Vec<MatchedController> {
    let mut claimed: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut bound: Vec<Option<&HidDevice>> = vec![None; slots.len()];

    // Pass 1: exact IG_0N.
    for (i, slot) in slots.iter().enumerate() {
        if !slot.connected {
            continue;
        }
        let marker = ig_marker(slot.index);
        if let Some(hid) = hids
            .iter()
            .find(|h| h.path.contains(&marker) && !claimed.contains(h.path.as_str()))
        {
            claimed.insert(hid.path.as_str());
            bound[i] = Some(hid);
        }
    }

    // Pass 2: fallback IG_0X for X != N, first unclaimed hit wins.
    for (i, slot) in slots.iter().enumerate() {
        if !slot.connected || bound[i].is_some() {
            continue;
        }
        for x in 0..4u8 {
            if x == slot.index {
                continue;
            }
            let marker = ig_marker(x);
            if let Some(hid) = hids
                .iter()
                .find(|h| h.path.contains(&marker) && !claimed.contains(h.path.as_str()))
            {
                claimed.insert(hid.path.as_str());
                bound[i] = Some(hid);
                break;
            }
        }
    }

    slots
        .iter()
        .zip(bound)
        .map(|(slot, hid)| annotate(slot, hid, kb))
        .collect()
}

fn annotate(
    slot: &PhysicalSlotState,
    hid: Option<&HidDevice>,
    kb: &KnowledgeBase,
) -> MatchedController {
    if !slot.connected {
        return MatchedController::empty(slot.index);
    }

    let Some(hid) = hid else {
        let mut m = MatchedController::empty(slot.index);
        m.connected = true;
        m.battery = slot.battery;
        return m;
    };

    let bus = bus_for(&hid.path);
    let vendor_brand = kb.brand_for(&hid.vid);
    let known = kb.known_device(&hid.vid, &hid.pid);
    let is_integrated = kb.is_integrated(&hid.vid, &hid.pid);

    MatchedController {
        slot_index: slot.index,
        connected: true,
        physical: Some(hid.clone()),
        bus,
        is_integrated,
        known_name: known.map(|k| k.name),
        vendor_brand,
        battery: slot.battery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Connection, HidDevice};

    fn connected_slot(index: u8) -> PhysicalSlotState {
        PhysicalSlotState {
            index,
            connected: true,
            connection: Connection::Wired,
            battery: None,
        }
    }

    #[test]
    fn exact_index_match() {
        let slots = vec![connected_slot(0)];
        let hids = vec![HidDevice::new("045E", "028E", None, r"USB\VID_045E&PID_028E\IG_00".into())];
        let kb = KnowledgeBase::default();
        let result = match_controllers(&slots, &hids, &kb);
        assert_eq!(result[0].physical.as_ref().unwrap().vid, "045E");
    }

    #[test]
    fn fallback_claims_the_only_device_leaving_other_slot_unmatched() {
        let slots = vec![connected_slot(0), connected_slot(1)];
        let hids = vec![HidDevice::new("045E", "028E", None, r"USB\VID_045E&PID_028E\IG_01".into())];
        let kb = KnowledgeBase::default();
        let result = match_controllers(&slots, &hids, &kb);
        assert!(result[0].physical.is_some());
        assert!(result[1].physical.is_none());
    }

    #[test]
    fn distinct_slots_never_share_a_bound_path() {
        let slots = vec![connected_slot(0), connected_slot(1)];
        let hids = vec![HidDevice::new("045E", "028E", None, r"USB\VID_045E&PID_028E\IG_00".into())];
        let kb = KnowledgeBase::default();
        let result = match_controllers(&slots, &hids, &kb);
        assert!(result[0].physical.is_some());
        assert!(result[1].physical.is_none());
    }

    #[test]
    fn disconnected_slot_returns_empty_entry() {
        let slots = vec![PhysicalSlotState::disconnected(2)];
        let kb = KnowledgeBase::default();
        let result = match_controllers(&slots, &[], &kb);
        assert!(!result[0].connected);
        assert!(result[0].physical.is_none());
    }

    #[test]
    fn result_length_equals_input_length() {
        let slots = vec![
            connected_slot(0),
            PhysicalSlotState::disconnected(1),
            connected_slot(2),
            PhysicalSlotState::disconnected(3),
        ];
        let kb = KnowledgeBase::default();
        let result = match_controllers(&slots, &[], &kb);
        assert_eq!(result.len(), 4);
    }
}
