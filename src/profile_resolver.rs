//! Profile Resolver: turns a profile's saved vid:pid preferences into
//! concrete `SlotAssignment`s against whichever physical interfaces are
//! currently connected. See spec §4.13.
//!
//! Pure function over the profile and the current matched-controller list
//! — no OS calls, fully unit-testable. If two saved entries name the same
//! vid:pid but only one matching device is present, the first entry (in
//! profile order) claims it and the rest resolve to nothing.

use crate::device::{MatchedController, SlotAssignment};
use crate::profile::Profile;
use std::collections::HashSet;

pub fn resolve(profile: &Profile, connected: &[MatchedController]) -> Vec<SlotAssignment> {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut assignments = Vec::new();

    for entry in &profile.entries {
        let Some(matched) = connected.iter().find(|m| {
            m.connected
                && m.physical
                    .as_ref()
                    .map(|p| p.vid == entry.vid && p.pid == entry.pid)
                    .unwrap_or(false)
                && !claimed.contains(&m.physical.as_ref().unwrap().path)
        }) else {
            continue;
        };

        let path = matched.physical.as_ref().unwrap().path.clone();
        claimed.insert(path.clone());
        assignments.push(SlotAssignment {
            target_slot: entry.target_slot,
            source_slot: Some(matched.slot_index),
            source_path: Some(path),
        });
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BusType, HidDevice};
    use crate::profile::ProfileEntry;

    fn matched(slot: u8, vid: &str, pid: &str, path: &str) -> MatchedController {
        MatchedController {
            slot_index: slot,
            connected: true,
            physical: Some(HidDevice::new(vid, pid, None, path.into())),
            bus: BusType::Usb,
            is_integrated: false,
            known_name: None,
            vendor_brand: None,
            battery: None,
        }
    }

    #[test]
    fn resolves_entry_against_matching_connected_device() {
        let profile = Profile::new(
            "Elden Ring".into(),
            vec![ProfileEntry {
                vid: "045E".into(),
                pid: "028E".into(),
                target_slot: 0,
            }],
        );
        let connected = vec![matched(2, "045E", "028E", r"USB\VID_045E&PID_028E\IG_00")];
        let resolved = resolve(&profile, &connected);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].target_slot, 0);
        assert_eq!(resolved[0].source_slot, Some(2));
    }

    #[test]
    fn missing_device_yields_no_assignment() {
        let profile = Profile::new(
            "Elden Ring".into(),
            vec![ProfileEntry {
                vid: "045E".into(),
                pid: "028E".into(),
                target_slot: 0,
            }],
        );
        let resolved = resolve(&profile, &[]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn duplicate_vid_pid_entries_claim_distinct_devices_only() {
        let profile = Profile::new(
            "Co-op".into(),
            vec![
                ProfileEntry {
                    vid: "045E".into(),
                    pid: "028E".into(),
                    target_slot: 0,
                },
                ProfileEntry {
                    vid: "045E".into(),
                    pid: "028E".into(),
                    target_slot: 1,
                },
            ],
        );
        let connected = vec![matched(2, "045E", "028E", r"USB\VID_045E&PID_028E\IG_00")];
        let resolved = resolve(&profile, &connected);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].target_slot, 0);
    }
}
