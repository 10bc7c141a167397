//! Forwarding Service: the single owner of the virtual bus connection, the
//! input filter, and the live set of forwarding channels. Exposes exactly
//! four operations — `start`, `update_mapping`, `stop`, `revert_all` — all
//! serialized through one lock so concurrent Tauri commands can't race each
//! other into a half-applied mapping. See spec §4.11.

use crate::device::{GamepadState, HidDevice, PhysicalSlotState, SlotAssignment};
use crate::error::{PadSwitchError, Result};
use crate::forwarding_channel::{ForwardingChannel, StateSink};
use crate::hidhide::{self, InputFilter};
use crate::platform;
use crate::slot_prober;
use crate::vigem::imp::{VigemClient, VirtualController};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Time to wait after growing the virtual pool for the OS to register the
/// new slots before diffing the before/after snapshot (§4.11 step 4).
const POOL_SETTLE: Duration = Duration::from_millis(300);

/// Serializes the four public operations. A `Mutex<()>` rather than a
/// richer type: callers need mutual exclusion, not a value.
pub struct ForwardingService {
    op_lock: Mutex<()>,
    inner: Mutex<Inner>,
    /// Virtual controllers in creation order. Channels address elements by
    /// position, never by the OS slot they landed on (§3: that slot is only
    /// known via the before/after diff, never a per-virtual "user index").
    virtual_pool: Arc<Mutex<Vec<VirtualController>>>,
    last_error: Mutex<Option<PadSwitchError>>,
}

struct Inner {
    vigem: Option<VigemClient>,
    filter: Box<dyn InputFilter>,
    /// source physical slot -> forwarding channel
    channels: HashMap<u8, ForwardingChannel>,
    /// source physical slot -> HID instance id hidden for it
    hidden: HashMap<u8, String>,
    /// user-facing target_slot -> pool position, established by `start()`
    /// in pool-creation order and consulted (never extended) by
    /// `update_mapping()`.
    target_to_pool: HashMap<u8, usize>,
    /// OS slot index detected for each pool element, by creation order.
    /// Informational only — nothing routes submissions through it.
    virtual_slot_indices: Vec<u8>,
}

impl ForwardingService {
    pub fn new() -> Self {
        Self::with_filter(hidhide::open())
    }

    fn with_filter(filter: Box<dyn InputFilter>) -> Self {
        Self {
            op_lock: Mutex::new(()),
            inner: Mutex::new(Inner {
                vigem: None,
                filter,
                channels: HashMap::new(),
                hidden: HashMap::new(),
                target_to_pool: HashMap::new(),
                virtual_slot_indices: Vec::new(),
            }),
            virtual_pool: Arc::new(Mutex::new(Vec::new())),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_forwarding(&self) -> bool {
        !self.inner.lock().unwrap().channels.is_empty()
    }

    /// Drains and returns the most recent asynchronously-surfaced error
    /// (a vanished source), if any, for the UI layer to poll.
    pub fn take_last_error(&self) -> Option<PadSwitchError> {
        self.last_error.lock().unwrap().take()
    }

    pub fn filter_available(&self) -> bool {
        self.inner.lock().unwrap().filter.is_available()
    }

    pub fn vigem_installed(&self) -> bool {
        VigemClient::is_installed()
    }

    /// Manual hide/unhide for the device-list "eye" toggle, independent of
    /// whether forwarding is currently running.
    pub fn hide_device(&self, instance_id: &str) -> Result<()> {
        self.inner.lock().unwrap().filter.hide(instance_id)
    }

    pub fn unhide_device(&self, instance_id: &str) -> Result<()> {
        self.inner.lock().unwrap().filter.unhide(instance_id)
    }

    pub fn add_app_rule(&self, exe_path: &str) -> Result<()> {
        self.inner.lock().unwrap().filter.add_app_rule(exe_path)
    }

    /// Start forwarding for a fresh mapping. Rolls back everything this
    /// call created if any step fails partway (Scenario 4).
    pub fn start(&self, mapping: &[SlotAssignment], hids: &[HidDevice]) -> Result<()> {
        let _guard = self.op_lock.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();

        let needed = mapping.iter().filter(|a| a.source_path.is_some()).count();
        let client_created_here = inner.vigem.is_none();
        if inner.vigem.is_none() {
            inner.vigem = Some(VigemClient::connect()?);
        }

        let pre_pool_len = self.virtual_pool.lock().unwrap().len();
        if let Err(e) = self.grow_pool(&mut inner, needed) {
            if client_created_here {
                inner.vigem = None;
            }
            return Err(e);
        }

        if let Some(exe) = platform::current_exe_path() {
            let _ = inner.filter.add_app_rule(&exe);
        }
        for helper in platform::overlay_helper_paths() {
            let _ = inner.filter.add_app_rule(&helper);
        }

        let mut spawned_sources: Vec<u8> = Vec::new();
        let mut hidden_sources: Vec<u8> = Vec::new();
        let mut target_to_pool: HashMap<u8, usize> = HashMap::new();
        let mut next_pool_idx = 0usize;

        let result = (|| -> Result<()> {
            for assignment in mapping {
                let Some(source_slot) = assignment.source_slot else {
                    continue;
                };
                let Some(instance_id) = assignment.source_path.as_deref().or_else(|| {
                    hids.iter()
                        .find(|h| h.path.contains(&format!("IG_0{}", source_slot)))
                        .map(|h| h.path.as_str())
                }) else {
                    continue;
                };

                let pool_idx = next_pool_idx;
                next_pool_idx += 1;
                target_to_pool.insert(assignment.target_slot, pool_idx);

                inner.filter.hide(instance_id).map_err(|e| {
                    PadSwitchError::FilterMutationFailed(format!("hide {} failed: {}", instance_id, e))
                })?;
                inner.hidden.insert(source_slot, instance_id.to_string());
                hidden_sources.push(source_slot);

                let sink: Arc<dyn StateSink> = Arc::new(VigemSink {
                    pool: self.virtual_pool.clone(),
                });
                let channel = ForwardingChannel::spawn(source_slot, pool_idx as u8, sink);
                inner.channels.insert(source_slot, channel);
                spawned_sources.push(source_slot);
            }
            Ok(())
        })();

        if let Err(e) = result {
            for source_slot in spawned_sources {
                if let Some(ch) = inner.channels.remove(&source_slot) {
                    ch.stop();
                }
            }
            for source_slot in hidden_sources {
                inner.hidden.remove(&source_slot);
            }
            let _ = inner.filter.clear_all();

            let mut pool = self.virtual_pool.lock().unwrap();
            while pool.len() > pre_pool_len {
                if let Some(mut v) = pool.pop() {
                    v.disconnect();
                }
            }
            drop(pool);
            inner.virtual_slot_indices.truncate(pre_pool_len);
            if client_created_here {
                inner.vigem = None;
            }
            return Err(e);
        }

        // Device-hiding precedes global activation (§5): never flip this on
        // before every device in this call is already on the blocked list.
        inner.filter.set_active(true).map_err(|e| {
            PadSwitchError::FilterMutationFailed(format!("set_active(true) failed: {}", e))
        })?;

        inner.target_to_pool = target_to_pool;
        Ok(())
    }

    /// Grow the virtual pool to `needed` elements if it's currently
    /// smaller, detecting each new element's OS slot via a before/after
    /// snapshot diff (§2, §3, §4.11 steps 1-6) rather than assuming the OS
    /// honors the slot we asked for.
    fn grow_pool(&self, inner: &mut Inner, needed: usize) -> Result<()> {
        let mut pool = self.virtual_pool.lock().unwrap();
        if pool.len() >= needed {
            return Ok(());
        }

        let pre = occupied_indices(&slot_prober::snapshot());
        let pre_len = pool.len();

        let vigem = inner
            .vigem
            .as_ref()
            .ok_or_else(|| PadSwitchError::InfrastructureMissing("virtual bus not connected".into()))?;
        while pool.len() < needed {
            let mut controller = vigem.create();
            controller.connect()?;
            pool.push(controller);
        }
        let grown_by = pool.len() - pre_len;
        drop(pool);

        std::thread::sleep(POOL_SETTLE);
        let post = occupied_indices(&slot_prober::snapshot());
        let mut newly: Vec<u8> = post.difference(&pre).copied().collect();
        newly.sort_unstable();

        if newly.len() != grown_by {
            // Open question (§9): a physical gamepad connecting during the
            // settle window makes the diff ambiguous. Log it and keep
            // whatever the diff found; the pre-snapshot remains
            // authoritative until the next device-change event.
            log::warn!(
                "virtual-slot diff detected {} new slot(s) but grew the pool by {}; \
                 a physical gamepad may have connected during the settle window",
                newly.len(),
                grown_by
            );
        }
        inner.virtual_slot_indices.extend(newly);
        Ok(())
    }

    /// Retarget already-running channels without touching the filter, the
    /// virtual pool, or any thread (Scenario 5: hot remap). Precondition:
    /// `is_forwarding()`.
    pub fn update_mapping(&self, mapping: &[SlotAssignment]) -> Result<()> {
        let _guard = self.op_lock.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();

        for assignment in mapping {
            let Some(source_slot) = assignment.source_slot else {
                continue;
            };
            if assignment.source_path.is_none() {
                continue;
            }
            let Some(&pool_idx) = inner.target_to_pool.get(&assignment.target_slot) else {
                log::warn!(
                    "update_mapping: no pool element bound to target slot {}, skipping",
                    assignment.target_slot
                );
                continue;
            };
            if let Some(ch) = inner.channels.get(&source_slot) {
                ch.set_target(pool_idx as u8);
            }
        }

        Ok(())
    }

    /// Dispose all channels (HID side only) and `clear_all` the filter.
    /// Keeps the virtual pool and `virtual_slot_indices` so a subsequent
    /// `start()` reuses them instead of reconnecting/disconnecting virtual
    /// controllers, which would otherwise spam other OS observers with
    /// device-change churn. Idempotent: always calls `clear_all`, even when
    /// already stopped.
    pub fn stop(&self) -> Result<()> {
        let _guard = self.op_lock.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();

        for (_, ch) in inner.channels.drain() {
            ch.stop();
        }
        inner.hidden.clear();

        inner.filter.clear_all()
    }

    /// Full reset: dispose channels, `clear_all` the filter, disconnect and
    /// drop every virtual controller, drop the ViGEm client, and clear
    /// `virtual_slot_indices`. Used for the user-facing "reset all" action
    /// and by crash recovery. Idempotent.
    pub fn revert_all(&self) -> Result<()> {
        let _guard = self.op_lock.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();

        for (_, ch) in inner.channels.drain() {
            ch.stop();
        }
        inner.hidden.clear();
        inner.target_to_pool.clear();
        inner.virtual_slot_indices.clear();

        let mut pool = self.virtual_pool.lock().unwrap();
        for mut v in pool.drain(..) {
            v.disconnect();
        }
        drop(pool);
        inner.vigem = None;

        inner.filter.clear_all()
    }
}

impl Default for ForwardingService {
    fn default() -> Self {
        Self::new()
    }
}

fn occupied_indices(snapshot: &[PhysicalSlotState; 4]) -> HashSet<u8> {
    snapshot.iter().filter(|s| s.connected).map(|s| s.index).collect()
}

/// Bridges `ForwardingChannel`'s generic sink trait to the virtual
/// controller pool, without the channel needing to know about ViGEm.
struct VigemSink {
    pool: Arc<Mutex<Vec<VirtualController>>>,
}

impl StateSink for VigemSink {
    fn submit(&self, pool_index: u8, state: &GamepadState) {
        if let Some(controller) = self.pool.lock().unwrap().get_mut(pool_index as usize) {
            let _ = controller.submit(state);
        }
    }

    fn source_vanished(&self, source_slot: u8) {
        log::warn!("forwarding source in slot {} vanished", source_slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidhide::NullFilter;

    /// Counts `clear_all` invocations so tests can assert on the
    /// idempotence guarantee without a real driver. Shared via `Arc` so the
    /// test can still read the counter after the trait object is boxed
    /// into the service.
    struct CountingFilter {
        clear_all_calls: Mutex<u32>,
    }

    impl CountingFilter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                clear_all_calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.clear_all_calls.lock().unwrap()
        }
    }

    impl InputFilter for Arc<CountingFilter> {
        fn is_available(&self) -> bool {
            true
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
            *self.clear_all_calls.lock().unwrap() += 1;
            Ok(())
        }
        fn set_active(&self, _active: bool) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fresh_service_is_not_forwarding() {
        let service = ForwardingService::new();
        assert!(!service.is_forwarding());
    }

    #[test]
    fn stop_on_idle_service_is_a_no_op_ok() {
        let service = ForwardingService::new();
        assert!(service.stop().is_ok());
    }

    #[test]
    fn stop_always_calls_clear_all_even_when_called_twice() {
        let filter = CountingFilter::new();
        let service = ForwardingService::with_filter(Box::new(filter.clone()));
        service.stop().unwrap();
        service.stop().unwrap();
        assert_eq!(filter.calls(), 2);
    }

    #[test]
    fn revert_all_is_idempotent_on_an_idle_service() {
        let service = ForwardingService::with_filter(Box::new(NullFilter));
        assert!(service.revert_all().is_ok());
        assert!(service.revert_all().is_ok());
    }

    #[test]
    fn update_mapping_on_unknown_target_does_not_error() {
        let service = ForwardingService::new();
        let mapping = vec![SlotAssignment {
            target_slot: 0,
            source_slot: Some(0),
            source_path: Some("USB\\VID_045E&PID_028E\\IG_00".into()),
        }];
        // Not forwarding yet, so target_to_pool is empty; update_mapping
        // must skip silently rather than create anything.
        assert!(service.update_mapping(&mapping).is_ok());
        assert!(!service.is_forwarding());
    }
}
