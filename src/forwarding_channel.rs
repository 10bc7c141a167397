//! Forwarding Channel: one thread per physical slot, reading XInput state
//! and submitting it to whichever virtual controller currently owns that
//! slot's target. See spec §4.9.
//!
//! The target is an atomic so the Forwarding Service can hot-remap a
//! channel (Scenario 5) without stopping and restarting the thread, and
//! polling uses the extended XInput query so the Guide button — absent
//! from the documented API — still makes it into the forwarded report.

use crate::device::GamepadState;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// ~250Hz poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(4);

/// Sink a forwarding channel pushes state into. The Forwarding Service
/// implements this over its virtual-controller pool so this module never
/// needs to know about ViGEm directly.
pub trait StateSink: Send + Sync {
    fn submit(&self, target_slot: u8, state: &GamepadState);
    /// Called when the physical source stops responding mid-session.
    fn source_vanished(&self, source_slot: u8);
}

pub struct ForwardingChannel {
    running: Arc<AtomicBool>,
    target_slot: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl ForwardingChannel {
    /// Spawn the polling thread for `source_slot`, initially forwarding to
    /// `initial_target`.
    pub fn spawn(source_slot: u8, initial_target: u8, sink: Arc<dyn StateSink>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let target_slot = Arc::new(AtomicU8::new(initial_target));

        let thread_running = running.clone();
        let thread_target = target_slot.clone();
        let handle = std::thread::spawn(move || {
            run(source_slot, thread_running, thread_target, sink);
        });

        Self {
            running,
            target_slot,
            handle: Some(handle),
        }
    }

    /// Hot-remap: subsequent polls forward to `target` without
    /// interrupting the thread.
    pub fn set_target(&self, target: u8) {
        self.target_slot.store(target, Ordering::Relaxed);
    }

    pub fn current_target(&self) -> u8 {
        self.target_slot.load(Ordering::Relaxed)
    }

    /// Signal the thread to stop and join it.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for ForwardingChannel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn run(
    source_slot: u8,
    running: Arc<AtomicBool>,
    target_slot: Arc<AtomicU8>,
    sink: Arc<dyn StateSink>,
) {
    let mut last_packet: Option<u32> = None;
    let mut misses = 0u32;

    while running.load(Ordering::Relaxed) {
        match imp::poll(source_slot) {
            Some((state, packet)) => {
                misses = 0;
                if last_packet != Some(packet) {
                    last_packet = Some(packet);
                    sink.submit(target_slot.load(Ordering::Relaxed), &state);
                }
            }
            None => {
                misses += 1;
                // A handful of consecutive misses means the source really
                // disconnected, not a single dropped poll.
                if misses == 10 {
                    sink.source_vanished(source_slot);
                }
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(windows)]
mod imp {
    use crate::device::GamepadState;

    /// Query the extended XInput state (carries the Guide button, unlike
    /// the documented `XInputGetState`) via `rusty-xinput`'s ordinal-100
    /// lookup. Returns `None` on any failure, including "not connected".
    pub fn poll(slot: u8) -> Option<(GamepadState, u32)> {
        use std::sync::OnceLock;
        static HANDLE: OnceLock<Option<rusty_xinput::XInputHandle>> = OnceLock::new();
        let handle = HANDLE
            .get_or_init(|| rusty_xinput::XInputHandle::load_default().ok())
            .as_ref()?;

        let state = handle.get_state_ex(slot as u32).ok()?;
        let gamepad = &state.raw.Gamepad;
        Some((
            GamepadState {
                buttons: gamepad.wButtons,
                left_trigger: gamepad.bLeftTrigger,
                right_trigger: gamepad.bRightTrigger,
                thumb_lx: gamepad.sThumbLX,
                thumb_ly: gamepad.sThumbLY,
                thumb_rx: gamepad.sThumbRX,
                thumb_ry: gamepad.sThumbRY,
            },
            state.raw.dwPacketNumber,
        ))
    }
}

#[cfg(not(windows))]
mod imp {
    use crate::device::GamepadState;

    pub fn poll(_slot: u8) -> Option<(GamepadState, u32)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        submissions: Mutex<Vec<(u8, GamepadState)>>,
        vanished: Mutex<Vec<u8>>,
    }

    impl StateSink for RecordingSink {
        fn submit(&self, target_slot: u8, state: &GamepadState) {
            self.submissions.lock().unwrap().push((target_slot, *state));
        }
        fn source_vanished(&self, source_slot: u8) {
            self.vanished.lock().unwrap().push(source_slot);
        }
    }

    #[test]
    fn set_target_is_visible_to_a_freshly_spawned_reader() {
        // No OS XInput available in a test environment, so this only
        // exercises the atomic hot-remap path, not thread delivery.
        let sink = Arc::new(RecordingSink {
            submissions: Mutex::new(Vec::new()),
            vanished: Mutex::new(Vec::new()),
        });
        let channel = ForwardingChannel::spawn(0, 2, sink);
        assert_eq!(channel.current_target(), 2);
        channel.set_target(3);
        assert_eq!(channel.current_target(), 3);
        channel.stop();
    }
}
