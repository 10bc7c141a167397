//! Reorder state machine: drives the focus-index reorder UI without
//! knowing anything about Tauri or the window. See spec §4.10.
//!
//! While reordering, live focus-change events from the device watcher are
//! suppressed so a controller connecting or disconnecting mid-reorder
//! doesn't reassign focus out from under the user; a deferred consistency
//! check runs after every transition instead, clamping any index left
//! stale by queued UI events.

use crate::device::CardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle(Option<usize>),
    Reordering(usize),
}

/// Cards are identified by their "VID:PID" key and tracked by position in
/// `order`, which mirrors the visual grid.
pub struct ReorderState {
    order: Vec<String>,
    phase: Phase,
    /// Taken on `Idle -> Reordering`, restored on cancel, dropped on confirm.
    snapshot: Option<Vec<String>>,
    /// Focus index to return to on cancel.
    pre_reorder_focus: Option<usize>,
    suppress_focus_events: bool,
}

impl ReorderState {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            phase: Phase::Idle(None),
            snapshot: None,
            pre_reorder_focus: None,
            suppress_focus_events: false,
        }
    }

    pub fn is_reordering(&self) -> bool {
        matches!(self.phase, Phase::Reordering(_))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_order(&self) -> &[String] {
        &self.order
    }

    /// Resync the working order from the visual grid. Ignored while
    /// reordering — external changes are deferred until confirm/cancel,
    /// per the suppress-focus-events latch.
    pub fn sync_order(&mut self, order: Vec<String>) {
        if !self.is_reordering() {
            self.order = order;
            self.reconcile();
        }
    }

    /// Idle-only focus tracking (e.g. the UI's own tab/click focus),
    /// suppressed while reordering or latched shut.
    pub fn set_focus(&mut self, index: Option<usize>) {
        if self.suppress_focus_events {
            return;
        }
        if let Phase::Idle(_) = self.phase {
            self.phase = Phase::Idle(index);
        }
    }

    pub fn should_suppress_focus_events(&self) -> bool {
        self.suppress_focus_events
    }

    /// Idle -> Reordering(i): begin reordering the card at `index`,
    /// snapshotting the current order. No-op if already reordering or the
    /// index is out of range.
    pub fn begin_reorder(&mut self, index: usize) {
        if self.is_reordering() || index >= self.order.len() {
            return;
        }
        self.pre_reorder_focus = match self.phase {
            Phase::Idle(f) => f,
            Phase::Reordering(_) => None,
        };
        self.snapshot = Some(self.order.clone());
        self.phase = Phase::Reordering(index);
        self.suppress_focus_events = true;
        self.reconcile();
    }

    /// Reordering(i) -> Reordering(i±1): swap with the neighbour in the
    /// move direction; focus follows the moved card. No-op at either
    /// boundary or outside `Reordering`.
    pub fn move_focused(&mut self, forward: bool) {
        let Phase::Reordering(i) = self.phase else {
            return;
        };
        if forward {
            if i + 1 >= self.order.len() {
                return;
            }
            self.order.swap(i, i + 1);
            self.phase = Phase::Reordering(i + 1);
        } else {
            if i == 0 {
                return;
            }
            self.order.swap(i, i - 1);
            self.phase = Phase::Reordering(i - 1);
        }
        self.reconcile();
    }

    /// Reordering(i) -> Idle(i): confirm, keeping the new order. Returns
    /// the finalized order for the caller to persist and apply to
    /// forwarding.
    pub fn confirm(&mut self) -> Option<Vec<String>> {
        let Phase::Reordering(i) = self.phase else {
            return None;
        };
        self.phase = Phase::Idle(Some(i));
        self.snapshot = None;
        self.pre_reorder_focus = None;
        self.suppress_focus_events = false;
        self.reconcile();
        Some(self.order.clone())
    }

    /// Reordering(i) -> Idle(original_focus): cancel, restoring the
    /// pre-reorder snapshot. No-op outside `Reordering`.
    pub fn cancel(&mut self) {
        if !self.is_reordering() {
            return;
        }
        if let Some(snapshot) = self.snapshot.take() {
            self.order = snapshot;
        }
        self.phase = Phase::Idle(self.pre_reorder_focus.take());
        self.suppress_focus_events = false;
        self.reconcile();
    }

    /// Deferred consistency check run after every transition: clamps a
    /// focus/reorder index left stale by the order shrinking out from
    /// under it (e.g. a device unplugged mid-reorder).
    fn reconcile(&mut self) {
        match &mut self.phase {
            Phase::Idle(Some(f)) if *f >= self.order.len() => {
                self.phase = Phase::Idle(if self.order.is_empty() {
                    None
                } else {
                    Some(self.order.len() - 1)
                });
            }
            Phase::Reordering(i) if *i >= self.order.len() => {
                if self.order.is_empty() {
                    self.phase = Phase::Idle(None);
                    self.suppress_focus_events = false;
                } else {
                    *i = self.order.len() - 1;
                }
            }
            _ => {}
        }
    }

    /// Visual state for a given card key, for the frontend to render.
    /// Selected is held by exactly the card being reordered; every other
    /// card is Dimmed while reordering; Focused/Normal otherwise.
    pub fn card_state(&self, key: &str) -> CardState {
        let Some(pos) = self.order.iter().position(|k| k == key) else {
            return CardState::Normal;
        };
        match self.phase {
            Phase::Idle(focus) => {
                if focus == Some(pos) {
                    CardState::Focused
                } else {
                    CardState::Normal
                }
            }
            Phase::Reordering(i) => {
                if i == pos {
                    CardState::Selected
                } else {
                    CardState::Dimmed
                }
            }
        }
    }
}

impl Default for ReorderState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_order(keys: &[&str]) -> ReorderState {
        let mut s = ReorderState::new();
        s.sync_order(keys.iter().map(|k| k.to_string()).collect());
        s
    }

    #[test]
    fn begin_reorder_snapshots_and_suppresses_focus_events() {
        let mut s = with_order(&["A", "B", "C"]);
        assert!(!s.should_suppress_focus_events());
        s.begin_reorder(1);
        assert!(s.is_reordering());
        assert!(s.should_suppress_focus_events());
        assert_eq!(s.phase(), Phase::Reordering(1));
    }

    #[test]
    fn move_focused_swaps_neighbour_and_focus_follows() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(0);
        s.move_focused(true);
        assert_eq!(s.current_order(), ["B", "A", "C"]);
        assert_eq!(s.phase(), Phase::Reordering(1));
    }

    #[test]
    fn move_focused_is_a_no_op_at_the_boundary() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(0);
        s.move_focused(false);
        assert_eq!(s.current_order(), ["A", "B", "C"]);
        assert_eq!(s.phase(), Phase::Reordering(0));
    }

    #[test]
    fn confirm_keeps_new_order_and_returns_to_idle_at_final_index() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(0);
        s.move_focused(true);
        let confirmed = s.confirm();
        assert_eq!(confirmed, Some(vec!["B".to_string(), "A".to_string(), "C".to_string()]));
        assert_eq!(s.phase(), Phase::Idle(Some(1)));
        assert!(!s.should_suppress_focus_events());
    }

    #[test]
    fn cancel_restores_the_pre_reorder_snapshot_and_original_focus() {
        let mut s = with_order(&["A", "B", "C"]);
        s.set_focus(Some(2));
        s.begin_reorder(0);
        s.move_focused(true);
        s.cancel();
        assert_eq!(s.current_order(), ["A", "B", "C"]);
        assert_eq!(s.phase(), Phase::Idle(Some(2)));
        assert!(!s.should_suppress_focus_events());
    }

    #[test]
    fn card_states_reflect_idle_focus() {
        let mut s = with_order(&["A", "B", "C"]);
        s.set_focus(Some(1));
        assert_eq!(s.card_state("A"), CardState::Normal);
        assert_eq!(s.card_state("B"), CardState::Focused);
        assert_eq!(s.card_state("Z"), CardState::Normal);
    }

    #[test]
    fn card_states_reflect_reordering_selection() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(1);
        assert_eq!(s.card_state("A"), CardState::Dimmed);
        assert_eq!(s.card_state("B"), CardState::Selected);
        assert_eq!(s.card_state("C"), CardState::Dimmed);
    }

    #[test]
    fn second_begin_reorder_is_ignored_while_reordering() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(0);
        s.begin_reorder(2);
        assert_eq!(s.phase(), Phase::Reordering(0));
    }

    #[test]
    fn sync_order_is_ignored_mid_reorder() {
        let mut s = with_order(&["A", "B", "C"]);
        s.begin_reorder(0);
        s.sync_order(vec!["X".into(), "Y".into()]);
        assert_eq!(s.current_order(), ["A", "B", "C"]);
    }
}
