use crate::anticheat::{AnticheatKb, ProcessWatcher};
use crate::config::AppConfig;
use crate::device::{MatchedController, VisualOrder};
use crate::forwarding_service::ForwardingService;
use crate::knowledge_base::KnowledgeBase;
use crate::order_store::OrderStore;
use crate::reorder::ReorderState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Inner {
    pub config: AppConfig,
    /// Last `get_connected_devices` result, kept so commands like
    /// `toggle_device`/`confirm identification` don't need to re-enumerate.
    pub last_snapshot: Vec<MatchedController>,
    pub order: VisualOrder,
    pub nicknames: HashMap<String, String>,
    pub reorder: ReorderState,
}

pub struct AppState {
    inner: Mutex<Inner>,
    pub forwarding: Arc<ForwardingService>,
    watcher: Mutex<ProcessWatcher>,
    pub kb: KnowledgeBase,
    pub anticheat_kb: AnticheatKb,
}

impl AppState {
    pub fn new() -> Self {
        let config = AppConfig::load().unwrap_or_default();
        Self {
            inner: Mutex::new(Inner {
                config,
                last_snapshot: vec![],
                order: OrderStore::load_order(),
                nicknames: OrderStore::load_nicknames(),
                reorder: ReorderState::new(),
            }),
            forwarding: Arc::new(ForwardingService::new()),
            watcher: Mutex::new(ProcessWatcher::new()),
            kb: KnowledgeBase::default(),
            anticheat_kb: AnticheatKb::default(),
        }
    }

    pub fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn lock_watcher(&self) -> MutexGuard<'_, ProcessWatcher> {
        self.watcher.lock().unwrap()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
