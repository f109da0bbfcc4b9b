//! In-memory history.
//!
//! Keeps a queue of entries and a cursor. Nothing outside the process
//! observes it, so pops only happen through `go`.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::history::{
    normalize_base, HistoryListener, HistoryState, NavigationDirection, NavigationInformation, NavigationType,
    RouterHistory,
};
use crate::navigation::callbacks::{CallbackList, RemoveCallback};
use crate::navigation::scroll::ScrollPosition;

#[derive(Debug)]
struct Entries {
    queue: Vec<HistoryState>,
    position: usize,
}

impl Entries {
    fn current(&self) -> &HistoryState {
        &self.queue[self.position]
    }

    fn relink(&mut self) {
        for index in 0..self.queue.len() {
            let back = index.checked_sub(1).map(|i| self.queue[i].current.clone());
            let forward = self.queue.get(index + 1).map(|entry| entry.current.clone());
            let entry = &mut self.queue[index];
            entry.back = back;
            entry.forward = forward;
            entry.position = index;
        }
    }
}

/// History kept in memory, for servers, tests and tools.
#[derive(Debug)]
pub struct MemoryHistory {
    base: String,
    entries: Mutex<Entries>,
    listeners: CallbackList<HistoryListener>,
}

impl MemoryHistory {
    /// A history holding a single `/` entry.
    pub fn new(base: &str) -> Self {
        Self {
            base: normalize_base(base),
            entries: Mutex::new(Entries {
                queue: vec![HistoryState {
                    current: "/".to_string(),
                    ..Default::default()
                }],
                position: 0,
            }),
            listeners: CallbackList::new(),
        }
    }

    pub fn shared(base: &str) -> Arc<Self> {
        Arc::new(Self::new(base))
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .queue
            .iter()
            .map(|entry| entry.current.clone())
            .collect()
    }

    pub fn position(&self) -> usize {
        self.entries.lock().position
    }

    /// Record the scroll offset of the current entry.
    pub fn save_scroll(&self, position: ScrollPosition) {
        let mut entries = self.entries.lock();
        let index = entries.position;
        entries.queue[index].scroll = Some(position);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("")
    }
}

impl RouterHistory for MemoryHistory {
    fn base(&self) -> &str {
        &self.base
    }

    fn location(&self) -> String {
        self.entries.lock().current().current.clone()
    }

    fn state(&self) -> HistoryState {
        self.entries.lock().current().clone()
    }

    fn push(&self, to: &str, data: Option<serde_json::Value>) {
        let mut entries = self.entries.lock();
        let next = entries.position + 1;
        entries.queue.truncate(next);
        entries.queue.push(HistoryState {
            current: to.to_string(),
            data,
            ..Default::default()
        });
        entries.position = next;
        entries.relink();
        debug!(to = %to, position = next, "History push");
    }

    fn replace(&self, to: &str, data: Option<serde_json::Value>, scroll: Option<ScrollPosition>) {
        let mut entries = self.entries.lock();
        let index = entries.position;
        entries.queue[index] = HistoryState {
            current: to.to_string(),
            replaced: true,
            scroll,
            data,
            ..Default::default()
        };
        entries.relink();
        debug!(to = %to, position = index, "History replace");
    }

    fn go(&self, delta: i64, trigger_listeners: bool) -> i64 {
        let (from, to, applied) = {
            let mut entries = self.entries.lock();
            let from = entries.current().current.clone();
            let before = entries.position as i64;
            let last = entries.queue.len() as i64 - 1;
            entries.position = (before + delta).clamp(0, last) as usize;
            (from, entries.current().current.clone(), entries.position as i64 - before)
        };
        if applied != delta {
            debug!(requested = delta, applied, "History move clamped");
        }

        if !trigger_listeners || applied == 0 {
            return applied;
        }
        let info = NavigationInformation {
            kind: NavigationType::Pop,
            direction: if applied < 0 {
                NavigationDirection::Back
            } else {
                NavigationDirection::Forward
            },
            delta: applied,
        };
        for listener in self.listeners.list() {
            listener(&to, &from, &info);
        }
        applied
    }

    fn listen(&self, callback: HistoryListener) -> RemoveCallback {
        self.listeners.add(callback)
    }

    fn destroy(&self) {
        self.listeners.reset();
    }
}
