//! Ordered callback lists with removal handles.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

struct Entries<T> {
    next_id: u64,
    items: Vec<(u64, T)>,
}

/// Callbacks in registration order.
///
/// Cloning the list shares the same entries.
pub struct CallbackList<T> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T> Clone for CallbackList<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for CallbackList<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                items: Vec::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for CallbackList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList").field("len", &self.len()).finish()
    }
}

impl<T: Clone + Send + 'static> CallbackList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item`. The returned handle removes exactly this entry.
    pub fn add(&self, item: T) -> RemoveCallback {
        let id = {
            let mut entries = self.entries.lock();
            let id = entries.next_id;
            entries.next_id += 1;
            entries.items.push((id, item));
            id
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        RemoveCallback {
            remove: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    entries.lock().items.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Snapshot of the entries, so callbacks may add or remove entries while
    /// the snapshot is iterated.
    pub fn list(&self) -> Vec<T> {
        self.entries.lock().items.iter().map(|(_, item)| item.clone()).collect()
    }

    pub fn reset(&self) {
        self.entries.lock().items.clear();
    }
}

impl<T> CallbackList<T> {
    pub fn len(&self) -> usize {
        self.entries.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes one registered callback. Dropping the handle keeps the callback.
pub struct RemoveCallback {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl RemoveCallback {
    pub fn remove(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for RemoveCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoveCallback")
    }
}
