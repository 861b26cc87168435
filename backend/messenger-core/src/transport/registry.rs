use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Channel name -> registered items.
///
/// Items are cloned out before use so callbacks never run under the lock.
pub(crate) struct ChannelRegistry<T: Clone> {
    entries: Mutex<HashMap<String, Vec<T>>>,
}

impl<T: Clone> ChannelRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn add(&self, channel: &str, item: T) {
        self.lock()
            .entry(channel.to_string())
            .or_default()
            .push(item);
    }

    /// Keep `item` as the only entry. Returns true if something was replaced.
    pub(crate) fn replace(&self, channel: &str, item: T) -> bool {
        self.lock()
            .insert(channel.to_string(), vec![item])
            .is_some_and(|old| !old.is_empty())
    }

    pub(crate) fn remove_all(&self, channel: &str) -> usize {
        self.lock().remove(channel).map_or(0, |old| old.len())
    }

    pub(crate) fn get(&self, channel: &str) -> Vec<T> {
        self.lock().get(channel).cloned().unwrap_or_default()
    }

    pub(crate) fn first(&self, channel: &str) -> Option<T> {
        self.lock()
            .get(channel)
            .and_then(|items| items.first().cloned())
    }

    pub(crate) fn count(&self, channel: &str) -> usize {
        self.lock().get(channel).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
