use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tick shared by every store so tickets never repeat within a process.
static NEXT_TICK: AtomicU64 = AtomicU64::new(1);

/// Handle for cancelling one `watch` registration.
///
/// Only meaningful to the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionTicket {
    pub(crate) store_id: u64,
    pub(crate) tick: u64,
    key: Arc<str>,
}

impl SubscriptionTicket {
    pub(crate) fn issue(store_id: u64, key: &str) -> Self {
        Self {
            store_id,
            tick: NEXT_TICK.fetch_add(1, Ordering::Relaxed),
            key: Arc::from(key),
        }
    }

    /// Key the subscription was made on.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Display for SubscriptionTicket {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "Messenger::{}::{}", self.key, self.tick)
    }
}
