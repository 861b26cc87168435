//! Latest-value store with subscription bookkeeping.
//!
//! One record per channel key holds the current value and the ordered list of
//! observers watching it. The store is the only stateful piece of the
//! messenger: dispatchers hand its [`ContextHost`] view to every handler.
//!
//! # Semantics
//!
//! - `watch` replays the current value to the new observer before returning.
//! - `update` on an unknown key is a silent no-op; `watch` on one is an error.
//! - `dispose` releases every subscription and turns later updates into no-ops.
//!
//! # Locking
//!
//! A single mutex guards the records. Observers are always called with the
//! lock released, so an observer may update or unsubscribe re-entrantly. An
//! observer released during a notification is skipped for the rest of it.

mod context;
mod schedule;
mod ticket;

pub(crate) use context::Scope;
pub use context::{ContextHost, Slot};
pub use schedule::{Immediate, Schedule};
pub use ticket::SubscriptionTicket;

use crate::error::store::StoreError;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde_json::Value;
use tokio::sync::watch;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Callback registered through [`ValueStore::watch`].
pub type Observer = Arc<dyn Fn(&Value) + Send + Sync>;

struct Record {
    sender: watch::Sender<Value>,
    observers: Vec<(u64, Observer)>,
}

struct Inner {
    records: HashMap<String, Record>,
    /// tick -> key, for every live ticket
    live: HashMap<u64, String>,
    disposed: bool,
}

/// Per-key latest-value holder.
///
/// Cloning is cheap; all clones share the same records.
#[derive(Clone)]
pub struct ValueStore {
    id: u64,
    inner: Arc<Mutex<Inner>>,
    scheduler: Arc<dyn Schedule>,
}

impl ValueStore {
    /// Create a store with one record per entry of `initial`.
    pub fn new<I, K>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::with_scheduler(initial, Arc::new(Immediate))
    }

    /// Create a store whose registrations and updates run through `scheduler`.
    pub fn with_scheduler<I, K>(initial: I, scheduler: Arc<dyn Schedule>) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let records = initial
            .into_iter()
            .map(|(key, value)| {
                let (sender, _) = watch::channel(value);
                (
                    key.into(),
                    Record {
                        sender,
                        observers: Vec::new(),
                    },
                )
            })
            .collect();

        Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(Inner {
                records,
                live: HashMap::new(),
                disposed: false,
            })),
            scheduler,
        }
    }

    /// Read-write view handed to handlers. It cannot dispose the store.
    pub fn host(&self) -> ContextHost {
        ContextHost::new(self.clone())
    }

    /// View whose subscriptions are recorded in `scope`.
    pub(crate) fn scoped_host(&self, scope: Arc<Scope>) -> ContextHost {
        ContextHost::scoped(self.clone(), scope)
    }

    pub(crate) fn scheduler(&self) -> Arc<dyn Schedule> {
        Arc::clone(&self.scheduler)
    }

    /// Register `observer` on `key` and replay the current value to it.
    ///
    /// The replay happens synchronously, before the ticket is returned.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownKey`] if `key` was not in the initial map
    /// - [`StoreError::Disposed`] if the store has been disposed
    #[track_caller]
    pub fn watch<F>(&self, key: &str, observer: F) -> Result<SubscriptionTicket, StoreError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let location = ErrorLocation::from(Location::caller());
        let observer: Observer = Arc::new(observer);
        let mut outcome = None;

        self.scheduler.run(&mut || {
            let registered = self.register(key, Arc::clone(&observer), location);
            if let Ok((_, ref current)) = registered {
                observer(current);
            }
            outcome = Some(registered.map(|(ticket, _)| ticket));
        });

        outcome.unwrap_or(Err(StoreError::Unscheduled { location }))
    }

    fn register(
        &self,
        key: &str,
        observer: Observer,
        location: ErrorLocation,
    ) -> Result<(SubscriptionTicket, Value), StoreError> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(StoreError::Disposed { location });
        }

        let record = inner
            .records
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownKey {
                key: key.to_string(),
                location,
            })?;

        let ticket = SubscriptionTicket::issue(self.id, key);
        record.observers.push((ticket.tick, observer));
        let current = record.sender.borrow().clone();
        inner.live.insert(ticket.tick, key.to_string());

        debug!("Watching [{}] with ticket {}", key, ticket);
        Ok((ticket, current))
    }

    /// Replace the value of `key` and notify its observers in subscription order.
    ///
    /// Unknown keys and disposed stores are ignored.
    pub fn update(&self, key: &str, value: Value) {
        let mut value = Some(value);
        self.scheduler.run(&mut || {
            if let Some(value) = value.take() {
                self.publish(key, value);
            }
        });
    }

    fn publish(&self, key: &str, value: Value) {
        let observers: Vec<(u64, Observer)> = {
            let inner = self.lock();
            if inner.disposed {
                debug!("Ignoring update of [{}] on disposed store", key);
                return;
            }
            let Some(record) = inner.records.get(key) else {
                debug!("Ignoring update of unknown key [{}]", key);
                return;
            };
            record.sender.send_replace(value.clone());
            record
                .observers
                .iter()
                .map(|(tick, observer)| (*tick, Arc::clone(observer)))
                .collect()
        };

        for (tick, observer) in observers {
            // An earlier observer may have unsubscribed this one or disposed the store.
            if !self.is_live(tick) {
                continue;
            }
            observer(&value);
        }
    }

    fn is_live(&self, tick: u64) -> bool {
        let inner = self.lock();
        !inner.disposed && inner.live.contains_key(&tick)
    }

    /// Release one subscription. Unknown, released and foreign tickets are ignored.
    pub fn unsubscribe(&self, ticket: &SubscriptionTicket) {
        if ticket.store_id != self.id {
            debug!("Ignoring ticket {} issued by another store", ticket);
            return;
        }

        let mut inner = self.lock();
        let Some(key) = inner.live.remove(&ticket.tick) else {
            return;
        };
        if let Some(record) = inner.records.get_mut(&key) {
            record.observers.retain(|(tick, _)| *tick != ticket.tick);
        }
    }

    /// Release every live subscription. Safe to call more than once.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }

        let released = inner.live.len();
        for record in inner.records.values_mut() {
            record.observers.clear();
        }
        inner.live.clear();
        inner.disposed = true;

        info!("Value store disposed, released {} subscriptions", released);
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Current value of `key`, if declared.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.lock()
            .records
            .get(key)
            .map(|record| record.sender.borrow().clone())
    }

    /// Stream of the latest value of `key` for reactive consumers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKey`] if `key` was not declared.
    #[track_caller]
    pub fn value_stream(&self, key: &str) -> Result<watch::Receiver<Value>, StoreError> {
        self.lock()
            .records
            .get(key)
            .map(|record| record.sender.subscribe())
            .ok_or_else(|| StoreError::UnknownKey {
                key: key.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().records.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().records.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live observers on `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.lock()
            .records
            .get(key)
            .map_or(0, |record| record.observers.len())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Observers never run under the lock, so a poisoned guard still holds consistent records.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
