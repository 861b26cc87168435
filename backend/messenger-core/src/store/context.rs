use crate::contract::StateContract;
use crate::error::store::StoreError;
use crate::store::{SubscriptionTicket, ValueStore};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use serde_json::Value;
use tokio::sync::watch;

/// Tickets issued through one scoped view, released together.
#[derive(Default)]
pub(crate) struct Scope {
    tickets: Mutex<Vec<SubscriptionTicket>>,
}

impl Scope {
    fn record(&self, ticket: &SubscriptionTicket) {
        self.tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ticket.clone());
    }

    /// Unsubscribe every ticket recorded so far. Returns how many were recorded.
    pub(crate) fn release(&self, store: &ValueStore) -> usize {
        let tickets: Vec<SubscriptionTicket> = self
            .tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for ticket in &tickets {
            store.unsubscribe(ticket);
        }
        tickets.len()
    }
}

/// Capability set over a [`ValueStore`] handed to handlers and targets.
///
/// Reads, watches and updates; disposal stays with the owner of the store.
/// A scoped view also remembers the subscriptions made through it, so its
/// owner can release them without disposing the shared store.
#[derive(Clone)]
pub struct ContextHost {
    store: ValueStore,
    scope: Option<Arc<Scope>>,
}

impl ContextHost {
    pub(crate) fn new(store: ValueStore) -> Self {
        Self { store, scope: None }
    }

    pub(crate) fn scoped(store: ValueStore, scope: Arc<Scope>) -> Self {
        Self {
            store,
            scope: Some(scope),
        }
    }

    fn track(
        &self,
        watched: Result<SubscriptionTicket, StoreError>,
    ) -> Result<SubscriptionTicket, StoreError> {
        if let (Ok(ticket), Some(scope)) = (&watched, &self.scope) {
            scope.record(ticket);
        }
        watched
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.store.value(key)
    }

    #[track_caller]
    pub fn value_stream(&self, key: &str) -> Result<watch::Receiver<Value>, StoreError> {
        self.store.value_stream(key)
    }

    #[track_caller]
    pub fn watch<F>(&self, key: &str, observer: F) -> Result<SubscriptionTicket, StoreError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.track(self.store.watch(key, observer))
    }

    pub fn update(&self, key: &str, value: Value) {
        self.store.update(key, value)
    }

    pub fn unsubscribe(&self, ticket: &SubscriptionTicket) {
        self.store.unsubscribe(ticket)
    }

    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Per-key view, `None` if the key was never declared.
    pub fn slot(&self, key: &str) -> Option<Slot> {
        self.store.contains(key).then(|| Slot {
            context: self.clone(),
            key: key.to_string(),
        })
    }

    /// Decode the current value of a typed slot.
    #[track_caller]
    pub fn get<S: StateContract>(&self) -> Result<S::Value, StoreError> {
        let location = ErrorLocation::from(Location::caller());
        let value = self.store.value(S::KEY).ok_or_else(|| StoreError::UnknownKey {
            key: S::KEY.to_string(),
            location,
        })?;
        serde_json::from_value(value).map_err(|e| StoreError::Decode {
            key: S::KEY.to_string(),
            message: e.to_string(),
            location,
        })
    }

    /// Encode and publish a typed slot value.
    #[track_caller]
    pub fn set<S: StateContract>(&self, value: &S::Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(value).map_err(|e| StoreError::Encode {
            key: S::KEY.to_string(),
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        self.store.update(S::KEY, encoded);
        Ok(())
    }

    /// Watch a typed slot. Values that fail to decode are skipped with a warning.
    #[track_caller]
    pub fn watch_state<S, F>(&self, observer: F) -> Result<SubscriptionTicket, StoreError>
    where
        S: StateContract + 'static,
        F: Fn(S::Value) + Send + Sync + 'static,
    {
        self.track(self.store.watch(S::KEY, move |value| {
            match serde_json::from_value::<S::Value>(value.clone()) {
                Ok(decoded) => observer(decoded),
                Err(e) => warn!("Skipping undecodable value for [{}]: {}", S::KEY, e),
            }
        }))
    }
}

/// One key of a store: `value`, `value_stream`, `watch`, `update`.
#[derive(Clone)]
pub struct Slot {
    context: ContextHost,
    key: String,
}

impl Slot {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value. `Null` only if the slot was declared with `Null`.
    pub fn value(&self) -> Value {
        self.context.value(&self.key).unwrap_or(Value::Null)
    }

    #[track_caller]
    pub fn value_stream(&self) -> Result<watch::Receiver<Value>, StoreError> {
        self.context.value_stream(&self.key)
    }

    #[track_caller]
    pub fn watch<F>(&self, observer: F) -> Result<SubscriptionTicket, StoreError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.context.watch(&self.key, observer)
    }

    pub fn update(&self, value: Value) {
        self.context.update(&self.key, value)
    }
}
