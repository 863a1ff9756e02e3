//! Per-unit-of-work context storage.
//!
//! # Responsibility
//! - Key session and transaction slots by the unit of work that owns them.
//! - Back request-bound work with the request's own item bag and other work
//!   (tests, background jobs) with a process-wide store keyed by call scope.
//!
//! # Invariants
//! - One unit of work never observes another unit's slots.
//! - Slots live until cleared by their owner or until the scope ends.
//! - Expiry and cleanup belong to the session manager, not the store.

use log::{debug, warn};
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

type Slot = Box<dyn Any + Send>;
type ItemMap = HashMap<&'static str, Slot>;

static CALL_SCOPE_ITEMS: Lazy<Mutex<HashMap<Uuid, ItemMap>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed slot storage for one unit of work.
pub trait ContextStore {
    /// Identity of the unit of work owning the slots.
    fn unit_id(&self) -> Uuid;

    /// Runs `f` with exclusive access to this unit's item map.
    fn with_items<R>(&self, f: impl FnOnce(&mut ItemMap) -> R) -> R;

    fn get<V: Clone + 'static>(&self, key: &'static str) -> Option<V> {
        self.with_items(|items| {
            items
                .get(key)
                .and_then(|slot| slot.downcast_ref::<V>())
                .cloned()
        })
    }

    /// Stores `value` under `key`; `None` clears the slot.
    fn set<V: Send + 'static>(&self, key: &'static str, value: Option<V>) {
        self.with_items(|items| match value {
            Some(value) => {
                items.insert(key, Box::new(value));
            }
            None => {
                items.remove(key);
            }
        });
    }
}

/// Item bag owned by one inbound request.
///
/// The host creates one per request and drops it when the request ends.
#[derive(Debug)]
pub struct RequestItems {
    id: Uuid,
    items: Mutex<ItemMap>,
}

impl RequestItems {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RequestItems {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore for RequestItems {
    fn unit_id(&self) -> Uuid {
        self.id
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut ItemMap) -> R) -> R {
        f(&mut lock(&self.items))
    }
}

/// Unit of work for callers outside a request.
///
/// Slots live in a process-wide store keyed by the scope id and are removed
/// when the scope is dropped.
#[derive(Debug)]
pub struct CallScope {
    id: Uuid,
}

impl CallScope {
    pub fn begin() -> Self {
        let id = Uuid::new_v4();
        debug!("event=call_scope_begin module=context status=ok scope={id}");
        Self { id }
    }
}

impl ContextStore for CallScope {
    fn unit_id(&self) -> Uuid {
        self.id
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut ItemMap) -> R) -> R {
        let mut scopes = lock(&CALL_SCOPE_ITEMS);
        f(scopes.entry(self.id).or_default())
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        let remaining = lock(&CALL_SCOPE_ITEMS).remove(&self.id);
        let leaked = remaining.map_or(0, |items| items.len());
        if leaked > 0 {
            warn!(
                "event=call_scope_end module=context status=error scope={} leaked_slots={}",
                self.id, leaked
            );
        } else {
            debug!(
                "event=call_scope_end module=context status=ok scope={}",
                self.id
            );
        }
    }
}

/// Handle to the unit of work a manager call operates on.
#[derive(Debug, Clone, Copy)]
pub enum WorkContext<'a> {
    Request(&'a RequestItems),
    Call(&'a CallScope),
}

impl<'a> WorkContext<'a> {
    pub fn request(items: &'a RequestItems) -> Self {
        Self::Request(items)
    }

    pub fn call(scope: &'a CallScope) -> Self {
        Self::Call(scope)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Call(_) => "call",
        }
    }
}

impl ContextStore for WorkContext<'_> {
    fn unit_id(&self) -> Uuid {
        match self {
            Self::Request(items) => items.unit_id(),
            Self::Call(scope) => scope.unit_id(),
        }
    }

    fn with_items<R>(&self, f: impl FnOnce(&mut ItemMap) -> R) -> R {
        match self {
            Self::Request(items) => items.with_items(f),
            Self::Call(scope) => scope.with_items(f),
        }
    }
}
