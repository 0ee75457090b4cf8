//! Observer registry: action type → ordered sync and async observer lists.
//!
//! A type key exists iff at least one observer is registered for it, so
//! `has_observers` is a single hash lookup. Every mutation is visible to the
//! very next dispatch.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::action::ActionLike;
use crate::observer::{AsyncObserver, SyncObserver};

// ---------------------------------------------------------------------------
// Bulk arguments
// ---------------------------------------------------------------------------

/// One or many action types.
#[derive(Debug, Clone, Default)]
pub struct ActionTypes(Vec<String>);

impl ActionTypes {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for ActionTypes {
    fn from(t: &str) -> Self {
        Self(vec![t.to_string()])
    }
}

impl From<String> for ActionTypes {
    fn from(t: String) -> Self {
        Self(vec![t])
    }
}

impl From<&[&str]> for ActionTypes {
    fn from(ts: &[&str]) -> Self {
        Self(ts.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ActionTypes {
    fn from(ts: [&str; N]) -> Self {
        Self(ts.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Vec<&str>> for ActionTypes {
    fn from(ts: Vec<&str>) -> Self {
        Self(ts.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ActionTypes {
    fn from(ts: Vec<String>) -> Self {
        Self(ts)
    }
}

/// One or many observers of the same kind.
pub struct Observers<O>(Vec<O>);

impl<A, S> From<SyncObserver<A, S>> for Observers<SyncObserver<A, S>> {
    fn from(o: SyncObserver<A, S>) -> Self {
        Self(vec![o])
    }
}

impl<A, S> From<AsyncObserver<A, S>> for Observers<AsyncObserver<A, S>> {
    fn from(o: AsyncObserver<A, S>) -> Self {
        Self(vec![o])
    }
}

impl<O> From<Vec<O>> for Observers<O> {
    fn from(os: Vec<O>) -> Self {
        Self(os)
    }
}

impl<O, const N: usize> From<[O; N]> for Observers<O> {
    fn from(os: [O; N]) -> Self {
        Self(os.into())
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

struct Slot<O> {
    observer: O,
    once: bool,
}

struct Entry<A, S> {
    sync: Vec<Slot<SyncObserver<A, S>>>,
    asynchronous: Vec<AsyncObserver<A, S>>,
}

impl<A, S> Default for Entry<A, S> {
    fn default() -> Self {
        Self {
            sync: Vec::new(),
            asynchronous: Vec::new(),
        }
    }
}

impl<A, S> Entry<A, S> {
    fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asynchronous.is_empty()
    }

    fn len(&self) -> usize {
        self.sync.len() + self.asynchronous.len()
    }
}

/// Observers picked for one handling cycle, in registration order.
pub(crate) struct Selected<A, S> {
    /// Sync observers paired with their `once` flag.
    pub sync: Vec<(SyncObserver<A, S>, bool)>,
    pub asynchronous: Vec<AsyncObserver<A, S>>,
}

impl<A, S> Entry<A, S> {
    fn selected(&self) -> Selected<A, S> {
        Selected {
            sync: self
                .sync
                .iter()
                .map(|slot| (slot.observer.clone(), slot.once))
                .collect(),
            asynchronous: self.asynchronous.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ObserverRegistry
// ---------------------------------------------------------------------------

pub struct ObserverRegistry<A, S> {
    entries: RwLock<HashMap<String, Entry<A, S>>>,
}

impl<A, S> Default for ObserverRegistry<A, S> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<A: ActionLike, S: Send + Sync + 'static> ObserverRegistry<A, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add each observer to each type's synchronous list. An observer already
    /// present for a type keeps its single entry and position.
    pub fn register(
        &self,
        types: impl Into<ActionTypes>,
        observers: impl Into<Observers<SyncObserver<A, S>>>,
        once: bool,
    ) {
        let types = types.into();
        let observers = observers.into();
        let mut entries = self.entries.write();
        for action_type in types.iter() {
            let entry = entries.entry(action_type.to_string()).or_default();
            for observer in &observers.0 {
                if entry.sync.iter().any(|slot| slot.observer.same(observer)) {
                    continue;
                }
                entry.sync.push(Slot {
                    observer: observer.clone(),
                    once,
                });
            }
        }
    }

    /// Add each observer to each type's asynchronous list, same dedup rule.
    pub fn register_async(
        &self,
        types: impl Into<ActionTypes>,
        observers: impl Into<Observers<AsyncObserver<A, S>>>,
    ) {
        let types = types.into();
        let observers = observers.into();
        let mut entries = self.entries.write();
        for action_type in types.iter() {
            let entry = entries.entry(action_type.to_string()).or_default();
            for observer in &observers.0 {
                if entry.asynchronous.iter().any(|o| o.same(observer)) {
                    continue;
                }
                entry.asynchronous.push(observer.clone());
            }
        }
    }

    /// Remove every observer for the given types. Unknown types are ignored.
    pub fn deregister(&self, types: impl Into<ActionTypes>) {
        let types = types.into();
        let mut entries = self.entries.write();
        for action_type in types.iter() {
            entries.remove(action_type);
        }
    }

    pub fn deregister_all(&self) {
        self.entries.write().clear();
    }

    pub fn has_observers(&self, action_type: &str) -> bool {
        self.entries.read().contains_key(action_type)
    }

    pub fn types_with_observers(&self) -> HashSet<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of observers (sync and async) registered for a type.
    pub fn observer_count(&self, action_type: &str) -> usize {
        self.entries.read().get(action_type).map_or(0, Entry::len)
    }

    /// Pick the observers for one cycle. `once` observers stay registered
    /// until `claim_once` takes them.
    pub(crate) fn select(&self, action_type: &str) -> Option<Selected<A, S>> {
        self.entries.read().get(action_type).map(Entry::selected)
    }

    /// Remove a `once` observer right before it is invoked. Only the caller
    /// that gets `true` may invoke it; `false` means another cycle already
    /// claimed it or it was deregistered.
    pub(crate) fn claim_once(&self, action_type: &str, observer: &SyncObserver<A, S>) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(action_type) else {
            return false;
        };
        let Some(index) = entry
            .sync
            .iter()
            .position(|slot| slot.once && slot.observer.same(observer))
        else {
            return false;
        };
        entry.sync.remove(index);
        if entry.is_empty() {
            entries.remove(action_type);
        }
        true
    }
}
