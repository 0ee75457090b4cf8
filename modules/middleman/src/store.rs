//! In-memory state container.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::ActionLike;
use crate::traits::{Reducer, StateContainer};

type Subscriber<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Reducer-backed store. Every forwarded action is reduced into the state,
/// then subscribers are notified with the new state.
pub struct Store<A, S, R> {
    state: Mutex<S>,
    reducer: R,
    subscribers: Mutex<Vec<Subscriber<S>>>,
    _phantom: PhantomData<fn(A)>,
}

impl<A, S, R> Store<A, S, R>
where
    A: ActionLike,
    S: Clone + Send + Sync + 'static,
    R: Reducer<A, S>,
{
    pub fn new(initial: S, reducer: R) -> Self {
        Self {
            state: Mutex::new(initial),
            reducer,
            subscribers: Mutex::new(Vec::new()),
            _phantom: PhantomData,
        }
    }

    /// Register a listener called after every applied action.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) {
        self.subscribers.lock().push(Arc::new(listener));
    }

    pub fn state(&self) -> S {
        self.state.lock().clone()
    }
}

impl<A, S, R> StateContainer<A> for Store<A, S, R>
where
    A: ActionLike,
    S: Clone + Send + Sync + 'static,
    R: Reducer<A, S>,
{
    type State = S;

    fn current_state(&self) -> S {
        self.state()
    }

    fn forward(&self, action: A) {
        let next = {
            let mut state = self.state.lock();
            self.reducer.reduce(&mut state, &action);
            state.clone()
        };
        // Listeners run outside the state lock so they may read the store.
        let subscribers = self.subscribers.lock().clone();
        for subscriber in subscribers {
            subscriber(&next);
        }
    }
}
