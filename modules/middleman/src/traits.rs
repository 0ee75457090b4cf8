//! Boundary traits towards the downstream state container.

use std::sync::Arc;

use crate::action::ActionLike;

/// The downstream consumer: applies forwarded actions and exposes the
/// current state.
///
/// `forward` is called with the middleman's queue locked. It must not
/// dispatch back into the middleman.
pub trait StateContainer<A: ActionLike>: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    /// Read-only snapshot, taken once per handling cycle.
    fn current_state(&self) -> Self::State;

    /// Apply this action via the normal reducer path.
    fn forward(&self, action: A);
}

/// Pure state updates. No I/O, no side effects.
pub trait Reducer<A, S>: Send + Sync + 'static {
    fn reduce(&self, state: &mut S, action: &A);
}

impl<A, S, F> Reducer<A, S> for F
where
    F: Fn(&mut S, &A) + Send + Sync + 'static,
{
    fn reduce(&self, state: &mut S, action: &A) {
        self(state, action)
    }
}

// ---------------------------------------------------------------------------
// Arc<C> blanket — lets callers keep a handle on the container for reads
// ---------------------------------------------------------------------------

impl<A: ActionLike, C: StateContainer<A> + ?Sized> StateContainer<A> for Arc<C> {
    type State = C::State;

    fn current_state(&self) -> Self::State {
        (**self).current_state()
    }

    fn forward(&self, action: A) {
        (**self).forward(action)
    }
}
