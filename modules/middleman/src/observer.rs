//! Observer handles and the contexts they receive.
//!
//! An observer gets `{action, current_state, dispatch}`. Actions dispatched
//! through the context are applied before the action being observed.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::action::{ActionId, ActionLike};
use crate::error::MiddlemanResult;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// Context handed to synchronous observers.
///
/// `dispatch` records the action; the middleman handles it as soon as the
/// observer returns, before the next observer runs.
pub struct SyncContext<A, S> {
    pub action: A,
    pub current_state: S,
    dispatched: Mutex<Vec<A>>,
}

impl<A: ActionLike, S> SyncContext<A, S> {
    pub(crate) fn new(action: A, current_state: S) -> Self {
        Self {
            action,
            current_state,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch(&self, action: A) {
        self.dispatched.lock().push(action);
    }

    pub(crate) fn take_dispatched(&self) -> Vec<A> {
        std::mem::take(&mut *self.dispatched.lock())
    }
}

/// Context handed to asynchronous observers. Owned, so the observer's future
/// can hold it across await points.
#[derive(Clone)]
pub struct AsyncContext<A, S> {
    pub action: A,
    pub current_state: S,
    dispatcher: Dispatcher<A>,
}

impl<A: ActionLike, S> AsyncContext<A, S> {
    pub(crate) fn new(action: A, current_state: S, dispatcher: Dispatcher<A>) -> Self {
        Self {
            action,
            current_state,
            dispatcher,
        }
    }

    /// Dispatch an action ahead of the one being observed. Resolves once the
    /// nested action's own observers have finished; errors from them surface
    /// here.
    pub async fn dispatch(&self, action: A) -> MiddlemanResult<()> {
        self.dispatcher.dispatch(action).await
    }

    /// A cloneable handle for dispatching from elsewhere, e.g. a spawned task.
    pub fn dispatcher(&self) -> Dispatcher<A> {
        self.dispatcher.clone()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher — the re-entrant entry point
// ---------------------------------------------------------------------------

pub(crate) trait Reentry<A>: Send + Sync {
    fn reenter(
        self: Arc<Self>,
        action: A,
        trigger: ActionId,
        async_origin: bool,
    ) -> BoxFuture<'static, MiddlemanResult<()>>;
}

/// Dispatches actions tagged as issued during the handling of `trigger`.
///
/// If the trigger has already been forwarded when the dispatch lands, the
/// new action goes to the front of the pending queue.
pub struct Dispatcher<A> {
    target: Arc<dyn Reentry<A>>,
    trigger: ActionId,
    async_origin: bool,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            trigger: self.trigger,
            async_origin: self.async_origin,
        }
    }
}

impl<A: ActionLike> Dispatcher<A> {
    pub(crate) fn new(target: Arc<dyn Reentry<A>>, trigger: ActionId, async_origin: bool) -> Self {
        Self {
            target,
            trigger,
            async_origin,
        }
    }

    pub async fn dispatch(&self, action: A) -> MiddlemanResult<()> {
        Arc::clone(&self.target)
            .reenter(action, self.trigger, self.async_origin)
            .await
    }

    pub fn trigger(&self) -> ActionId {
        self.trigger
    }
}

// ---------------------------------------------------------------------------
// Observer handles
// ---------------------------------------------------------------------------

type SyncFn<A, S> = dyn Fn(&SyncContext<A, S>) -> anyhow::Result<()> + Send + Sync;
type AsyncFn<A, S> = dyn Fn(AsyncContext<A, S>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Synchronous observer. Clones share identity: registering a clone of an
/// already registered observer for the same type is a no-op.
pub struct SyncObserver<A, S>(Arc<SyncFn<A, S>>);

impl<A, S> Clone for SyncObserver<A, S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A: ActionLike, S> SyncObserver<A, S> {
    pub fn new(f: impl Fn(&SyncContext<A, S>) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, ctx: &SyncContext<A, S>) -> anyhow::Result<()> {
        (self.0)(ctx)
    }

    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Struct-based asynchronous observer.
#[async_trait]
pub trait AsyncHandler<A: ActionLike, S: Send + Sync + 'static>: Send + Sync + 'static {
    async fn observe(&self, ctx: AsyncContext<A, S>) -> anyhow::Result<()>;
}

/// Asynchronous observer. Awaited to completion before the handling cycle
/// moves on; same identity rules as [`SyncObserver`].
pub struct AsyncObserver<A, S>(Arc<AsyncFn<A, S>>);

impl<A, S> Clone for AsyncObserver<A, S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A: ActionLike, S: Send + Sync + 'static> AsyncObserver<A, S> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(AsyncContext<A, S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn from_handler<H: AsyncHandler<A, S>>(handler: Arc<H>) -> Self {
        Self(Arc::new(move |ctx| {
            let handler = Arc::clone(&handler);
            async move { handler.observe(ctx).await }.boxed()
        }))
    }

    pub(crate) fn call(&self, ctx: AsyncContext<A, S>) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.0)(ctx)
    }

    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
