//! The dispatch loop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace, warn, Instrument};

use crate::action::{ActionId, ActionLike, Envelope};
use crate::config::MiddlemanConfig;
use crate::error::{MiddlemanError, MiddlemanResult};
use crate::observer::{AsyncContext, AsyncObserver, Dispatcher, Reentry, SyncContext, SyncObserver};
use crate::registry::{ActionTypes, ObserverRegistry, Observers};
use crate::scheduler::PendingQueue;
use crate::traits::StateContainer;

/// Interposer between producers and a state container.
///
/// Observe → release → drain. Actions dispatched by observers reach the
/// container before the action that triggered them; top-level actions that
/// arrive mid-cycle wait their turn.
pub struct Middleman<A: ActionLike, C: StateContainer<A>> {
    inner: Arc<Inner<A, C>>,
}

impl<A: ActionLike, C: StateContainer<A>> Clone for Middleman<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Snapshot of the scheduler's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStats {
    pub queued: usize,
    pub postponed: usize,
    pub suspended: usize,
}

impl<A: ActionLike, C: StateContainer<A>> Middleman<A, C> {
    pub fn new(container: C) -> Self {
        Self::with_config(container, MiddlemanConfig::default())
    }

    pub fn with_config(container: C, config: MiddlemanConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                container,
                registry: ObserverRegistry::new(),
                queue: Mutex::new(PendingQueue::new()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Submit a top-level action. Resolves once the action has been handled;
    /// an observer failure anywhere beneath it comes back here.
    ///
    /// Observers must dispatch through their context instead: a top-level
    /// dispatch from inside an observer waits for the very cycle it is part of.
    pub async fn dispatch(&self, action: A) -> MiddlemanResult<()> {
        let envelope = Envelope::top_level(self.inner.next_id(), action);
        self.inner.handle(envelope).await
    }

    // --- registration -----------------------------------------------------

    /// Register synchronous observers for one or many types.
    pub fn on(
        &self,
        types: impl Into<ActionTypes>,
        observers: impl Into<Observers<SyncObserver<A, C::State>>>,
    ) {
        self.inner.registry.register(types, observers, false);
    }

    /// Register synchronous observers that fire on the first matching action only.
    pub fn once(
        &self,
        types: impl Into<ActionTypes>,
        observers: impl Into<Observers<SyncObserver<A, C::State>>>,
    ) {
        self.inner.registry.register(types, observers, true);
    }

    /// Register asynchronous observers, awaited one after another.
    pub fn on_async(
        &self,
        types: impl Into<ActionTypes>,
        observers: impl Into<Observers<AsyncObserver<A, C::State>>>,
    ) {
        self.inner.registry.register_async(types, observers);
    }

    pub fn off(&self, types: impl Into<ActionTypes>) {
        self.inner.registry.deregister(types);
    }

    pub fn remove_all(&self) {
        self.inner.registry.deregister_all();
    }

    pub fn has_observers(&self, action_type: &str) -> bool {
        self.inner.registry.has_observers(action_type)
    }

    pub fn types_with_observers(&self) -> HashSet<String> {
        self.inner.registry.types_with_observers()
    }

    pub fn registry(&self) -> &ObserverRegistry<A, C::State> {
        &self.inner.registry
    }

    // --- accessors --------------------------------------------------------

    pub fn container(&self) -> &C {
        &self.inner.container
    }

    pub fn config(&self) -> &MiddlemanConfig {
        &self.inner.config
    }

    pub fn pending(&self) -> PendingStats {
        let queue = self.inner.queue.lock();
        PendingStats {
            queued: queue.len(),
            postponed: queue.postponed_len(),
            suspended: queue.suspended(),
        }
    }

    /// Nothing queued, postponed or suspended.
    pub fn is_idle(&self) -> bool {
        self.inner.queue.lock().is_idle()
    }
}

// ---------------------------------------------------------------------------
// Inner — shared by the middleman and every dispatcher it hands out
// ---------------------------------------------------------------------------

struct Inner<A: ActionLike, C: StateContainer<A>> {
    container: C,
    registry: ObserverRegistry<A, C::State>,
    queue: Mutex<PendingQueue<A>>,
    next_id: AtomicU64,
    config: MiddlemanConfig,
}

impl<A: ActionLike, C: StateContainer<A>> Inner<A, C> {
    fn next_id(&self) -> ActionId {
        ActionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn handle(self: &Arc<Self>, envelope: Envelope<A>) -> BoxFuture<'static, MiddlemanResult<()>> {
        let span = tracing::debug_span!(
            "middleman.cycle",
            name = %self.config.name,
            action_type = %envelope.action_type(),
            id = %envelope.id,
            reentrant = envelope.is_reentrant,
            async_origin = envelope.is_async_origin,
        );
        Arc::clone(self).run(envelope).instrument(span).boxed()
    }

    /// One handling cycle: admission, enqueue, observers, release.
    async fn run(self: Arc<Self>, envelope: Envelope<A>) -> MiddlemanResult<()> {
        let id = envelope.id;
        let mut cycle = CycleGuard {
            inner: &*self,
            id,
            armed: true,
        };

        let admission = {
            let mut queue = self.queue.lock();
            if queue.must_postpone(&envelope) {
                Some(queue.postpone(envelope.clone()))
            } else {
                queue.enqueue(envelope.clone());
                None
            }
        };

        if let Some(admitted) = admission {
            debug!("Postponed until the current cycle drains");
            // The sender is only dropped unsent by this cycle's own withdraw.
            let _ = admitted.await;
            debug!("Admitted");
        }

        let outcome = self.observe(&envelope).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Observer failed, action withdrawn");
        }

        {
            let mut queue = self.queue.lock();
            if outcome.is_ok() {
                queue.settle(id);
            } else {
                queue.withdraw(id);
            }
            self.release(&mut queue);
        }
        cycle.armed = false;
        outcome
    }

    /// Run A's async observers in order, then its sync observers, all with
    /// one state snapshot.
    async fn observe(self: &Arc<Self>, envelope: &Envelope<A>) -> MiddlemanResult<()> {
        let action_type = envelope.action_type();
        let Some(observers) = self.registry.select(action_type) else {
            trace!("No observers, passing through");
            return Ok(());
        };
        let current_state = self.container.current_state();

        if !observers.asynchronous.is_empty() {
            let _suspension = Suspension::new(self, observers.asynchronous.len());
            let target: Arc<dyn Reentry<A>> = Arc::clone(self) as Arc<dyn Reentry<A>>;
            for observer in &observers.asynchronous {
                let ctx = AsyncContext::new(
                    envelope.action.clone(),
                    current_state.clone(),
                    Dispatcher::new(Arc::clone(&target), envelope.id, true),
                );
                self.call_async(observer, ctx, action_type).await?;
            }
        }

        let ctx = SyncContext::new(envelope.action.clone(), current_state);
        for (observer, once) in &observers.sync {
            if *once && !self.registry.claim_once(action_type, observer) {
                trace!("Once observer already claimed, skipping");
                continue;
            }
            observer
                .call(&ctx)
                .map_err(|source| MiddlemanError::Observer {
                    action_type: action_type.to_string(),
                    source,
                })?;
            for action in ctx.take_dispatched() {
                let nested = Envelope::reentrant(self.next_id(), action, envelope.id, false);
                self.handle(nested).await?;
            }
        }
        Ok(())
    }

    async fn call_async(
        &self,
        observer: &AsyncObserver<A, C::State>,
        ctx: AsyncContext<A, C::State>,
        action_type: &str,
    ) -> MiddlemanResult<()> {
        let fut = observer.call(ctx);
        let result = match self.config.async_observer_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(MiddlemanError::ObserverTimeout {
                        action_type: action_type.to_string(),
                        timeout,
                    })
                }
            },
            None => fut.await,
        };
        result.map_err(|source| MiddlemanError::Observer {
            action_type: action_type.to_string(),
            source,
        })
    }

    /// Forward the settled prefix (queue still locked) and log any admission.
    fn release(&self, queue: &mut PendingQueue<A>) {
        let release = queue.release();
        for envelope in release.forwarded {
            debug!(id = %envelope.id, action_type = %envelope.action_type(), "Forwarding");
            self.container.forward(envelope.action);
        }
        if let Some(id) = release.admitted {
            debug!(%id, "Admitting postponed action");
        }
    }
}

impl<A: ActionLike, C: StateContainer<A>> Reentry<A> for Inner<A, C> {
    fn reenter(
        self: Arc<Self>,
        action: A,
        trigger: ActionId,
        async_origin: bool,
    ) -> BoxFuture<'static, MiddlemanResult<()>> {
        let envelope = Envelope::reentrant(self.next_id(), action, trigger, async_origin);
        self.handle(envelope)
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Holds a share of the suspension counter for an async observer batch.
/// Dropping it resumes and releases, so an abandoned batch cannot leave the
/// queue suspended.
struct Suspension<'a, A: ActionLike, C: StateContainer<A>> {
    inner: &'a Inner<A, C>,
    count: usize,
}

impl<'a, A: ActionLike, C: StateContainer<A>> Suspension<'a, A, C> {
    fn new(inner: &'a Inner<A, C>, count: usize) -> Self {
        inner.queue.lock().suspend(count);
        Self { inner, count }
    }
}

impl<A: ActionLike, C: StateContainer<A>> Drop for Suspension<'_, A, C> {
    fn drop(&mut self) {
        let mut queue = self.inner.queue.lock();
        queue.resume(self.count);
        self.inner.release(&mut queue);
    }
}

/// Withdraws a cycle's action if its future is dropped before finishing,
/// then releases whatever that unblocks.
struct CycleGuard<'a, A: ActionLike, C: StateContainer<A>> {
    inner: &'a Inner<A, C>,
    id: ActionId,
    armed: bool,
}

impl<A: ActionLike, C: StateContainer<A>> Drop for CycleGuard<'_, A, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut queue = self.inner.queue.lock();
        if queue.withdraw(self.id) {
            debug!(id = %self.id, "Cycle dropped, action withdrawn");
        }
        self.inner.release(&mut queue);
    }
}
