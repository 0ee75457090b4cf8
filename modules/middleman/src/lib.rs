//! Ordered action interposer.
//!
//! Sits between an action producer and a state container. Observers
//! registered per action type run before an action is forwarded; anything
//! they dispatch is applied before the action that triggered it. While an
//! asynchronous observer is in flight, nothing is forwarded and new
//! top-level actions are held back until the current cycle drains.
//!
//! Consumers provide a `StateContainer` (or use the reducer-backed `Store`)
//! and register `SyncObserver`s / `AsyncObserver`s on a `Middleman`.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod registry;
mod scheduler;
pub mod store;
pub mod traits;

pub use action::{Action, ActionId, ActionLike};
pub use config::MiddlemanConfig;
pub use engine::{Middleman, PendingStats};
pub use error::{MiddlemanError, MiddlemanResult};
pub use observer::{AsyncContext, AsyncHandler, AsyncObserver, Dispatcher, SyncContext, SyncObserver};
pub use registry::{ActionTypes, ObserverRegistry, Observers};
pub use store::Store;
pub use traits::{Reducer, StateContainer};
