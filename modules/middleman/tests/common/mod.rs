//! Shared fixtures: a reducer-backed store that records every applied action.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use middleman::{
    Action, AsyncContext, AsyncObserver, Middleman, MiddlemanConfig, Reducer, Store, SyncContext,
    SyncObserver,
};
use parking_lot::Mutex;

pub const ACTION0: &str = "ACTION0";
pub const ACTION1: &str = "ACTION1";
pub const INITIAL_DATA: &str = "this is some data";

// ---------------------------------------------------------------------------
// Test state + reducer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TestState {
    pub data: String,
    pub applied: Vec<Action>,
}

impl Default for TestState {
    fn default() -> Self {
        Self {
            data: INITIAL_DATA.to_string(),
            applied: Vec::new(),
        }
    }
}

impl TestState {
    /// Labels of applied actions, in application order.
    pub fn labels(&self) -> Vec<String> {
        self.applied.iter().map(label).collect()
    }
}

pub struct TestReducer;

impl Reducer<Action, TestState> for TestReducer {
    fn reduce(&self, state: &mut TestState, action: &Action) {
        if let Some(data) = action.get("data").and_then(|v| v.as_str()) {
            state.data = data.to_string();
        }
        state.applied.push(action.clone());
    }
}

pub type TestStore = Store<Action, TestState, TestReducer>;
pub type TestMiddleman = Middleman<Action, Arc<TestStore>>;
pub type Ctx = SyncContext<Action, TestState>;
pub type AsyncCtx = AsyncContext<Action, TestState>;
pub type Observer = SyncObserver<Action, TestState>;
pub type AsyncObs = AsyncObserver<Action, TestState>;

pub fn setup() -> (TestMiddleman, Arc<TestStore>) {
    setup_with(MiddlemanConfig::default())
}

pub fn setup_with(config: MiddlemanConfig) -> (TestMiddleman, Arc<TestStore>) {
    let store = Arc::new(Store::new(TestState::default(), TestReducer));
    (Middleman::with_config(Arc::clone(&store), config), store)
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

pub fn create_action(action_type: &str, data: &str) -> Action {
    Action::new(action_type).with("data", data)
}

/// An action whose label differs from its type, for ordering assertions.
pub fn labelled(action_type: &str, label: &str) -> Action {
    Action::new(action_type).with("label", label)
}

pub fn label(action: &Action) -> String {
    action
        .get("label")
        .and_then(|v| v.as_str())
        .unwrap_or(action.action_type.as_str())
        .to_string()
}

// ---------------------------------------------------------------------------
// Recording helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Sync observer that records the label of every action it sees.
pub fn spy(log: &Log) -> Observer {
    let log = log.clone();
    SyncObserver::new(move |ctx: &Ctx| {
        log.push(label(&ctx.action));
        Ok(())
    })
}
