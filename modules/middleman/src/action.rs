//! Actions and the scheduler's envelope around them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Actions carry a type string. Observers are keyed by it.
pub trait ActionLike: Clone + Send + Sync + 'static {
    fn action_type(&self) -> &str;
}

/// A generic action record: a `type` discriminator plus an arbitrary JSON payload.
///
/// Serializes flat, the payload fields sitting next to `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }
}

impl ActionLike for Action {
    fn action_type(&self) -> &str {
        &self.action_type
    }
}

/// Correlation id assigned to every action entering a middleman.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduler bookkeeping around an action. Never handed to observers or the
/// state container; they only ever see `action`.
#[derive(Debug, Clone)]
pub(crate) struct Envelope<A> {
    pub id: ActionId,
    pub action: A,
    pub issued_during_handling_of: Option<ActionId>,
    pub is_reentrant: bool,
    pub is_async_origin: bool,
}

impl<A: ActionLike> Envelope<A> {
    pub fn top_level(id: ActionId, action: A) -> Self {
        Self {
            id,
            action,
            issued_during_handling_of: None,
            is_reentrant: false,
            is_async_origin: false,
        }
    }

    pub fn reentrant(id: ActionId, action: A, trigger: ActionId, async_origin: bool) -> Self {
        Self {
            id,
            action,
            issued_during_handling_of: Some(trigger),
            is_reentrant: true,
            is_async_origin: async_origin,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.issued_during_handling_of.is_none()
    }

    pub fn action_type(&self) -> &str {
        self.action.action_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_serializes_with_flat_type_tag() {
        let action = Action::new("todo:add").with("text", "milk").with("done", false);
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!({ "type": "todo:add", "text": "milk", "done": false }));

        let back: Action = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
        assert_eq!(back.action_type(), "todo:add");
        assert_eq!(back.get("text"), Some(&json!("milk")));
    }

    #[test]
    fn action_without_type_is_rejected() {
        let result: Result<Action, _> = serde_json::from_value(json!({ "text": "milk" }));
        assert!(result.is_err());
    }

    #[test]
    fn envelope_tags_stay_off_the_action() {
        let action = Action::new("a").with("n", 1);
        let top = Envelope::top_level(ActionId(1), action.clone());
        let nested = Envelope::reentrant(ActionId(2), action.clone(), top.id, true);

        assert!(top.is_top_level());
        assert!(!nested.is_top_level());
        assert!(nested.is_reentrant && nested.is_async_origin);
        assert_eq!(nested.issued_during_handling_of, Some(ActionId(1)));
        // Equality of the carried action ignores scheduler bookkeeping.
        assert_eq!(top.action, nested.action);
    }
}
