use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded event of a chat stream.
///
/// The payload is whatever JSON the server put into the frame; the client
/// does not look inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatEvent(Value);

impl ChatEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl Deref for ChatEvent {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Value> for ChatEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<ChatEvent> for Value {
    fn from(event: ChatEvent) -> Self {
        event.0
    }
}
