// File: src/session.rs
// Purpose: Observable session value shared by the navigator and the application

use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tracing::trace;

/// Holds the session and notifies subscribers on every write
///
/// Writes never fail, even with no subscriber attached.
#[derive(Debug)]
pub struct SessionStore {
    sender: watch::Sender<JsonValue>,
}

impl SessionStore {
    pub fn new(initial: JsonValue) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Current value
    pub fn get(&self) -> JsonValue {
        self.sender.borrow().clone()
    }

    pub fn set(&self, value: JsonValue) {
        trace!("Session replaced");
        self.sender.send_replace(value);
    }

    /// Modifies the value in place and notifies subscribers
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut JsonValue),
    {
        trace!("Session updated");
        self.sender.send_modify(f);
    }

    /// Receiver that only sees writes made after this call
    pub fn subscribe(&self) -> watch::Receiver<JsonValue> {
        self.sender.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(JsonValue::Null)
    }
}
