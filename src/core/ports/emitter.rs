use serde_json::Value;

/// Fire-and-forget notifications for whatever surface is showing the chat.
pub trait EmitterPort: Send + Sync {
    fn emit(&self, channel: &str, payload: &Value);
}
