use serde_json::{json, Value};

use crate::core::error::ChatError;
use crate::core::ports::emitter::EmitterPort;
use crate::core::ports::store::Message;

use super::controller::ControllerState;

pub(super) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(super) fn emit_state(
    emitter: &dyn EmitterPort,
    state: ControllerState,
    chat_id: Option<&str>,
) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert("state".to_string(), json!(state.as_str()));
    payload.insert("ts".to_string(), json!(now_iso()));
    if let Some(chat_id) = chat_id {
        payload.insert("chat_id".to_string(), json!(chat_id));
    }

    let value = Value::Object(payload);
    emitter.emit("chat:state", &value);
    value
}

pub(super) fn emit_message(emitter: &dyn EmitterPort, message: &Message) {
    emitter.emit(
        "chat:message",
        &json!({
            "id": message.id,
            "chat_id": message.chat_id,
            "text": message.text,
            "sent": message.sent,
            "ts": now_iso(),
        }),
    );
}

pub(super) fn emit_error(emitter: &dyn EmitterPort, error: &ChatError) {
    emitter.emit(
        "chat:error",
        &json!({
            "kind": error.kind(),
            "message": error.to_string(),
            "ts": now_iso(),
        }),
    );
}
