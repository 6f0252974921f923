use serde_json::Value;

use crate::core::ports::emitter::EmitterPort;

/// Logs every event; errors are also shown on stderr.
pub struct ConsoleEmitter;

impl EmitterPort for ConsoleEmitter {
    fn emit(&self, channel: &str, payload: &Value) {
        log::debug!("{channel}: {payload}");
        if channel == "chat:error" {
            let message = payload
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            eprintln!("! {message}");
        }
    }
}
