//! Structured event logging over the `log` facade
//!
//! - One record = one event
//! - Fields rendered as a JSON object with deterministic (sorted) key order
//! - The host application picks the sink by installing a `log` backend

use super::events::Event;

/// Log target used for every engine record
pub const TARGET: &str = "querydefer";

/// Structured event logger
pub struct Logger;

impl Logger {
    /// Emits `event` at its default level
    pub fn emit(event: Event, fields: &[(&str, &str)]) {
        Self::emit_at(event.level(), event, fields);
    }

    /// Emits `event` at an explicit level
    pub fn emit_at(level: log::Level, event: Event, fields: &[(&str, &str)]) {
        if log::log_enabled!(target: TARGET, level) {
            log::log!(target: TARGET, level, "{}", Self::render(event, fields));
        }
    }

    /// Renders an event line: `{"event":"...","k":"v",...}`
    pub fn render(event: Event, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        // "event" always first, then fields alphabetically
        let mut line = String::with_capacity(64);
        line.push_str("{\"event\":");
        line.push_str(&json_string(event.as_str()));
        for (key, value) in sorted {
            line.push(',');
            line.push_str(&json_string(key));
            line.push(':');
            line.push_str(&json_string(value));
        }
        line.push('}');
        line
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}
