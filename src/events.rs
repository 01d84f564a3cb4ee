//! Structured event hook.
//!
//! Every request that reaches a terminal outcome reports one event to the
//! client's [`EventSink`]: a level, a dotted event name and a map of
//! context fields. Host applications install their own sink to redirect
//! these; by default they are printed as JSON lines on stdout.

use log::Level;
use serde_json::{Map, Value, json};

/// Context fields attached to an event.
pub type Fields = Map<String, Value>;

pub trait EventSink: Send + Sync {
    fn log(&self, level: Level, event: &str, fields: &Fields);
}

/// Prints `{"level": ..., "msg": ..., "log_kwargs": {...}}` lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn render(level: Level, event: &str, fields: &Fields) -> String {
        json!({
            "level": level.as_str().to_lowercase(),
            "msg": event,
            "log_kwargs": fields,
        })
        .to_string()
    }
}

impl EventSink for StdoutSink {
    fn log(&self, level: Level, event: &str, fields: &Fields) {
        println!("{}", Self::render(level, event, fields));
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub const TARGET: &'static str = "pyroprompts::events";
}

impl EventSink for LogSink {
    fn log(&self, level: Level, event: &str, fields: &Fields) {
        log::log!(target: Self::TARGET, level, "{} {}", event, Value::Object(fields.clone()));
    }
}
