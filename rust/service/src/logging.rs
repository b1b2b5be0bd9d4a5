// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Injected logging capability.
//!
//! The orchestrator and remote client log through a [`Logger`] handed to
//! their constructors rather than a process-wide subscriber, so tests can
//! assert on emitted events. [`TracingLogger`] forwards to `tracing`.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A message with structured key/value fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: Cow<'static, str>,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEvent {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Attach a structured field.
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    /// Value of the first field named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Logging capability passed explicitly to service components.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, event: LogEvent);

    fn debug(&self, event: LogEvent) {
        self.log(LogLevel::Debug, event);
    }

    fn info(&self, event: LogEvent) {
        self.log(LogLevel::Info, event);
    }

    fn warn(&self, event: LogEvent) {
        self.log(LogLevel::Warn, event);
    }

    fn error(&self, event: LogEvent) {
        self.log(LogLevel::Error, event);
    }
}

/// Forwards events to the `tracing` subscriber installed by the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn shared() -> Arc<dyn Logger> {
        Arc::new(Self)
    }
}

/// Keys emitted as first-class `tracing` fields by [`TracingLogger`].
const PROMOTED_FIELDS: [&str; 6] = [
    "service",
    "operation",
    "duration_ms",
    "error_code",
    "attempt",
    "reason",
];

impl LogEvent {
    /// Fields without a dedicated `tracing` key, as `k=v` pairs.
    fn remaining_fields(&self) -> Option<String> {
        let rest = self
            .fields
            .iter()
            .filter(|(k, _)| !PROMOTED_FIELDS.contains(k))
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();
        (!rest.is_empty()).then(|| rest.join(" "))
    }

    fn number(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

macro_rules! emit {
    ($level:expr, $event:expr) => {{
        let event = $event;
        let rest = event.remaining_fields();
        tracing::event!(
            target: "ifc_ingest",
            $level,
            service = event.get("service"),
            operation = event.get("operation"),
            duration_ms = event.number("duration_ms"),
            error_code = event.get("error_code"),
            attempt = event.number("attempt"),
            reason = event.get("reason"),
            fields = rest.as_deref(),
            "{}",
            event.message
        )
    }};
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, event: LogEvent) {
        match level {
            LogLevel::Debug => emit!(tracing::Level::DEBUG, &event),
            LogLevel::Info => emit!(tracing::Level::INFO, &event),
            LogLevel::Warn => emit!(tracing::Level::WARN, &event),
            LogLevel::Error => emit!(tracing::Level::ERROR, &event),
        }
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event: LogEvent,
}

/// In-memory logger that keeps every event, for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all events logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Events whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|r| r.event.message.contains(needle))
            .cloned()
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        !self.find(needle).is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, event: LogEvent) {
        self.lock().push(LogRecord { level, event });
    }
}
