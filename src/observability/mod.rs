//! Observability infrastructure for mail operations.
//!
//! Provides structured log entries, pluggable log sinks and send counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level name.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Structured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Message.
    pub message: String,
    /// Additional fields.
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Returns the value of a field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Formats the log entry as JSON.
    pub fn to_json(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert("level".to_string(), serde_json::Value::String(self.level.name().to_string()));
        obj.insert("message".to_string(), serde_json::Value::String(self.message.clone()));

        for (key, value) in &self.fields {
            obj.insert(key.clone(), serde_json::Value::String(value.clone()));
        }

        serde_json::to_string(&obj).unwrap_or_else(|_| self.message.clone())
    }
}

/// Destination for structured log entries.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    /// Writes one entry.
    fn write(&self, entry: &LogEntry);
}

/// Sink that forwards entries to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, entry: &LogEntry) {
        let fields = entry.to_json();
        match entry.level {
            LogLevel::Trace => tracing::trace!(target: "mail_profiles", %fields, "{}", entry.message),
            LogLevel::Debug => tracing::debug!(target: "mail_profiles", %fields, "{}", entry.message),
            LogLevel::Info => tracing::info!(target: "mail_profiles", %fields, "{}", entry.message),
            LogLevel::Warn => tracing::warn!(target: "mail_profiles", %fields, "{}", entry.message),
            LogLevel::Error => tracing::error!(target: "mail_profiles", %fields, "{}", entry.message),
        }
    }
}

/// Send counters.
#[derive(Debug, Default)]
pub struct MailMetrics {
    /// Messages accepted by the transport.
    pub sent: AtomicU64,
    /// Sends that failed before or during transport.
    pub failed: AtomicU64,
    /// Configuration dumps written for debug profiles.
    pub debug_dumps: AtomicU64,
}

impl MailMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful send.
    pub fn record_send_success(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed send.
    pub fn record_send_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a configuration dump.
    pub fn record_debug_dump(&self) {
        self.debug_dumps.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            debug_dumps: self.debug_dumps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MailMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages accepted by the transport.
    pub sent: u64,
    /// Failed sends.
    pub failed: u64,
    /// Configuration dumps written.
    pub debug_dumps: u64,
}

impl MetricsSnapshot {
    /// Returns the fraction of sends that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.sent + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.sent as f64 / total as f64
    }
}
