//! Diagnostic sinks.
//!
//! A run reports its progress as one-line human-readable messages through a
//! [`DiagnosticSink`]. The sink is opened when the run starts and closed when it
//! ends, including when the gate skips the run.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use time::OffsetDateTime;
use time::macros::format_description;

/// Destination for run diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Called once before the first message of a run.
    fn open(&self) {}

    /// Records one message.
    fn emit(&self, message: &str);

    /// Called once after the last message of a run.
    fn close(&self) {}
}

/// Formats `now` as `HH:MM:SS.mmm`.
pub fn format_timestamp(now: OffsetDateTime) -> String {
    now.format(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ))
    .unwrap_or_default()
}

/// Sink that writes timestamped lines through `tracing`.
pub struct TracingSink {
    prefix: String,
    emitted: AtomicUsize,
}

impl TracingSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            emitted: AtomicUsize::new(0),
        }
    }

    /// Number of messages emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    fn line(&self, now: OffsetDateTime, message: &str) -> String {
        format!("[{}] {}: {message}", format_timestamp(now), self.prefix)
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new("seedwork")
    }
}

impl DiagnosticSink for TracingSink {
    fn open(&self) {
        self.emitted.store(0, Ordering::Relaxed);
        tracing::debug!(target: "seedwork::diagnostics", "diagnostics opened");
    }

    fn emit(&self, message: &str) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let line = self.line(OffsetDateTime::now_utc(), message);
        tracing::info!(target: "seedwork::diagnostics", "{line}");
    }

    fn close(&self) {
        tracing::debug!(
            target: "seedwork::diagnostics",
            emitted = self.emitted(),
            "diagnostics closed"
        );
    }
}

/// Sink that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    opened: AtomicBool,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Returns `true` if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DiagnosticSink for RecordingSink {
    fn open(&self) {
        self.opened.store(true, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
    }

    fn emit(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
