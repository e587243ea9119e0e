//! Outcome events for an external event sink.

use std::fmt;
use serde::Serialize;
use tokio::sync::mpsc;

/// Reason attached to every reconciliation event.
pub const REASON_RELOAD: &str = "RELOAD";

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Normal,
    Warning,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Normal => write!(f, "Normal"),
            EventKind::Warning => write!(f, "Warning"),
        }
    }
}

/// A message describing a reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub reason: String,
    pub message: String,
}

impl Event {
    pub fn normal(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Normal,
            reason: REASON_RELOAD.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Warning,
            reason: REASON_RELOAD.to_string(),
            message: message.into(),
        }
    }
}

/// Destination of outcome events. Sending never blocks the orchestrator.
pub trait EventSink: Send + Sync {
    fn send(&self, event: Event);
}

/// Writes events as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: Event) {
        match event.kind {
            EventKind::Normal => {
                tracing::info!(kind = %event.kind, reason = %event.reason, "{}", event.message)
            }
            EventKind::Warning => {
                tracing::warn!(kind = %event.kind, reason = %event.reason, "{}", event.message)
            }
        }
    }
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelEventSink::new();
        sink.send(Event::warning("boom"));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Warning);
        assert_eq!(event.reason, "RELOAD");
        assert_eq!(event.message, "boom");
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, rx) = ChannelEventSink::new();
        drop(rx);
        sink.send(Event::normal("ignored"));
    }
}
