//! Observer notifications
//!
//! Background tasks never touch the observer directly; they push
//! [`Notification`]s into an unbounded channel that the owner drains.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::actions::DispatchResult;
use crate::intent::Intent;

/// Message delivered to the observer
///
/// Serializes as `{"kind": "log" | "status" | "intent" | "result", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    /// Human-readable line for the activity log
    Log(String),
    /// Short status label (e.g. "Listening...")
    Status(String),
    /// An utterance was classified
    Intent(Intent),
    /// A command finished
    Result(DispatchResult),
}

/// Producer half of the observer channel
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a connected notifier/receiver pair
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a notification
    ///
    /// A dropped receiver is not an error; the notification is only traced.
    pub fn send(&self, notification: Notification) {
        tracing::debug!(?notification, "notify");
        if self.tx.send(notification).is_err() {
            tracing::trace!("observer channel closed");
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.send(Notification::Log(message.into()));
    }

    pub fn status(&self, status: impl Into<String>) {
        self.send(Notification::Status(status.into()));
    }

    pub fn intent(&self, intent: &Intent) {
        self.send(Notification::Intent(intent.clone()));
    }

    pub fn result(&self, result: &DispatchResult) {
        self.send(Notification::Result(result.clone()));
    }
}
