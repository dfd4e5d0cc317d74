use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Error,
    Success,
}

/// Transient user-visible message. Display and dismissal belong to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Error,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Success,
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Enqueues without blocking.
    fn show(&self, notification: Notification);
}

/// Hands notifications to a UI loop over an unbounded queue.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn show(&self, notification: Notification) {
        if let Err(err) = self.tx.send(notification) {
            warn!(text = %err.0.message, "notification dropped: receiver closed");
        }
    }
}

pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => warn!(text = %notification.message, "user notification"),
            NotificationKind::Success => info!(text = %notification.message, "user notification"),
        }
    }
}
