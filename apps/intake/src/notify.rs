//! User-facing notifications (toasts). Stores never emit these; the upload
//! session and the screening views do.

#[cfg(test)]
use std::sync::Mutex;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub fn success(notifier: &dyn Notifier, message: impl Into<String>) {
    notifier.notify(Notification {
        level: Level::Success,
        message: message.into(),
    });
}

pub fn error(notifier: &dyn Notifier, message: impl Into<String>) {
    notifier.notify(Notification {
        level: Level::Error,
        message: message.into(),
    });
}

/// Writes notifications to the log. Used by the headless driver.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Success => info!(notice = %notification.message),
            Level::Error => warn!(notice = %notification.message),
        }
    }
}

/// Keeps every notification in memory, oldest first.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    entries: Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .map(|n| (n.level, n.message.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message)
            .collect()
    }
}

#[cfg(test)]
impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}
