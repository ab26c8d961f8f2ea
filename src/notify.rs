//! In-process notification bus for user-facing toasts.

use async_channel::{Receiver, Sender, unbounded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
}

#[derive(Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        self.rx.clone()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotifyLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NotifyLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotifyLevel::Error, message.into());
    }

    fn push(&self, level: NotifyLevel, message: String) {
        tracing::debug!(?level, %message, "notification");
        let _ = self.tx.try_send(Notification { level, message });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_arrive_in_order_with_levels() {
        let notifier = Notifier::new();
        let rx = notifier.subscribe();
        notifier.success("saved");
        notifier.error("boom");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, NotifyLevel::Success);
        assert_eq!(first.message, "saved");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, NotifyLevel::Error);
    }
}
