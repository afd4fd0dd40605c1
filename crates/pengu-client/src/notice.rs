//! User-facing transient notices (the toast channel).
//!
//! The store never renders anything itself; it pushes notices onto an
//! unbounded channel and the embedding surface (CLI, GUI shell) drains them.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Create a notice channel; the sender is cloned into the store.
pub fn channel() -> (NoticeSender, UnboundedReceiver<Notice>) {
    let (tx, rx) = unbounded_channel();
    (NoticeSender { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct NoticeSender {
    tx: UnboundedSender<Notice>,
}

impl NoticeSender {
    fn send(&self, level: NoticeLevel, message: impl Into<String>) {
        // A dropped receiver just means nobody is showing toasts anymore.
        let _ = self.tx.send(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(NoticeLevel::Error, message);
    }
}
