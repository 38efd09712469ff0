use std::sync::Mutex;

/// Receives user-visible messages for writes that could not be kept.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[derive(Debug, Default)]
pub struct NoticeQueue {
    messages: Mutex<Vec<String>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns queued messages in arrival order and clears the queue.
    pub fn drain(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(mut messages) => messages.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
