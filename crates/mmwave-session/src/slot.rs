use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// A single-slot channel where the newest value overwrites the old one.
///
/// The producer never waits. A consumer that falls behind sees only the
/// most recent value; everything older is dropped.
#[derive(Debug, Default)]
pub struct FrameSlot<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Store `value`, returning the undelivered value it displaced.
    pub fn publish(&self, value: T) -> Option<T> {
        let displaced = self.lock().replace(value);
        self.notify.notify_one();
        displaced
    }

    /// Take the pending value without waiting.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Wait until a value is available and take it.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            self.notify.notified().await;
        }
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
