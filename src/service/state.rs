//! State shared between the service handle, the owner task and the pipelines.

use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};

use crate::error_handling::ServiceStats;
use crate::tor::TorIndex;

/// Holds at most one undelivered item; a newer delivery replaces it.
pub(crate) struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Mailbox<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Stores `item`, returning the undelivered item it superseded.
    pub(crate) fn deliver(&self, item: T) -> Option<T> {
        let superseded = self.lock().replace(item);
        self.notify.notify_one();
        superseded
    }

    /// Takes the pending item without waiting.
    pub(crate) fn try_take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Waits for the next item.
    ///
    /// Cancel-safe: dropping the future never loses a delivered item, since
    /// the item stays in the slot until taken.
    pub(crate) async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.try_take() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Flags and counters readable from any task.
pub(crate) struct Shared {
    loaded: watch::Sender<bool>,
    pub(crate) stats: ServiceStats,
    pub(crate) tor_mailbox: Mailbox<Arc<TorIndex>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            loaded: watch::Sender::new(false),
            stats: ServiceStats::new(),
            tor_mailbox: Mailbox::new(),
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Receiver woken whenever the loaded flag changes.
    pub(crate) fn watch_loaded(&self) -> watch::Receiver<bool> {
        self.loaded.subscribe()
    }

    /// Only the owner task calls this.
    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.send_if_modified(|current| {
            let changed = *current != loaded;
            *current = loaded;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deliver_replaces_pending_item() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.deliver(1), None);
        assert_eq!(mailbox.deliver(2), Some(1));
        assert_eq!(mailbox.deliver(3), Some(2));
        assert_eq!(mailbox.try_take(), Some(3));
        assert_eq!(mailbox.try_take(), None);
    }

    #[tokio::test]
    async fn test_slow_receiver_sees_only_newest() {
        let mailbox = Mailbox::new();
        for generation in 1..=5 {
            mailbox.deliver(generation);
        }
        assert_eq!(mailbox.recv().await, 5);
        let next = tokio::time::timeout(Duration::from_millis(50), mailbox.recv()).await;
        assert!(next.is_err(), "nothing else should be pending");
    }

    #[tokio::test]
    async fn test_recv_wakes_on_delivery() {
        let mailbox = Arc::new(Mailbox::new());
        let receiver = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.deliver("index");
        let received = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("receiver woke")
            .expect("receiver task");
        assert_eq!(received, "index");
    }

    #[test]
    fn test_loaded_flag() {
        let shared = Shared::new();
        assert!(!shared.is_loaded());
        shared.set_loaded(true);
        assert!(shared.is_loaded());
    }

    #[tokio::test]
    async fn test_loaded_watcher_wakes_on_change() {
        let shared = Arc::new(Shared::new());
        let mut loaded = shared.watch_loaded();
        let waiter = tokio::spawn(async move { loaded.wait_for(|l| *l).await.is_ok() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        shared.set_loaded(true);
        let woke = tokio::time::timeout(Duration::from_millis(50), waiter)
            .await
            .expect("waiter woke without polling")
            .expect("waiter task");
        assert!(woke);
    }
}
