use std::time::Duration;

use log::*;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Hands items to a bounded queue, either immediately or after a delay, as tracked tasks.
///
/// Every delivery runs on the pipeline's task tracker, so shutdown waits for in-flight sends (including the
/// startup seeding burst) instead of racing them. A send that is still pending when the cancellation token
/// fires is abandoned; a full queue applies backpressure to the sending task, never drops the item.
#[derive(Clone)]
pub struct QueueScheduler<T: Send + 'static> {
    sender: mpsc::Sender<T>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<T: Send + 'static> QueueScheduler<T> {
    pub fn new(sender: mpsc::Sender<T>, tracker: TaskTracker, cancel: CancellationToken) -> Self {
        Self { sender, tracker, cancel }
    }

    /// Delivers the item as soon as the queue has room.
    pub fn submit(&self, item: T) {
        self.schedule(item, Duration::ZERO);
    }

    /// Delivers the item after `delay`, unless shutdown happens first.
    pub fn schedule(&self, item: T, delay: Duration) {
        if self.cancel.is_cancelled() {
            trace!("⏲️ Shutdown in progress; not scheduling a new queue item");
            return;
        }
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {},
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {},
                result = sender.send(item) => {
                    if result.is_err() {
                        warn!("⏲️ The queue closed before a scheduled item could be delivered");
                    }
                },
            }
        });
    }
}
