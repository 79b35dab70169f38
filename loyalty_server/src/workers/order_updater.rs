use std::{sync::Arc, time::Duration};

use log::*;
use loyalty_engine::db_types::StatusCheckResult;
use tokio::sync::{mpsc, Mutex};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::workers::{QueueScheduler, SyncOrderStore};

/// The second stage of the synchronization pipeline: a pool of workers that persist confirmed status changes.
///
/// Persistence is a single store call; when the new status is `Processed`, the store also credits the owning
/// user's ledger in the same transaction. Failed persistence is retried up to `persist_attempts` times (each
/// retry delayed by the poll interval) before the result is dropped with an error log. A dropped result is not
/// lost forever: the order stays unresolved in the store and is re-seeded on the next startup.
pub struct OrderUpdater<S: SyncOrderStore> {
    store: S,
    results: Arc<Mutex<mpsc::Receiver<StatusCheckResult>>>,
    requeue: QueueScheduler<StatusCheckResult>,
    poll_interval: Duration,
    persist_attempts: u32,
    cancel: CancellationToken,
}

impl<S: SyncOrderStore> OrderUpdater<S> {
    pub fn new(
        store: S,
        results: mpsc::Receiver<StatusCheckResult>,
        requeue: QueueScheduler<StatusCheckResult>,
        poll_interval: Duration,
        persist_attempts: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            results: Arc::new(Mutex::new(results)),
            requeue,
            poll_interval,
            persist_attempts,
            cancel,
        }
    }

    /// Spawns `workers` updater workers on the tracker.
    pub fn start(&self, workers: usize, tracker: &TaskTracker) {
        for id in 0..workers {
            let worker = Worker {
                id,
                store: self.store.clone(),
                results: Arc::clone(&self.results),
                requeue: self.requeue.clone(),
                poll_interval: self.poll_interval,
                persist_attempts: self.persist_attempts,
                cancel: self.cancel.clone(),
            };
            tracker.spawn(worker.run());
        }
    }
}

struct Worker<S: SyncOrderStore> {
    id: usize,
    store: S,
    results: Arc<Mutex<mpsc::Receiver<StatusCheckResult>>>,
    requeue: QueueScheduler<StatusCheckResult>,
    poll_interval: Duration,
    persist_attempts: u32,
    cancel: CancellationToken,
}

impl<S: SyncOrderStore> Worker<S> {
    async fn run(self) {
        debug!("💾️ Order updater {} started", self.id);
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = next(&self.results) => match result {
                    Some(result) => result,
                    None => break,
                },
            };
            self.persist(result).await;
        }
        debug!("💾️ Order updater {} stopped", self.id);
    }

    async fn persist(&self, result: StatusCheckResult) {
        match self.store.update_status(&result.number, result.status, result.accrual).await {
            Ok(()) => {
                info!("💾️ Order {} is now {} ({} accrued)", result.number, result.status, result.accrual);
            },
            Err(e) => {
                let attempts = result.attempts + 1;
                if attempts >= self.persist_attempts {
                    error!(
                        "💾️ Giving up on persisting order {} as {} after {attempts} attempts: {e}",
                        result.number, result.status
                    );
                } else {
                    warn!(
                        "💾️ Could not persist order {} as {} (attempt {attempts} of {}): {e}",
                        result.number, result.status, self.persist_attempts
                    );
                    self.requeue.schedule(result.retried(), self.poll_interval);
                }
            },
        }
    }
}

async fn next(results: &Mutex<mpsc::Receiver<StatusCheckResult>>) -> Option<StatusCheckResult> {
    results.lock().await.recv().await
}
