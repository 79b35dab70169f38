use std::{sync::Arc, time::Duration};

use log::*;
use loyalty_engine::db_types::{StatusCheckJob, StatusCheckResult};
use tokio::sync::{mpsc, Mutex};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::workers::{map_remote_status, AccrualSource, QueueScheduler, SyncOrderStore};

/// The first stage of the synchronization pipeline: a pool of workers that drive each pending order's job
/// forward until the accrual service reports a terminal status.
///
/// Each worker pops a job, asks the accrual service for the order's current status, and then either
/// reschedules the job (unchanged or transient failure), publishes a [`StatusCheckResult`] (status changed),
/// or lets the job die (terminal status). Rescheduling always goes through the [`QueueScheduler`], so polling
/// frequency is bounded by the poll interval rather than by how fast the workers can spin.
pub struct StatusChecker<S, C>
where
    S: SyncOrderStore,
    C: AccrualSource,
{
    store: S,
    client: C,
    jobs: Arc<Mutex<mpsc::Receiver<StatusCheckJob>>>,
    scheduler: QueueScheduler<StatusCheckJob>,
    results: mpsc::Sender<StatusCheckResult>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<S, C> StatusChecker<S, C>
where
    S: SyncOrderStore,
    C: AccrualSource,
{
    pub fn new(
        store: S,
        client: C,
        jobs: mpsc::Receiver<StatusCheckJob>,
        scheduler: QueueScheduler<StatusCheckJob>,
        results: mpsc::Sender<StatusCheckResult>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            client,
            jobs: Arc::new(Mutex::new(jobs)),
            scheduler,
            results,
            poll_interval,
            cancel,
        }
    }

    /// Seeds the job queue with one job per unresolved order in the store, `{number, status}` taken verbatim.
    ///
    /// Seeding runs on the scheduler's task tracker: it does not have to complete before the pool starts
    /// servicing jobs, but shutdown will wait for it, so a fast shutdown cannot race the seeding sends.
    /// Seeding happens exactly once, before any other job for those orders can exist, which is what keeps the
    /// at-most-one-active-job-per-order assumption true.
    pub fn seed(&self, tracker: &TaskTracker) {
        let store = self.store.clone();
        let scheduler = self.scheduler.clone();
        tracker.spawn(async move {
            match store.find_unprocessed().await {
                Ok(orders) => {
                    info!("🔁️ Seeding the status checker with {} unresolved orders", orders.len());
                    for order in orders {
                        scheduler.submit(StatusCheckJob { number: order.number, status: order.status });
                    }
                },
                Err(e) => {
                    // Orders left behind here stay NEW/PROCESSING in the store and are re-seeded on the
                    // next startup.
                    error!("🔁️ Could not load unresolved orders for seeding: {e}");
                },
            }
        });
    }

    /// Spawns `workers` checker workers on the tracker.
    pub fn start(&self, workers: usize, tracker: &TaskTracker) {
        for id in 0..workers {
            let worker = Worker {
                id,
                client: self.client.clone(),
                jobs: Arc::clone(&self.jobs),
                scheduler: self.scheduler.clone(),
                results: self.results.clone(),
                poll_interval: self.poll_interval,
                cancel: self.cancel.clone(),
            };
            tracker.spawn(worker.run());
        }
    }
}

struct Worker<C: AccrualSource> {
    id: usize,
    client: C,
    jobs: Arc<Mutex<mpsc::Receiver<StatusCheckJob>>>,
    scheduler: QueueScheduler<StatusCheckJob>,
    results: mpsc::Sender<StatusCheckResult>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<C: AccrualSource> Worker<C> {
    async fn run(self) {
        debug!("🔁️ Status checker {} started", self.id);
        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = next(&self.jobs) => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.check(job).await;
        }
        debug!("🔁️ Status checker {} stopped", self.id);
    }

    async fn check(&self, job: StatusCheckJob) {
        let info = match self.client.order_accrual(&job.number).await {
            Ok(info) => info,
            Err(e) => {
                // Transient failure. The job goes back on the queue unchanged; the client has already done
                // its own rate-limit retries, so the only backoff here is the poll interval.
                warn!("🔁️ Error fetching accrual status for order {}: {e}", job.number);
                self.scheduler.schedule(job, self.poll_interval);
                return;
            },
        };
        let status = map_remote_status(info.status);
        if status == job.status {
            if !status.is_terminal() {
                self.scheduler.schedule(job, self.poll_interval);
            }
            return;
        }
        debug!("🔁️ Order {} moved from {} to {status} at the accrual service", job.number, job.status);
        let result = StatusCheckResult::new(job.number.clone(), status, info.accrual);
        tokio::select! {
            _ = self.cancel.cancelled() => return,
            sent = self.results.send(result) => {
                if sent.is_err() {
                    warn!("🔁️ The result queue closed; discarding the update for order {}", job.number);
                    return;
                }
            },
        }
        if status.is_terminal() {
            debug!("🔁️ Order {} reached terminal status {status}; polling ends", job.number);
        } else {
            self.scheduler.schedule(job.with_status(status), self.poll_interval);
        }
    }
}

async fn next(jobs: &Mutex<mpsc::Receiver<StatusCheckJob>>) -> Option<StatusCheckJob> {
    jobs.lock().await.recv().await
}
