//! The order-status synchronization pipeline.
//!
//! Two bounded queues and two worker pools keep the local order store in step with the external accrual
//! service. The [`StatusChecker`] pool polls the service once per order per poll interval; when it observes a
//! status change it publishes a [`StatusCheckResult`], which the [`OrderUpdater`] pool persists (crediting the
//! user's balance in the same transaction when the order is `Processed`). Every queue insertion, immediate or
//! delayed, goes through a [`QueueScheduler`] running on a shared [`TaskTracker`], so a single cancellation
//! token plus `tracker.wait()` drains the whole pipeline on shutdown.
mod order_updater;
mod scheduler;
mod status_checker;

use std::{future::Future, time::Duration};

use accrual_client::{AccrualApi, AccrualApiError, AccrualInfo, RemoteOrderStatus};
use log::*;
use loyalty_engine::{
    db_types::{Order, OrderNumber, OrderStatus, StatusCheckJob, StatusCheckResult},
    OrderManagement, OrderManagementError, SqliteDatabase,
};
use lps_common::Points;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub use order_updater::OrderUpdater;
pub use scheduler::QueueScheduler;
pub use status_checker::StatusChecker;

/// Capacity of both the job queue and the result queue. Small on purpose: a full queue pushes backpressure
/// into the scheduler tasks rather than buffering unbounded work.
pub const QUEUE_CAPACITY: usize = 8;

/// Tuning knobs for the synchronization pipeline.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub checker_workers: usize,
    pub updater_workers: usize,
    /// Delay between successive polls of the same order, and between persistence retries.
    pub poll_interval: Duration,
    /// How many times a status change may fail to persist before it is dropped.
    pub persist_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checker_workers: 4,
            updater_workers: 4,
            poll_interval: Duration::from_secs(1),
            persist_attempts: 3,
        }
    }
}

/// The slice of the order store the pipeline needs. [`SqliteDatabase`] implements it by delegating to
/// [`OrderManagement`]; tests swap in scripted stand-ins.
pub trait SyncOrderStore: Clone + Send + Sync + 'static {
    fn find_unprocessed(&self) -> impl Future<Output = Result<Vec<Order>, OrderManagementError>> + Send;
    fn update_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> impl Future<Output = Result<(), OrderManagementError>> + Send;
}

impl SyncOrderStore for SqliteDatabase {
    async fn find_unprocessed(&self) -> Result<Vec<Order>, OrderManagementError> {
        self.fetch_unprocessed_orders().await
    }

    async fn update_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), OrderManagementError> {
        self.update_order_status(number, status, accrual).await
    }
}

/// The slice of the accrual service client the pipeline needs.
pub trait AccrualSource: Clone + Send + Sync + 'static {
    fn order_accrual(&self, number: &OrderNumber) -> impl Future<Output = Result<AccrualInfo, AccrualApiError>> + Send;
}

impl AccrualSource for AccrualApi {
    async fn order_accrual(&self, number: &OrderNumber) -> Result<AccrualInfo, AccrualApiError> {
        AccrualApi::order_accrual(self, &number.0).await
    }
}

/// Translates the remote service's vocabulary into the local one. `Registered` means the service has accepted
/// the order but not started on it, which locally is indistinguishable from a fresh upload.
pub fn map_remote_status(status: RemoteOrderStatus) -> OrderStatus {
    match status {
        RemoteOrderStatus::Registered => OrderStatus::New,
        RemoteOrderStatus::Processing => OrderStatus::Processing,
        RemoteOrderStatus::Invalid => OrderStatus::Invalid,
        RemoteOrderStatus::Processed => OrderStatus::Processed,
    }
}

/// A running synchronization pipeline. Dropping it does not stop the workers; call [`shutdown`] to cancel and
/// drain them.
///
/// [`shutdown`]: OrderSyncPipeline::shutdown
pub struct OrderSyncPipeline {
    jobs: QueueScheduler<StatusCheckJob>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl OrderSyncPipeline {
    /// A handle for submitting new jobs, typically one per freshly uploaded order.
    pub fn job_queue(&self) -> QueueScheduler<StatusCheckJob> {
        self.jobs.clone()
    }

    /// Cancels all workers and waits for every tracked task (workers, seeding, pending scheduled sends) to
    /// finish.
    pub async fn shutdown(self) {
        info!("🔁️ Shutting down the order synchronization pipeline");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("🔁️ The order synchronization pipeline has stopped");
    }
}

/// Wires up queues, schedulers and both worker pools, seeds the job queue from the store's unresolved orders,
/// and starts everything on a single task tracker.
pub fn start_pipeline<S, C>(store: S, client: C, config: &SyncConfig, cancel: CancellationToken) -> OrderSyncPipeline
where
    S: SyncOrderStore,
    C: AccrualSource,
{
    let tracker = TaskTracker::new();
    let (job_tx, job_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (result_tx, result_rx) = mpsc::channel(QUEUE_CAPACITY);
    let jobs = QueueScheduler::new(job_tx, tracker.clone(), cancel.clone());
    let requeue = QueueScheduler::new(result_tx.clone(), tracker.clone(), cancel.clone());

    let checker = StatusChecker::new(
        store.clone(),
        client,
        job_rx,
        jobs.clone(),
        result_tx,
        config.poll_interval,
        cancel.clone(),
    );
    checker.seed(&tracker);
    checker.start(config.checker_workers, &tracker);

    let updater = OrderUpdater::new(
        store,
        result_rx,
        requeue,
        config.poll_interval,
        config.persist_attempts,
        cancel.clone(),
    );
    updater.start(config.updater_workers, &tracker);
    info!(
        "🔁️ Order synchronization pipeline started with {} checker and {} updater workers",
        config.checker_workers, config.updater_workers
    );
    OrderSyncPipeline { jobs, cancel, tracker }
}
