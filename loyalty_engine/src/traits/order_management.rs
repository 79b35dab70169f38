use lps_common::Points;
use thiserror::Error;

use crate::db_types::{Order, OrderNumber, OrderStatus};

#[derive(Debug, Error)]
pub enum OrderManagementError {
    #[error("This user has already uploaded order {0}")]
    OrderAlreadyUploaded(OrderNumber),
    #[error("Order {0} was uploaded by another user")]
    OrderOwnedByAnotherUser(OrderNumber),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for OrderManagementError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Registers a new order for the given user, in `New` status, ready for the synchronization pipeline to
    /// pick up. Re-uploading the same number is reported distinctly depending on whether this user or another
    /// one owns the order.
    async fn insert_order(&self, user_id: i64, number: &OrderNumber) -> Result<(), OrderManagementError>;

    /// All orders uploaded by the given user, oldest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError>;

    /// Every order whose status is `New` or `Processing`. Used once, at startup, to seed the pipeline.
    async fn fetch_unprocessed_orders(&self) -> Result<Vec<Order>, OrderManagementError>;

    /// Atomically sets the order's status and accrual amount, and, when the new status is `Processed`, credits
    /// the owning user's ledger with the accrual in the same transaction. The credit is deduplicated at the
    /// store level: re-applying an already-applied `Processed` update never credits twice.
    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), OrderManagementError>;
}
