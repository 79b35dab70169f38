use lps_common::Points;
use thiserror::Error;

use crate::db_types::{Balance, OrderNumber, Transaction};

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("The user's balance does not cover the withdrawal")]
    InsufficientFunds,
    #[error("Order {0} has already been used")]
    OrderAlreadyUsed(OrderNumber),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for BalanceError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait BalanceManagement {
    /// The user's current balance and lifetime withdrawn total. The ledger invariant guarantees `current` is
    /// never negative.
    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, BalanceError>;

    /// Atomically registers the order number and debits the user's ledger. Fails with
    /// [`BalanceError::InsufficientFunds`] if the debit would push the balance negative; nothing is recorded in
    /// that case.
    async fn record_withdrawal(
        &self,
        user_id: i64,
        number: &OrderNumber,
        amount: Points,
    ) -> Result<(), BalanceError>;

    /// The user's withdrawal history, oldest first.
    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Transaction>, BalanceError>;
}
