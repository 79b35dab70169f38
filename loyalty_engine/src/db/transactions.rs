use lps_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db::is_unique_violation,
    db_types::{Balance, OrderNumber, Transaction},
    traits::BalanceError,
};

/// Derives the user's balance from the ledger: credits minus debits, plus the lifetime withdrawn total.
pub async fn balance_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Balance, BalanceError> {
    let (credited, withdrawn): (i64, i64) = sqlx::query_as(
        r#"
        SELECT coalesce(sum(CASE WHEN kind = 'CREDIT' THEN amount END), 0),
               coalesce(sum(CASE WHEN kind = 'DEBIT' THEN amount END), 0)
        FROM transactions
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(Balance {
        current: Points::from_hundredths(credited - withdrawn),
        withdrawn: Points::from_hundredths(withdrawn),
    })
}

/// Registers the withdrawal's order number and debits the ledger.
///
/// Not atomic on its own; callers must run it inside a transaction and pass `&mut *tx` as the connection. The
/// balance check and the debit insert then commit or roll back together, which is what upholds the
/// non-negative-balance invariant under concurrent withdrawals.
pub async fn insert_withdrawal(
    user_id: i64,
    number: &OrderNumber,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<(), BalanceError> {
    sqlx::query("INSERT INTO orders (user_id, number) VALUES ($1, $2)")
        .bind(user_id)
        .bind(number)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BalanceError::OrderAlreadyUsed(number.clone())
            } else {
                e.into()
            }
        })?;
    let balance = balance_for_user(user_id, &mut *conn).await?;
    if balance.current < amount {
        return Err(BalanceError::InsufficientFunds);
    }
    sqlx::query("INSERT INTO transactions (user_id, order_number, amount, kind) VALUES ($1, $2, $3, 'DEBIT')")
        .bind(user_id)
        .bind(number)
        .bind(amount)
        .execute(conn)
        .await?;
    Ok(())
}

/// The user's debit history, oldest first.
pub async fn withdrawals_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, BalanceError> {
    let withdrawals = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT order_number, amount, processed_at
        FROM transactions
        WHERE user_id = $1
          AND kind = 'DEBIT'
        ORDER BY processed_at, id
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
