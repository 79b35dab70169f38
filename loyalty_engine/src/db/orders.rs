use log::trace;
use lps_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db::is_unique_violation,
    db_types::{Order, OrderNumber, OrderStatus},
    traits::OrderManagementError,
};

/// Inserts a new order in `New` status. A duplicate number is reported as [`OrderAlreadyUploaded`] when this
/// user owns the existing order, or [`OrderOwnedByAnotherUser`] otherwise.
///
/// [`OrderAlreadyUploaded`]: OrderManagementError::OrderAlreadyUploaded
/// [`OrderOwnedByAnotherUser`]: OrderManagementError::OrderOwnedByAnotherUser
pub async fn insert_order(
    user_id: i64,
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<(), OrderManagementError> {
    let inserted = sqlx::query("INSERT INTO orders (user_id, number, status) VALUES ($1, $2, 'NEW')")
        .bind(user_id)
        .bind(number)
        .execute(&mut *conn)
        .await;
    match inserted {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => {
            let (owner_id,): (i64,) = sqlx::query_as("SELECT user_id FROM orders WHERE number = $1")
                .bind(number)
                .fetch_one(conn)
                .await?;
            if owner_id == user_id {
                Err(OrderManagementError::OrderAlreadyUploaded(number.clone()))
            } else {
                Err(OrderManagementError::OrderOwnedByAnotherUser(number.clone()))
            }
        },
        Err(e) => Err(e.into()),
    }
}

/// Returns the user's uploaded orders, oldest first. Order rows created as withdrawal targets carry no status
/// and are not part of the upload history.
pub async fn orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderManagementError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT number, status, accrual, uploaded_at
        FROM orders
        WHERE user_id = $1
          AND status IS NOT NULL
        ORDER BY uploaded_at, id
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Every order still awaiting a terminal status from the accrual service.
pub async fn unprocessed_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderManagementError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT number, status, accrual, uploaded_at
        FROM orders
        WHERE status IN ('NEW', 'PROCESSING')
        ORDER BY uploaded_at, id
        "#,
    )
    .fetch_all(conn)
    .await?;
    trace!("📋️ {} unprocessed orders in the store", orders.len());
    Ok(orders)
}

/// Sets the order's status and accrual and, for a `Processed` status, credits the owning user's ledger.
///
/// This is not atomic on its own. Callers must run it inside a transaction and pass `&mut *tx` as the
/// connection argument; both writes then commit or roll back together. The `INSERT OR IGNORE` leans on the
/// unique credit-per-order index, so re-applying a `Processed` update never credits twice.
pub async fn update_status_with_credit(
    number: &OrderNumber,
    status: OrderStatus,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<(), OrderManagementError> {
    let row: Option<(i64,)> =
        sqlx::query_as("UPDATE orders SET status = $1, accrual = $2 WHERE number = $3 RETURNING user_id")
            .bind(status)
            .bind(accrual)
            .bind(number)
            .fetch_optional(&mut *conn)
            .await?;
    let (user_id,) = row.ok_or_else(|| OrderManagementError::OrderNotFound(number.clone()))?;
    if status == OrderStatus::Processed {
        sqlx::query(
            "INSERT OR IGNORE INTO transactions (user_id, order_number, amount, kind) VALUES ($1, $2, $3, 'CREDIT')",
        )
        .bind(user_id)
        .bind(number)
        .bind(accrual)
        .execute(conn)
        .await?;
    }
    Ok(())
}
