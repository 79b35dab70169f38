//! `SqliteDatabase` is a concrete implementation of a loyalty engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use lps_common::Points;
use sqlx::SqlitePool;

use crate::{
    db::{db_url, new_pool, orders, transactions, users},
    db_types::{Balance, Order, OrderNumber, OrderStatus, Transaction, User},
    traits::{
        BalanceError,
        BalanceManagement,
        OrderManagement,
        OrderManagementError,
        UserManagement,
        UserManagementError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database given by the `LPS_DATABASE_URL` environment variable, or the default URL.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl UserManagement for SqliteDatabase {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        let id = users::insert_user(login, password_hash, &mut conn).await?;
        debug!("🗃️ Created user {login} with id {id}");
        Ok(id)
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_login(login, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, user_id: i64, number: &OrderNumber) -> Result<(), OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(user_id, number, &mut conn).await?;
        debug!("🗃️ Registered order {number} for user {user_id}");
        Ok(())
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        orders::orders_for_user(user_id, &mut conn).await
    }

    async fn fetch_unprocessed_orders(&self) -> Result<Vec<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        orders::unprocessed_orders(&mut conn).await
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<(), OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        orders::update_status_with_credit(number, status, accrual, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {number} moved to {status} with accrual {accrual}");
        Ok(())
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, BalanceError> {
        let mut conn = self.pool.acquire().await?;
        transactions::balance_for_user(user_id, &mut conn).await
    }

    async fn record_withdrawal(
        &self,
        user_id: i64,
        number: &OrderNumber,
        amount: Points,
    ) -> Result<(), BalanceError> {
        let mut tx = self.pool.begin().await?;
        transactions::insert_withdrawal(user_id, number, amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ User {user_id} withdrew {amount} against order {number}");
        Ok(())
    }

    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Transaction>, BalanceError> {
        let mut conn = self.pool.acquire().await?;
        transactions::withdrawals_for_user(user_id, &mut conn).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::new_test_db;

    async fn user(db: &SqliteDatabase, login: &str) -> i64 {
        db.create_user(login, "argon2-hash").await.expect("Error creating user")
    }

    fn num(s: &str) -> OrderNumber {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn duplicate_logins_are_rejected() {
        let db = new_test_db().await;
        user(&db, "alice").await;
        let err = db.create_user("alice", "other-hash").await.unwrap_err();
        assert!(matches!(err, UserManagementError::LoginTaken));
        let fetched = db.fetch_user_by_login("alice").await.unwrap().unwrap();
        assert_eq!(fetched.password_hash, "argon2-hash");
        assert!(db.fetch_user_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn order_upload_ownership_rules() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        db.insert_order(alice, &num("711388585544181")).await.unwrap();

        let err = db.insert_order(alice, &num("711388585544181")).await.unwrap_err();
        assert!(matches!(err, OrderManagementError::OrderAlreadyUploaded(_)));
        let err = db.insert_order(bob, &num("711388585544181")).await.unwrap_err();
        assert!(matches!(err, OrderManagementError::OrderOwnedByAnotherUser(_)));

        let orders = db.fetch_orders_for_user(alice).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::New);
        assert_eq!(orders[0].accrual, Points::ZERO);
        assert!(db.fetch_orders_for_user(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unprocessed_orders_exclude_terminal_statuses() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        for number in ["711388585544181", "655770442208670", "4417123456789113", "79927398713"] {
            db.insert_order(alice, &num(number)).await.unwrap();
        }
        db.update_order_status(&num("655770442208670"), OrderStatus::Processing, Points::ZERO).await.unwrap();
        db.update_order_status(&num("4417123456789113"), OrderStatus::Invalid, Points::ZERO).await.unwrap();
        db.update_order_status(&num("79927398713"), OrderStatus::Processed, Points::from_whole(10)).await.unwrap();

        let pending = db.fetch_unprocessed_orders().await.unwrap();
        let numbers: Vec<&str> = pending.iter().map(|o| o.number.as_str()).collect();
        assert_eq!(numbers, vec!["711388585544181", "655770442208670"]);
    }

    #[tokio::test]
    async fn processed_update_credits_the_ledger_exactly_once() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        db.insert_order(alice, &num("711388585544181")).await.unwrap();

        db.update_order_status(&num("711388585544181"), OrderStatus::Processed, Points::from_whole(50))
            .await
            .unwrap();
        let balance = db.fetch_balance(alice).await.unwrap();
        assert_eq!(balance.current, Points::from_whole(50));

        // Re-delivery of the same confirmed result must not double-credit
        db.update_order_status(&num("711388585544181"), OrderStatus::Processed, Points::from_whole(50))
            .await
            .unwrap();
        let balance = db.fetch_balance(alice).await.unwrap();
        assert_eq!(balance.current, Points::from_whole(50));
        assert_eq!(balance.withdrawn, Points::ZERO);
    }

    #[tokio::test]
    async fn invalid_update_does_not_credit() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        db.insert_order(alice, &num("655770442208670")).await.unwrap();
        db.update_order_status(&num("655770442208670"), OrderStatus::Invalid, Points::ZERO).await.unwrap();

        let balance = db.fetch_balance(alice).await.unwrap();
        assert_eq!(balance.current, Points::ZERO);
        let orders = db.fetch_orders_for_user(alice).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Invalid);
    }

    #[tokio::test]
    async fn updating_an_unknown_order_is_not_found() {
        let db = new_test_db().await;
        let err = db.update_order_status(&num("79927398713"), OrderStatus::Processed, Points::ZERO).await.unwrap_err();
        assert!(matches!(err, OrderManagementError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn withdrawals_respect_the_balance_invariant() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        db.insert_order(alice, &num("711388585544181")).await.unwrap();
        db.update_order_status(&num("711388585544181"), OrderStatus::Processed, Points::from_whole(500))
            .await
            .unwrap();

        let err = db.record_withdrawal(alice, &num("655770442208670"), Points::from_whole(751)).await.unwrap_err();
        assert!(matches!(err, BalanceError::InsufficientFunds));
        // a rejected withdrawal must leave no trace in the ledger
        assert_eq!(db.fetch_balance(alice).await.unwrap().current, Points::from_whole(500));
        assert!(db.fetch_withdrawals(alice).await.unwrap().is_empty());

        db.record_withdrawal(alice, &num("4417123456789113"), Points::from_whole(300)).await.unwrap();
        let balance = db.fetch_balance(alice).await.unwrap();
        assert_eq!(balance.current, Points::from_whole(200));
        assert_eq!(balance.withdrawn, Points::from_whole(300));

        let withdrawals = db.fetch_withdrawals(alice).await.unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].order_number, num("4417123456789113"));
        assert_eq!(withdrawals[0].amount, Points::from_whole(300));
    }

    #[tokio::test]
    async fn a_withdrawal_order_number_cannot_be_reused() {
        let db = new_test_db().await;
        let alice = user(&db, "alice").await;
        db.insert_order(alice, &num("711388585544181")).await.unwrap();
        db.update_order_status(&num("711388585544181"), OrderStatus::Processed, Points::from_whole(100))
            .await
            .unwrap();
        db.record_withdrawal(alice, &num("655770442208670"), Points::from_whole(10)).await.unwrap();

        let err = db.record_withdrawal(alice, &num("655770442208670"), Points::from_whole(10)).await.unwrap_err();
        assert!(matches!(err, BalanceError::OrderAlreadyUsed(_)));
    }
}
