//! Loyalty Points Engine
//!
//! The engine is the storage backend for the loyalty points server. It is the sole authority for durable order
//! and ledger state: orders uploaded by users, their accrual status as reconciled against the external accrual
//! service, and the credit/debit ledger that makes up each user's point balance.
//!
//! The library is divided into two main sections:
//! 1. Database management and control (the `db` module). SQLite is the supported backend. You should never
//!    need to access the database directly; use the trait seams in [`mod@traits`] instead. The exception is
//!    the data types used in the database, which are defined in [`mod@db_types`] and are public.
//! 2. The trait seams ([`mod@traits`]): [`UserManagement`], [`OrderManagement`] and [`BalanceManagement`].
//!    The status-synchronization pipeline in the server crate consumes [`OrderManagement`]; the HTTP routes
//!    consume all three. [`SqliteDatabase`] implements every seam.
mod db;

pub mod db_types;
pub mod helpers;
mod sqlite_impl;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use sqlite_impl::SqliteDatabase;
pub use traits::{
    BalanceError,
    BalanceManagement,
    OrderManagement,
    OrderManagementError,
    UserManagement,
    UserManagementError,
};
