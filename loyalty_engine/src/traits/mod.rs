//! Trait seams between the storage backend and its consumers.
//!
//! Backends implement three seams: [`UserManagement`] (registration and login lookups), [`OrderManagement`]
//! (order upload and the status-synchronization contract consumed by the pipeline) and [`BalanceManagement`]
//! (the ledger: balances and withdrawals).
mod balance_management;
mod order_management;
mod user_management;

pub use balance_management::{BalanceError, BalanceManagement};
pub use order_management::{OrderManagement, OrderManagementError};
pub use user_management::{UserManagement, UserManagementError};
