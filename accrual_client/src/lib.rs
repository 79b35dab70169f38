//! Client for the remote accrual-computation service.
//!
//! The accrual service calculates the loyalty-point payout for an uploaded order. It exposes a single lookup
//! endpoint, `GET /api/orders/{number}`, which this crate wraps together with the service's rate-limiting
//! protocol: a `429` response is retried a bounded number of times at a fixed interval before the call is
//! reported as failed, and a `204` response means the order is unknown to the service (which callers treat as
//! a terminal, zero-accrual outcome).
mod api;
mod data_objects;
mod error;

pub use api::AccrualApi;
pub use data_objects::{AccrualInfo, RemoteOrderStatus};
pub use error::AccrualApiError;
