use lps_common::Points;
use serde::{Deserialize, Serialize};

/// Status vocabulary used by the remote accrual service.
///
/// This is deliberately a closed enum: a status string outside this vocabulary fails deserialization, so the
/// lookup is reported as a (transient) client error rather than being smuggled in as a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteOrderStatus {
    /// The order is registered with the service, but the accrual has not been calculated yet.
    Registered,
    /// The accrual calculation is in progress.
    Processing,
    /// The order was rejected. No points will be paid out.
    Invalid,
    /// The accrual has been calculated and the payout amount is final.
    Processed,
}

impl RemoteOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteOrderStatus::Invalid | RemoteOrderStatus::Processed)
    }
}

/// The outcome of a single successful accrual lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualInfo {
    pub status: RemoteOrderStatus,
    pub accrual: Points,
}

impl AccrualInfo {
    /// The service responded `204`: it has never heard of this order. The reconciliation pipeline treats this
    /// as a rejection with zero accrual.
    pub fn unregistered() -> Self {
        Self { status: RemoteOrderStatus::Invalid, accrual: Points::ZERO }
    }
}

/// Wire format of the `200` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: RemoteOrderStatus,
    #[serde(default)]
    pub accrual: Option<Points>,
}

impl From<AccrualResponse> for AccrualInfo {
    fn from(response: AccrualResponse) -> Self {
        Self { status: response.status, accrual: response.accrual.unwrap_or(Points::ZERO) }
    }
}
