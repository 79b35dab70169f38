use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use lps_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::luhn_valid;

//--------------------------------------     OrderNumber       -------------------------------------------------------
/// The business identifier of an order: a checksum-bearing numeric string assigned by the merchant system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the number passes the Luhn checksum. Order numbers are validated at the API boundary; the
    /// pipeline and the store trust them from there on.
    pub fn is_valid(&self) -> bool {
        luhn_valid(&self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------     OrderStatus       -------------------------------------------------------
/// The accrual state machine for an order: `New → Processing → {Processed | Invalid}`.
///
/// `Processed` and `Invalid` are terminal. The accrual amount is only meaningful once an order is `Processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// The order has been uploaded, but the accrual service has not reported any progress yet.
    New,
    /// The accrual service is calculating the payout.
    Processing,
    /// The accrual service rejected the order. No points will ever be paid out.
    Invalid,
    /// The payout has been calculated and credited.
    Processed,
}

impl OrderStatus {
    /// Terminal statuses end an order's polling lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::Invalid => write!(f, "INVALID"),
            OrderStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub accrual: Points,
    pub uploaded_at: DateTime<Utc>,
}

//--------------------------------------    StatusCheckJob     -------------------------------------------------------
/// An in-flight unit of polling work for one order.
///
/// A job is created once per order (at upload, or at startup for orders recovered from the store) and carries
/// the last status the pipeline knew about, so that only genuine changes are published downstream. The job is
/// destroyed when the order reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheckJob {
    pub number: OrderNumber,
    pub status: OrderStatus,
}

impl StatusCheckJob {
    /// A job for a freshly uploaded order.
    pub fn new(number: OrderNumber) -> Self {
        Self { number, status: OrderStatus::New }
    }

    /// The same job, carrying a newly observed (non-terminal) status.
    pub fn with_status(self, status: OrderStatus) -> Self {
        Self { status, ..self }
    }
}

//--------------------------------------   StatusCheckResult   -------------------------------------------------------
/// A confirmed status change awaiting durable persistence.
///
/// Produced by the checker pool only when the observed remote status differs from the job's last-known status,
/// and consumed exactly once by the updater pool. `attempts` counts failed persistence tries so that requeues
/// stay bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheckResult {
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub accrual: Points,
    pub attempts: u32,
}

impl StatusCheckResult {
    pub fn new(number: OrderNumber, status: OrderStatus, accrual: Points) -> Self {
        Self { number, status, accrual, attempts: 0 }
    }

    /// The same result, with one more failed persistence attempt on record.
    pub fn retried(self) -> Self {
        Self { attempts: self.attempts + 1, ..self }
    }
}

//--------------------------------------    TransactionType    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Points credited from a processed accrual.
    Credit,
    /// Points withdrawn by the user against a new order.
    Debit,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Credit => write!(f, "CREDIT"),
            TransactionType::Debit => write!(f, "DEBIT"),
        }
    }
}

//--------------------------------------      Transaction      -------------------------------------------------------
/// A single ledger entry, as presented in the withdrawals history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    #[serde(rename = "order")]
    pub order_number: OrderNumber,
    #[serde(rename = "sum")]
    pub amount: Points,
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------        Balance        -------------------------------------------------------
/// Current balance and lifetime withdrawn total, both derived from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

//--------------------------------------         User          -------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
}
