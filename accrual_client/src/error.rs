use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the accrual service: {0}")]
    RequestError(String),
    #[error("Could not deserialize accrual response: {0}")]
    JsonError(String),
    #[error("Accrual query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
