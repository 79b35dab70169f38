use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use loyalty_engine::{BalanceError, OrderManagementError, UserManagementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The order number failed validation")]
    InvalidOrderNumber,
    #[error("The order number has already been used")]
    OrderConflict,
    #[error("The login is already taken")]
    LoginTaken,
    #[error("The balance does not cover the withdrawal")]
    InsufficientFunds,
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderConflict => StatusCode::CONFLICT,
            Self::LoginTaken => StatusCode::CONFLICT,
            Self::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            Self::AuthenticationError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::HashingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid login or password.")]
    InvalidCredentials,
    #[error("Access token is invalid or expired. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Could not hash the password. {0}")]
    HashingError(String),
}

impl From<UserManagementError> for ServerError {
    fn from(e: UserManagementError) -> Self {
        match e {
            UserManagementError::LoginTaken => Self::LoginTaken,
            UserManagementError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}

impl From<OrderManagementError> for ServerError {
    fn from(e: OrderManagementError) -> Self {
        match e {
            OrderManagementError::OrderOwnedByAnotherUser(_) => Self::OrderConflict,
            OrderManagementError::OrderAlreadyUploaded(_) |
            OrderManagementError::OrderNotFound(_) |
            OrderManagementError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<BalanceError> for ServerError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::InsufficientFunds => Self::InsufficientFunds,
            BalanceError::OrderAlreadyUsed(_) => Self::OrderConflict,
            BalanceError::DatabaseError(e) => Self::BackendError(e),
        }
    }
}
