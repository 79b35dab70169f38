use thiserror::Error;

use crate::db_types::User;

#[derive(Debug, Error)]
pub enum UserManagementError {
    #[error("The login is already taken")]
    LoginTaken,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for UserManagementError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Creates a new user and returns their id. Fails with [`UserManagementError::LoginTaken`] if the login is
    /// already in use.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, UserManagementError>;

    /// Fetches a user by login, or `None` if no such user exists.
    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<User>, UserManagementError>;
}
