use sqlx::SqliteConnection;

use crate::{
    db::is_unique_violation,
    db_types::User,
    traits::UserManagementError,
};

pub async fn insert_user(
    login: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, UserManagementError> {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING id")
        .bind(login)
        .bind(password_hash)
        .fetch_one(conn)
        .await
        .map_err(|e| if is_unique_violation(&e) { UserManagementError::LoginTaken } else { e.into() })?;
    Ok(id)
}

pub async fn fetch_user_by_login(
    login: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, UserManagementError> {
    let user = sqlx::query_as::<_, User>("SELECT id, login, password_hash FROM users WHERE login = $1 LIMIT 1")
        .bind(login)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}
