//! Request handlers for the public API.
//!
//! All routes live under `/api/user`. Registration and login are open; everything else requires a bearer token
//! issued by [`TokenIssuer`]. Handlers stay thin: validation and status-code mapping here, all state changes in
//! the engine.
use actix_web::{get, post, web, HttpResponse};
use log::*;
use loyalty_engine::{
    db_types::{OrderNumber, StatusCheckJob},
    BalanceManagement,
    OrderManagement,
    OrderManagementError,
    SqliteDatabase,
    UserManagement,
};
use lps_common::Points;

use crate::{
    auth::{hash_password, verify_password, AuthenticatedUser, TokenIssuer},
    data_objects::{Credentials, TokenResponse, WithdrawalRequest},
    errors::{AuthError, ServerError},
    workers::QueueScheduler,
};

#[get("/health")]
pub async fn health() -> HttpResponse {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

#[post("/register")]
pub async fn register(
    body: web::Json<Credentials>,
    db: web::Data<SqliteDatabase>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let creds = body.into_inner();
    if !creds.is_well_formed() {
        return Err(ServerError::InvalidRequestBody("Login and password must both be non-empty".into()));
    }
    let hash = hash_password(&creds.password)?;
    let id = db.create_user(&creds.login, &hash).await?;
    info!("🔑️ Registered user {} (id {id})", creds.login);
    let token = issuer.issue(id)?;
    Ok(token_response(token))
}

#[post("/login")]
pub async fn login(
    body: web::Json<Credentials>,
    db: web::Data<SqliteDatabase>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let creds = body.into_inner();
    let user = db.fetch_user_by_login(&creds.login).await?.ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(&creds.password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }
    debug!("🔑️ User {} logged in", user.login);
    let token = issuer.issue(user.id)?;
    Ok(token_response(token))
}

/// Uploads a new order number (plain-text body) and hands it to the synchronization pipeline.
///
/// `202` for a fresh upload, `200` if this user already uploaded the number, `409` if another user owns it,
/// `422` if the checksum fails.
#[post("/orders")]
pub async fn create_order(
    body: String,
    user: AuthenticatedUser,
    db: web::Data<SqliteDatabase>,
    jobs: web::Data<QueueScheduler<StatusCheckJob>>,
) -> Result<HttpResponse, ServerError> {
    let number = parse_order_number(&body)?;
    match db.insert_order(user.id, &number).await {
        Ok(()) => {
            info!("📋️ User {} uploaded order {number}", user.id);
            jobs.submit(StatusCheckJob::new(number));
            Ok(HttpResponse::Accepted().finish())
        },
        // Idempotent re-upload by the same user.
        Err(OrderManagementError::OrderAlreadyUploaded(_)) => Ok(HttpResponse::Ok().finish()),
        Err(e) => Err(e.into()),
    }
}

#[get("/orders")]
pub async fn list_orders(
    user: AuthenticatedUser,
    db: web::Data<SqliteDatabase>,
) -> Result<HttpResponse, ServerError> {
    let orders = db.fetch_orders_for_user(user.id).await?;
    if orders.is_empty() {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::Ok().json(orders))
    }
}

#[get("/balance")]
pub async fn balance(
    user: AuthenticatedUser,
    db: web::Data<SqliteDatabase>,
) -> Result<HttpResponse, ServerError> {
    let balance = db.fetch_balance(user.id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[post("/balance/withdraw")]
pub async fn withdraw(
    body: web::Json<WithdrawalRequest>,
    user: AuthenticatedUser,
    db: web::Data<SqliteDatabase>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let number = parse_order_number(&request.order)?;
    if request.sum <= Points::ZERO {
        return Err(ServerError::InvalidRequestBody("The withdrawal amount must be positive".into()));
    }
    db.record_withdrawal(user.id, &number, request.sum).await?;
    info!("📋️ User {} withdrew {} against order {number}", user.id, request.sum);
    Ok(HttpResponse::Ok().finish())
}

#[get("/withdrawals")]
pub async fn withdrawals(
    user: AuthenticatedUser,
    db: web::Data<SqliteDatabase>,
) -> Result<HttpResponse, ServerError> {
    let withdrawals = db.fetch_withdrawals(user.id).await?;
    if withdrawals.is_empty() {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::Ok().json(withdrawals))
    }
}

/// `400` for bodies that are not a number at all, `422` for numbers that fail the checksum.
fn parse_order_number(raw: &str) -> Result<OrderNumber, ServerError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServerError::InvalidRequestBody("The request body must be an order number".into()));
    }
    let number = OrderNumber(raw.to_string());
    if !number.is_valid() {
        return Err(ServerError::InvalidOrderNumber);
    }
    Ok(number)
}

fn token_response(token: String) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .json(TokenResponse { token })
}
