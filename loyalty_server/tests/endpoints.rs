//! Exercises the public API against an in-memory store, with the synchronization pipeline replaced by a
//! hand-held job queue so tests can observe what the upload route submits.
use std::time::Duration;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    web,
    App,
    Error,
};
use loyalty_engine::{
    db_types::{OrderStatus, StatusCheckJob},
    test_utils::new_test_db,
    OrderManagement,
    SqliteDatabase,
};
use loyalty_server::{
    auth::TokenIssuer,
    config::AuthConfig,
    routes,
    workers::{QueueScheduler, QUEUE_CAPACITY},
};
use lps_common::{Points, Secret};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

fn token_issuer() -> TokenIssuer {
    TokenIssuer::new(&AuthConfig { hmac_secret: Secret::new("endpoint-test-secret") })
}

fn job_queue() -> (QueueScheduler<StatusCheckJob>, mpsc::Receiver<StatusCheckJob>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (QueueScheduler::new(tx, TaskTracker::new(), CancellationToken::new()), rx)
}

async fn spawn_app(
    db: SqliteDatabase,
    jobs: QueueScheduler<StatusCheckJob>,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(db))
            .app_data(web::Data::new(token_issuer()))
            .app_data(web::Data::new(jobs))
            .service(routes::health)
            .service(
                web::scope("/api/user")
                    .service(routes::register)
                    .service(routes::login)
                    .service(routes::create_order)
                    .service(routes::list_orders)
                    .service(routes::balance)
                    .service(routes::withdraw)
                    .service(routes::withdrawals),
            ),
    )
    .await
}

async fn register<S, B>(app: &S, login: &str, password: &str) -> (StatusCode, Option<String>)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/user/register")
        .set_json(json!({"login": login, "password": password}))
        .to_request();
    let res = test::call_service(app, req).await;
    let status = res.status();
    let token = res
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from);
    (status, token)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn registration_and_login() {
    let db = new_test_db().await;
    let (jobs, _rx) = job_queue();
    let app = spawn_app(db, jobs).await;

    let (status, token) = register(&app, "alice", "hunter2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(token.is_some());

    // The login is now taken.
    let (status, _) = register(&app, "alice", "another-password").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Blank credentials never reach the store.
    let (status, _) = register(&app, "  ", "pw").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/user/login")
        .set_json(json!({"login": "alice", "password": "wrong"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/user/login")
        .set_json(json!({"login": "nobody", "password": "hunter2"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/user/login")
        .set_json(json!({"login": "alice", "password": "hunter2"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("Authorization"));
}

#[actix_web::test]
async fn order_upload_rules() {
    let db = new_test_db().await;
    let (jobs, mut rx) = job_queue();
    let app = spawn_app(db, jobs).await;
    let (_, alice) = register(&app, "alice", "pw").await;
    let (_, bob) = register(&app, "bob", "pw").await;
    let (alice, bob) = (alice.unwrap(), bob.unwrap());

    // No token, no upload.
    let req = test::TestRequest::post().uri("/api/user/orders").set_payload("711388585544181").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&alice))
        .set_payload("711388585544181")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    // A fresh upload lands on the pipeline's job queue.
    let job = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(job.number.as_str(), "711388585544181");
    assert_eq!(job.status, OrderStatus::New);

    // Re-upload by the owner is idempotent and does not create a second job.
    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&alice))
        .set_payload("711388585544181")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err());

    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&bob))
        .set_payload("711388585544181")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Bad checksum.
    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&alice))
        .set_payload("711388585544182")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Not a number at all.
    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&alice))
        .set_payload("not-an-order")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_listing() {
    let db = new_test_db().await;
    let (jobs, _rx) = job_queue();
    let app = spawn_app(db, jobs).await;
    let (_, token) = register(&app, "alice", "pw").await;
    let token = token.unwrap();

    let req = test::TestRequest::get().uri("/api/user/orders").insert_header(bearer(&token)).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&token))
        .set_payload("711388585544181")
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/user/orders").insert_header(bearer(&token)).to_request();
    let orders: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["number"], "711388585544181");
    assert_eq!(orders[0]["status"], "NEW");
}

#[actix_web::test]
async fn balance_and_withdrawals() {
    let db = new_test_db().await;
    let (jobs, _rx) = job_queue();
    let app = spawn_app(db.clone(), jobs).await;
    let (_, token) = register(&app, "alice", "pw").await;
    let token = token.unwrap();

    let req = test::TestRequest::get().uri("/api/user/balance").insert_header(bearer(&token)).to_request();
    let balance: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(balance["current"], json!(0.0));
    assert_eq!(balance["withdrawn"], json!(0.0));

    // Nothing to spend yet.
    let req = test::TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(bearer(&token))
        .set_json(json!({"order": "2377225624", "sum": 100}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);

    // Credit the account by driving an uploaded order to Processed directly through the store.
    let req = test::TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(bearer(&token))
        .set_payload("711388585544181")
        .to_request();
    test::call_service(&app, req).await;
    let number = "711388585544181".parse().unwrap();
    db.update_order_status(&number, OrderStatus::Processed, Points::from_whole(500)).await.unwrap();

    let req = test::TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(bearer(&token))
        .set_json(json!({"order": "2377225624", "sum": 100.5}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // The same order number cannot fund two withdrawals.
    let req = test::TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(bearer(&token))
        .set_json(json!({"order": "2377225624", "sum": 1}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // A bad checksum is rejected before touching the ledger.
    let req = test::TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(bearer(&token))
        .set_json(json!({"order": "12345", "sum": 1}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get().uri("/api/user/balance").insert_header(bearer(&token)).to_request();
    let balance: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(balance["current"], json!(399.5));
    assert_eq!(balance["withdrawn"], json!(100.5));

    let req = test::TestRequest::get().uri("/api/user/withdrawals").insert_header(bearer(&token)).to_request();
    let withdrawals: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(withdrawals.as_array().unwrap().len(), 1);
    assert_eq!(withdrawals[0]["order"], "2377225624");
    assert_eq!(withdrawals[0]["sum"], json!(100.5));

    // A user with no withdrawals gets 204.
    let (_, bob) = register(&app, "bob", "pw").await;
    let req = test::TestRequest::get().uri("/api/user/withdrawals").insert_header(bearer(&bob.unwrap())).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn health_check() {
    let db = new_test_db().await;
    let (jobs, _rx) = job_queue();
    let app = spawn_app(db, jobs).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n".as_bytes());
}
