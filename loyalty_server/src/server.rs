use accrual_client::AccrualApi;
use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{db_types::StatusCheckJob, SqliteDatabase};
use tokio_util::sync::CancellationToken;

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    routes,
    workers::{start_pipeline, QueueScheduler},
};

const POOL_SIZE: u32 = 25;

/// Brings up the full service: store (with migrations), synchronization pipeline and HTTP server. Returns once
/// the HTTP server exits, after the pipeline has drained.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, POOL_SIZE)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database: {e}")))?;
    db.run_migrations()
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not run database migrations: {e}")))?;
    let client = AccrualApi::new(&config.accrual_url)
        .map_err(|e| ServerError::InitializeError(format!("Could not create the accrual client: {e}")))?;
    let cancel = CancellationToken::new();
    let pipeline = start_pipeline(db.clone(), client, &config.sync, cancel);
    let server = create_server_instance(&config, db, pipeline.job_queue())?;
    let result = server.await;
    pipeline.shutdown().await;
    result?;
    Ok(())
}

/// Builds the HTTP server without starting the pipeline. Kept separate so tests can exercise the app with
/// their own store and job queue.
pub fn create_server_instance(
    config: &ServerConfig,
    db: SqliteDatabase,
    jobs: QueueScheduler<StatusCheckJob>,
) -> Result<Server, ServerError> {
    let issuer = TokenIssuer::new(&config.auth);
    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("access_log"))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(issuer.clone()))
            .app_data(web::Data::new(jobs.clone()))
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
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(server)
}
