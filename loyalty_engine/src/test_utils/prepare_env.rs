use log::*;

use crate::SqliteDatabase;

/// A fresh, fully migrated in-memory database.
///
/// The pool is capped at a single connection: every SQLite `:memory:` connection is its own database, so a
/// larger pool would scatter the schema across invisible siblings.
pub async fn new_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("Error creating in-memory database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🗃️ Test database ready");
    db
}
