use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    config::{AppConfig, DatabaseConfig, defaults},
    db::connection,
    middleware::{catch_panic_layer, json_error_middleware},
    routes::router,
    services::{ServiceContext, TodoService},
    state::AppState,
};

/// Fresh in-memory SQLite database with the schema in place.
pub async fn memory_db() -> DatabaseConnection {
    connection::connect(&DatabaseConfig::sqlite_memory())
        .await
        .expect("connect to in-memory sqlite")
}

pub async fn memory_state() -> Arc<AppState> {
    let mut cfg = AppConfig::default();
    cfg.database = Some(DatabaseConfig::sqlite_memory());
    AppState::new(cfg, memory_db().await)
}

/// Environment variable naming a Postgres database for the tests that need
/// a server-side backend; those tests are skipped when it is unset.
pub const TEST_POSTGRES_URL_VAR: &str = "APP_TEST_POSTGRES_URL";

/// SQLite file removed again when dropped.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("ranked_todo_{}.db", Uuid::new_v4()));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// State over a SQLite file with a multi-connection pool, so concurrent
/// requests contend for the database lock. Keep the returned file alive for
/// as long as the state is used.
pub async fn file_state(max_connections: u32) -> (Arc<AppState>, ScratchFile) {
    let file = ScratchFile::new();
    let database = DatabaseConfig {
        url: file.url(),
        max_connections,
        min_idle: 1,
    };
    (state_for(database).await, file)
}

/// State over the Postgres database named by [`TEST_POSTGRES_URL_VAR`].
pub async fn postgres_state(max_connections: u32) -> Option<Arc<AppState>> {
    let url = std::env::var(TEST_POSTGRES_URL_VAR).ok()?;
    let database = DatabaseConfig {
        url,
        max_connections,
        min_idle: 1,
    };
    Some(state_for(database).await)
}

async fn state_for(database: DatabaseConfig) -> Arc<AppState> {
    let db = connection::connect(&database)
        .await
        .expect("connect to test database");
    let mut cfg = AppConfig::default();
    cfg.todo.conflict_retries = defaults::MAX_CONFLICT_RETRIES;
    cfg.database = Some(database);
    AppState::new(cfg, db)
}

pub fn todo_service(state: &AppState) -> TodoService {
    ServiceContext::from_state(state).todo()
}

/// The router as `main` serves it, minus request tracing.
pub fn test_router(state: Arc<AppState>) -> Router {
    router(state)
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
}
