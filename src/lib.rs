use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
pub type DbPool = Pool<SqliteConnectionManager>;

use crate::engine::ModerationEngine;
use crate::models::db_operations::SqliteStore;

pub type Engine = ModerationEngine<SqliteStore>;

/// Shared by every actix worker.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub trusted_gateway_ips: String,
}

pub mod config;
pub mod engine;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
