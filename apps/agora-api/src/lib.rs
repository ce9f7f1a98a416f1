pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod threads;

use std::sync::Arc;

use auth::session::SessionManager;
use config::Config;
use db::pool::DbPool;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub sessions: SessionManager,
    pub config: Arc<Config>,
}
