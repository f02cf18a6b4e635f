mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::StripeClient;
use crate::rate_limit::RateLimiter;
use crate::security::origin::OriginAllowlist;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool, gateway client, and gates.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub stripe: StripeClient,
    pub origins: Arc<OriginAllowlist>,
    pub limiter: Arc<dyn RateLimiter>,
    /// Base URL for success/cancel redirects (e.g. https://shop.example.com)
    pub app_url: String,
    pub dev_mode: bool,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
