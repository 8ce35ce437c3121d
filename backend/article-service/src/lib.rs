/// Article Service Library
///
/// Serves the article pages of a content site and the token-gated API that
/// feeds it.
///
/// # Modules
///
/// - `handlers`: HTTP handlers and route registration
/// - `services`: page assembly, ranking, pagination, projection, ingestion
/// - `db`: `ArticleStore` trait with PostgreSQL and in-memory stores
/// - `cache`: rendered-page cache (Redis, in-memory, no-op)
/// - `imgproxy`: signed image URLs
/// - `middleware`: admin token gate and request metrics
/// - `metrics`: Prometheus collectors
/// - `models`, `config`, `error`
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod imgproxy;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::AppState;
