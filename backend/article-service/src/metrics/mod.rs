//! Prometheus metrics for article-service.
//!
//! Exposes page, cache, ingestion and pool collectors plus an HTTP handler
//! for the `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use sqlx::PgPool;

lazy_static! {
    /// HTTP requests by method, route pattern and status.
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "article_http_requests_total",
        "Total HTTP requests",
        &["method", "route", "status"]
    )
    .expect("failed to register article_http_requests_total");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "article_http_request_duration_seconds",
        "HTTP request latency",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("failed to register article_http_request_duration_seconds");

    /// Page cache events (hit/miss/error) by route.
    pub static ref PAGE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "article_page_cache_events_total",
        "Page cache events segmented by route and outcome",
        &["route", "event"]
    )
    .expect("failed to register article_page_cache_events_total");

    /// Page cache write results (success/error).
    pub static ref PAGE_CACHE_WRITE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "article_page_cache_write_total",
        "Page cache write attempts segmented by outcome",
        &["result"]
    )
    .expect("failed to register article_page_cache_write_total");

    /// Ingestion items by kind (article/search_ad) and outcome (success/error).
    pub static ref INGESTION_ITEMS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "article_ingestion_items_total",
        "Ingested items segmented by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("failed to register article_ingestion_items_total");

    /// Size of assembled candidate sequences, curated vs fallback.
    pub static ref ASSEMBLED_ARTICLES: HistogramVec = register_histogram_vec!(
        "article_assembled_sequence_size",
        "Number of articles in assembled sequences segmented by part",
        &["part"],
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]
    )
    .expect("failed to register article_assembled_sequence_size");

    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "article_db_pool_connections",
        "Database pool connection count by state",
        &["state"]
    )
    .expect("failed to register article_db_pool_connections");
}

/// Refresh pool gauges (idle/active/max)
pub fn update_pool_metrics(pool: &PgPool) {
    let size = pool.size() as i64;
    let idle = pool.num_idle() as i64;

    DB_POOL_CONNECTIONS.with_label_values(&["idle"]).set(idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(size - idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(pool.options().get_max_connections() as i64);
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
