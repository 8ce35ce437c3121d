/// Configuration management for Article Service
///
/// All settings come from environment variables (a `.env` file is loaded
/// first by `main`). Defaults match a local development setup.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// Admin API authentication
    pub auth: AuthConfig,
    /// Image proxy signing
    pub imgproxy: ImgProxyConfig,
    /// Pagination defaults
    pub pagination: PaginationConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Number of actix workers
    pub workers: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Min connections kept open
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
    /// Run embedded migrations at startup
    pub run_migrations: bool,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL
    pub url: String,
    /// When false, responses are never cached
    pub enabled: bool,
    /// Per-route TTLs
    pub ttl: RouteTtlConfig,
}

/// Response cache time-to-live per route, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTtlConfig {
    pub index: u64,
    pub detail: u64,
    pub query: u64,
    pub category: u64,
    pub api_data: u64,
    pub search_ad: u64,
    pub sitemap: u64,
}

impl Default for RouteTtlConfig {
    fn default() -> Self {
        Self {
            index: 300,
            detail: 7200,
            query: 7200,
            category: 7200,
            api_data: 7200,
            search_ad: 7200,
            sitemap: 86_400,
        }
    }
}

/// Shared-secret token for the ingestion API
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// imgproxy signing settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ImgProxyConfig {
    /// Hex-encoded HMAC key
    pub key: String,
    /// Hex-encoded HMAC salt
    pub salt: String,
    /// Public base URL the signed path is appended to
    pub base_url: String,
}

impl std::fmt::Debug for ImgProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgProxyConfig")
            .field("key", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Pagination defaults
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub page_size: usize,
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_page_size: 200,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = app_env.eq_ignore_ascii_case("production");

        let token = std::env::var("AUTH_TOKEN").unwrap_or_default();
        if is_production && token.trim().is_empty() {
            return Err("AUTH_TOKEN must be set in production".to_string());
        }

        let pagination = PaginationConfig {
            page_size: parse_env_or_default("PAGE_SIZE", 20usize)?.max(1),
            max_page_size: parse_env_or_default("MAX_PAGE_SIZE", 200usize)?.max(1),
        };
        if pagination.page_size > pagination.max_page_size {
            return Err(format!(
                "PAGE_SIZE ({}) cannot exceed MAX_PAGE_SIZE ({})",
                pagination.page_size, pagination.max_page_size
            ));
        }

        let ttl_defaults = RouteTtlConfig::default();

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("ARTICLE_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("ARTICLE_SERVICE_PORT", 8000u16)?,
                workers: parse_env_or_default("ARTICLE_SERVICE_WORKERS", 4usize)?.max(1),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if is_production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/articles".to_string()),
                max_connections: parse_env_or_default("DB_MAX_CONNECTIONS", 20u32)?,
                min_connections: parse_env_or_default("DB_MIN_CONNECTIONS", 2u32)?,
                acquire_timeout_secs: parse_env_or_default("DB_ACQUIRE_TIMEOUT_SECS", 10u64)?,
                run_migrations: parse_env_or_default("DB_RUN_MIGRATIONS", true)?,
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                enabled: parse_env_or_default("CACHE_ENABLED", true)?,
                ttl: RouteTtlConfig {
                    index: parse_env_or_default("CACHE_TIME_INDEX", ttl_defaults.index)?,
                    detail: parse_env_or_default("CACHE_TIME_DETAIL", ttl_defaults.detail)?,
                    query: parse_env_or_default("CACHE_TIME_Q", ttl_defaults.query)?,
                    category: parse_env_or_default("CACHE_TIME_CATEGORY", ttl_defaults.category)?,
                    api_data: parse_env_or_default("CACHE_TIME_API_DATA", ttl_defaults.api_data)?,
                    search_ad: parse_env_or_default(
                        "CACHE_TIME_SEARCH_AD",
                        ttl_defaults.search_ad,
                    )?,
                    sitemap: parse_env_or_default("CACHE_TIME_SITEMAP", ttl_defaults.sitemap)?,
                },
            },
            auth: AuthConfig { token },
            imgproxy: ImgProxyConfig {
                key: std::env::var("IMGPROXY_KEY").unwrap_or_default(),
                salt: std::env::var("IMGPROXY_SALT").unwrap_or_default(),
                base_url: std::env::var("PROJ_IMAGE_BASE_URL").unwrap_or_default(),
            },
            pagination,
        })
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
