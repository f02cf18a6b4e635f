use std::env;

/// Rate limit settings for the checkout route.
///
/// Configure via environment variables:
/// - RATE_LIMIT_MAX (default: 5)
/// - RATE_LIMIT_WINDOW_SECS (default: 60)
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
        }
    }
}

/// Stripe credentials and fixed product reference.
///
/// `api_base` is overridable (STRIPE_API_BASE) so tests can point the client
/// at a local stand-in.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub price_id: String,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base URL the success/cancel redirects point back to. Server-controlled,
    /// never taken from client input.
    pub app_url: String,
    pub allowed_origins: Vec<String>,
    pub stripe: StripeConfig,
    pub rate_limit: RateLimitConfig,
    pub redis_url: Option<String>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYGUARD_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let app_url =
            env::var("APP_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let rate_limit = RateLimitConfig {
            max_requests: env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        };

        let stripe = StripeConfig {
            secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            price_id: env::var("STRIPE_PRICE_ID").unwrap_or_default(),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "payguard.db".to_string()),
            app_url,
            allowed_origins,
            stripe,
            rate_limit,
            redis_url: env::var("REDIS_URL").ok(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
