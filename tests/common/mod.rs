//! Test utilities and fixtures for Payguard integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::MockConnectInfo;
use axum::routing::{get, post};
use axum::{body::Body, http::Request, Router};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;

pub use payguard::config::{RateLimitConfig, StripeConfig};
pub use payguard::db::{init_db, queries, AppState};
pub use payguard::handlers;
pub use payguard::models::{PaymentStatus, RequestStatus};
pub use payguard::payments::StripeClient;
pub use payguard::rate_limit::InMemoryRateLimiter;
pub use payguard::security::csrf;
pub use payguard::security::origin::OriginAllowlist;

/// Origin allowlisted in every test state.
pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Webhook secret wired into every test state (unless removed).
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Builder for test `AppState`. Defaults: generous rate limit, webhook
/// secret set, and a gateway base pointing at a closed port so an
/// unexpected gateway call fails fast instead of hitting the network.
pub struct TestState {
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    rate_limit: RateLimitConfig,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            api_base: "http://127.0.0.1:9".to_string(),
            secret_key: Some("sk_test_xxx".to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            rate_limit: RateLimitConfig {
                max_requests: 1000,
                window_secs: 60,
            },
        }
    }

    /// Point the gateway client at a local stand-in (see `spawn_gateway_stub`).
    pub fn api_base(mut self, base: &str) -> Self {
        self.api_base = base.to_string();
        self
    }

    pub fn no_secret_key(mut self) -> Self {
        self.secret_key = None;
        self
    }

    pub fn no_webhook_secret(mut self) -> Self {
        self.webhook_secret = None;
        self
    }

    pub fn rate_limit(mut self, max_requests: u32, window_secs: u64) -> Self {
        self.rate_limit = RateLimitConfig {
            max_requests,
            window_secs,
        };
        self
    }

    pub fn build(self) -> AppState {
        // max_size 1: every pooled checkout sees the same in-memory database
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        {
            let conn = pool.get().unwrap();
            init_db(&conn).unwrap();
        }

        let stripe_config = StripeConfig {
            secret_key: self.secret_key,
            price_id: "price_test_123".to_string(),
            webhook_secret: self.webhook_secret,
            api_base: self.api_base,
        };

        AppState {
            db: pool,
            stripe: StripeClient::new(&stripe_config),
            origins: Arc::new(OriginAllowlist::new([TEST_ORIGIN])),
            limiter: Arc::new(InMemoryRateLimiter::new(&self.rate_limit)),
            app_url: TEST_ORIGIN.to_string(),
            dev_mode: true,
        }
    }
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_state() -> AppState {
    TestState::new().build()
}

/// Build the full router with a mock peer address for rate-limit identity.
pub fn app(state: AppState) -> Router {
    app_with_peer(state, "127.0.0.1:12345".parse().unwrap())
}

pub fn app_with_peer(state: AppState, peer: SocketAddr) -> Router {
    handlers::router(state.clone())
        .layer(MockConnectInfo(peer))
        .with_state(state)
}

/// Spawn a local gateway stand-in that answers the two calls the client
/// makes, and return its base URL.
pub async fn spawn_gateway_stub() -> String {
    let app = Router::new()
        .route(
            "/v1/checkout/sessions",
            post(|| async {
                axum::Json(serde_json::json!({
                    "id": "cs_test_123",
                    "url": "https://checkout.stripe.com/c/pay/cs_test_123"
                }))
            }),
        )
        .route(
            "/v1/account",
            get(|| async { axum::Json(serde_json::json!({ "id": "acct_test_123" })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Spawn a gateway stand-in that always fails session creation with the
/// given HTTP status and error body.
pub async fn spawn_failing_gateway_stub(status: u16, error_body: Value) -> String {
    let app = Router::new().route(
        "/v1/checkout/sessions",
        post(move || {
            let body = error_body.clone();
            async move {
                (
                    axum::http::StatusCode::from_u16(status).unwrap(),
                    axum::Json(body),
                )
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Build a gated POST /checkout request with the given origin and tokens.
pub fn checkout_request(origin: &str, cookie_token: &str, header_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .header("origin", origin)
        .header("cookie", format!("csrf_token={}", cookie_token))
        .header("x-csrf-token", header_token)
        .body(Body::from("{}"))
        .unwrap()
}

/// Compute a valid `stripe-signature` header for a payload.
pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Build a signed POST /webhook request for a payload.
pub fn webhook_request(payload: &[u8], secret: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = compute_stripe_signature(payload, secret, &timestamp);
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("stripe-signature", format!("t={},v1={}", timestamp, signature))
        .body(Body::from(payload.to_vec()))
        .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
