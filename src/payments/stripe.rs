use std::time::Duration;

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

// Note: We use a pre-configured Price (STRIPE_PRICE_ID) instead of ad-hoc
// price_data. This keeps the product reference server-controlled and the
// payments organized in the Stripe dashboard.

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    // Stripe can return a session with no redirect URL; fail fast if so
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize, Default)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeAccount {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: Option<String>,
    price_id: String,
    webhook_secret: Option<String>,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        // Bounded round trips: a slow gateway must never hang a request
        // forever (the pending row is already committed by the time we call).
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build http client");

        Self {
            client,
            secret_key: config.secret_key.clone(),
            price_id: config.price_id.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| AppError::Misconfigured("STRIPE_SECRET_KEY is not set".into()))
    }

    /// Create a one-time Checkout session.
    ///
    /// `idempotency_key` dedups this call at the gateway against transport
    /// retries; the correlation id rides along in metadata so the webhook
    /// can settle the originating request row. Success/cancel URLs are
    /// server-controlled.
    pub async fn create_checkout_session(
        &self,
        idempotency_key: &str,
        correlation_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let secret_key = self.secret_key()?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(&[
                ("mode", "payment"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
                ("line_items[0][price]", self.price_id.as_str()),
                ("line_items[0][quantity]", "1"),
                ("client_reference_id", correlation_id),
                ("metadata[correlation_id]", correlation_id),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway {
                status: StatusCode::BAD_GATEWAY,
                code: "gateway_unreachable".into(),
                message: format!("Stripe API error: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| AppError::Internal(format!("Session {} has no checkout url", session.id)))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    /// Gateway connectivity check: retrieve the account for the configured key.
    pub async fn ping(&self) -> Result<StripeAccount> {
        let secret_key = self.secret_key()?;

        let response = self
            .client
            .get(format!("{}/v1/account", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Gateway {
                status: StatusCode::BAD_GATEWAY,
                code: "gateway_unreachable".into(),
                message: format!("Stripe API error: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Allowed clock skew into the future (in seconds).
    const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let webhook_secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Misconfigured("STRIPE_WEBHOOK_SECRET is not set".into()))?;

        // Stripe signature format: t=timestamp,v1=signature
        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;

        // Parse and validate the timestamp to bound replay of captured
        // deliveries (the event ledger catches anything inside the window).
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid timestamp in signature".into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        if age < -Self::WEBHOOK_FUTURE_SKEW_SECS {
            tracing::warn!("Webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        // Recompute the signature over the exact bytes received. The payload
        // must never be re-encoded or parsed before this point, so the raw
        // bytes go straight into the MAC.
        let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison; an attacker must not be able to measure
        // their way to a valid signature byte-by-byte.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Map a non-2xx gateway response onto the internal error taxonomy:
/// caller-attributable card/request errors become 400s, provider-side and
/// permission errors become 502s. The provider message passes through only
/// for the caller-attributable class.
async fn map_error_response(response: reqwest::Response) -> AppError {
    let http_status = response.status();
    let body: StripeErrorBody = response.json().await.unwrap_or_default();

    let kind = body.error.kind.unwrap_or_default();
    let caller_fault = matches!(kind.as_str(), "card_error" | "invalid_request_error");

    let code = body
        .error
        .code
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| {
            if kind.is_empty() {
                "gateway_error".to_string()
            } else {
                kind.clone()
            }
        });

    let message = if caller_fault {
        body.error
            .message
            .unwrap_or_else(|| "Payment could not be processed".to_string())
    } else {
        tracing::error!(
            "Stripe error ({}): type={} message={:?}",
            http_status,
            kind,
            body.error.message
        );
        "Payment gateway error".to_string()
    };

    AppError::Gateway {
        status: if caller_fault {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        },
        code,
        message,
    }
}
