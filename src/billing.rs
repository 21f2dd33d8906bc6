//! Billing server for AIBud Pro upgrades
//!
//! A small HTTP server that creates Stripe Checkout sessions for the Pro
//! subscription. The Stripe secret never leaves this process; clients only
//! receive the hosted checkout URL to open in a browser.

use crate::config::BillingConfig;
use crate::error::{AibudError, Result};
use crate::storage::KvStorage;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default Stripe API base
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Client for the Stripe Checkout API
pub struct StripeClient {
    client: reqwest::Client,
    config: BillingConfig,
}

/// Response body for a successful checkout-session creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    /// Hosted checkout page URL to open in a browser
    pub url: String,
}

/// Error body returned to clients on failure
#[derive(Debug, Serialize, Deserialize)]
pub struct BillingErrorResponse {
    pub error: String,
}

/// Relevant subset of Stripe's checkout-session object
#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    url: String,
}

/// Query parameters the browser carries back from Stripe Checkout
#[derive(Debug, Deserialize)]
struct ReturnParams {
    #[serde(default)]
    success: Option<String>,
    #[serde(default)]
    canceled: Option<String>,
}

/// Shared state for the billing router
#[derive(Clone)]
struct BillingState {
    stripe: Arc<StripeClient>,
    storage: Arc<KvStorage>,
}

impl StripeClient {
    /// Create a new Stripe client
    ///
    /// # Errors
    ///
    /// Returns [`AibudError::MissingCredentials`] when no secret key is
    /// configured, or a billing error if HTTP client initialization fails.
    pub fn new(config: BillingConfig) -> Result<Self> {
        if config.stripe_secret_key.as_deref().unwrap_or("").is_empty() {
            return Err(AibudError::MissingCredentials("stripe".to_string()).into());
        }

        let client = reqwest::Client::builder()
            .user_agent("aibud/0.2.0")
            .build()
            .map_err(|e| AibudError::Billing(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_base(&self) -> &str {
        self.config
            .stripe_api_base
            .as_deref()
            .unwrap_or(DEFAULT_STRIPE_API_BASE)
    }

    /// Create a subscription checkout session and return its hosted URL
    ///
    /// The browser returns to the configured return URL with `?success=true`
    /// after payment or `?canceled=true` when the user backs out.
    ///
    /// # Errors
    ///
    /// Returns [`AibudError::Billing`] on transport failure, a non-2xx Stripe
    /// response, or a session created without a URL.
    pub async fn create_checkout_session(&self) -> Result<String> {
        let url = format!("{}/v1/checkout/sessions", self.api_base());
        let secret = self
            .config
            .stripe_secret_key
            .as_deref()
            .unwrap_or_default();

        let form = [
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{}/?success=true", self.config.return_url),
            ),
            (
                "cancel_url",
                format!("{}/?canceled=true", self.config.return_url),
            ),
        ];

        tracing::debug!("Creating checkout session: price={}", self.config.price_id);

        let response = self
            .client
            .post(&url)
            .basic_auth(secret, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AibudError::Billing(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Stripe returned error {}: {}", status, error_text);
            return Err(AibudError::Billing(format!(
                "Stripe returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            AibudError::Billing(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(session.url)
    }
}

/// Build the billing router
///
/// `POST /create-checkout-session` creates a checkout session and returns
/// `{ "url": ... }`, or a 500 with `{ "error": ... }` when session creation
/// fails. `GET /` doubles as the liveness probe and the checkout return
/// target: the browser comes back with `?success=true` after payment, which
/// enables Pro in the persisted state, or `?canceled=true` when the user
/// backs out.
pub fn router(stripe: Arc<StripeClient>, storage: Arc<KvStorage>) -> Router {
    Router::new()
        .route("/", get(checkout_return))
        .route("/create-checkout-session", post(create_checkout_session))
        .with_state(BillingState { stripe, storage })
}

async fn checkout_return(
    State(state): State<BillingState>,
    Query(params): Query<ReturnParams>,
) -> impl IntoResponse {
    if params.success.as_deref() == Some("true") {
        return match state.storage.save_is_pro(true) {
            Ok(()) => {
                tracing::info!("Checkout completed, Pro enabled");
                (
                    StatusCode::OK,
                    "Payment successful! AIBud Pro is enabled for this profile.",
                )
                    .into_response()
            }
            Err(e) => {
                tracing::error!("Failed to persist Pro flag: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment succeeded but enabling Pro failed; retry the return URL.",
                )
                    .into_response()
            }
        };
    }

    if params.canceled.as_deref() == Some("true") {
        return (StatusCode::OK, "Checkout canceled.").into_response();
    }

    "AIBud billing server is running".into_response()
}

async fn create_checkout_session(State(state): State<BillingState>) -> impl IntoResponse {
    match state.stripe.create_checkout_session().await {
        Ok(url) => {
            tracing::info!("Created checkout session");
            (StatusCode::OK, Json(CheckoutSessionResponse { url })).into_response()
        }
        Err(e) => {
            tracing::error!("Checkout session creation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BillingErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Run the billing server until the process is stopped
///
/// # Errors
///
/// Returns error if the Stripe client cannot be created, persisted state
/// cannot be opened, or the listen address cannot be bound.
pub async fn serve(config: BillingConfig) -> Result<()> {
    let port = config.port;
    let stripe = Arc::new(StripeClient::new(config)?);
    let storage = Arc::new(KvStorage::new()?);
    let app = router(stripe, storage);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AibudError::Billing(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Billing server listening on {}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| AibudError::Billing(format!("Billing server failed: {}", e)).into())
}
