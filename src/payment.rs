//! Payment provider backed by the Stripe Checkout API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::collaborators::{PaymentProvider, PaymentVerification};
use crate::config::{PaymentConfig, RecoveryConfig};
use crate::errors::DownstreamError;
use crate::session::Identity;

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Form fields for a one-item card checkout
pub fn checkout_form(config: &PaymentConfig, identity: Identity) -> Vec<(&'static str, String)> {
    vec![
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][price_data][currency]", config.currency.clone()),
        (
            "line_items[0][price_data][product_data][name]",
            config.product_name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            config.product_description.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            config.price_amount.to_string(),
        ),
        ("line_items[0][quantity]", "1".to_string()),
        ("mode", "payment".to_string()),
        ("success_url", config.success_url.clone()),
        ("cancel_url", config.cancel_url.clone()),
        ("client_reference_id", identity.to_string()),
    ]
}

/// Decide whether a fetched checkout counts as paid
fn verification_from(session: CheckoutSession, test_mode: bool) -> PaymentVerification {
    let identity = session
        .client_reference_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(Identity);
    let paid = session.payment_status.as_deref() == Some("paid");

    if test_mode && !paid {
        info!(session_id = %session.id, "Test mode: treating checkout as paid");
    }

    PaymentVerification {
        confirmed: paid || test_mode,
        identity,
        reference: session.id,
    }
}

pub struct StripeClient {
    client: Client,
    config: PaymentConfig,
}

impl StripeClient {
    pub fn new(config: PaymentConfig, recovery: &RecoveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()
            .context("Failed to create HTTP client for Stripe")?;

        if config.price_amount < 5000 {
            warn!(amount = config.price_amount, "Payment amount may be too small for Stripe");
        }

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, DownstreamError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DownstreamError::PaymentProvider(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|err| err.error.message)
                .unwrap_or(body);
            return Err(DownstreamError::PaymentProvider(format!("HTTP {status}: {message}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| DownstreamError::PaymentProvider(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_payment_link(&self, identity: Identity) -> Result<String, DownstreamError> {
        info!(user_id = %identity, "Creating checkout session");

        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.config.secret_key)
            .form(&checkout_form(&self.config, identity))
            .send()
            .await
            .map_err(|e| DownstreamError::PaymentProvider(format!("Stripe request failed: {e}")))?;

        let session: CheckoutSession = Self::parse(response).await?;
        debug!(user_id = %identity, session_id = %session.id, "Checkout session created");

        session
            .url
            .ok_or_else(|| DownstreamError::PaymentProvider("Checkout session has no URL".to_string()))
    }

    async fn verify_payment(&self, token: &str) -> Result<PaymentVerification, DownstreamError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DownstreamError::PaymentProvider("empty session ID".to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("/v1/checkout/sessions/{token}")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| DownstreamError::PaymentProvider(format!("Stripe request failed: {e}")))?;

        let session: CheckoutSession = Self::parse(response).await?;
        debug!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            client_reference_id = ?session.client_reference_id,
            "Fetched checkout session"
        );

        Ok(verification_from(session, self.config.test_mode))
    }
}
