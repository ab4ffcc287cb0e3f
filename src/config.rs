//! # Configuration Module
//!
//! This module defines configuration structures for the bot: dialog limits,
//! recovery settings for collaborator calls, payment product settings and the
//! environment-driven application configuration that ties them together.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{info, warn};

// Constants for dialog configuration
pub const DEFAULT_PORT: u16 = 4242;
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 2000;
pub const DEFAULT_EVENT_ID_HIGH_WATER: usize = 10_000;
pub const DEFAULT_EVENT_ID_LOW_WATER: usize = 5_000;
pub const DEFAULT_MAX_COMPLETION_REQUESTS: u32 = 10;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_STRIPE_BASE_URL: &str = "https://api.stripe.com";

/// Dialog engine configuration
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// Window within which an identical command or callback is a repeat
    pub dedup_window: Duration,
    /// Size of the recent event-id set that triggers compaction
    pub event_id_high_water: usize,
    /// Size the recent event-id set is compacted down to
    pub event_id_low_water: usize,
    /// Free-text questions answered per session after completion
    pub max_completion_requests: u32,
    /// Idle time after which a session may be evicted (None keeps sessions forever)
    pub session_ttl: Option<Duration>,
    /// Whether `/complete_payment` is honoured
    pub enable_debug_commands: bool,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_millis(DEFAULT_DEDUP_WINDOW_MS),
            event_id_high_water: DEFAULT_EVENT_ID_HIGH_WATER,
            event_id_low_water: DEFAULT_EVENT_ID_LOW_WATER,
            max_completion_requests: DEFAULT_MAX_COMPLETION_REQUESTS,
            session_ttl: None,
            enable_debug_commands: false,
        }
    }
}

/// Recovery configuration for collaborator calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts for message delivery
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for completion requests in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 3,
            circuit_breaker_reset_secs: 300, // 5 minutes
        }
    }
}

/// Checkout product and provider settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub product_name: String,
    pub product_description: String,
    /// Price in minor currency units (cents, kopecks)
    pub price_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub secret_key: String,
    /// Treat every fetched checkout session as paid
    pub test_mode: bool,
    pub api_base_url: String,
}

impl PaymentConfig {
    /// Build the default product with redirect URLs rooted at `base_url`
    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            product_name: "Personalized Fitness Program".to_string(),
            product_description:
                "Individual workout program created based on your parameters and goals"
                    .to_string(),
            price_amount: 5000,
            currency: "rub".to_string(),
            success_url: format!("{base_url}/payment/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base_url}/payment/cancel?session_id={{CHECKOUT_SESSION_ID}}"),
            secret_key: String::new(),
            test_mode: false,
            api_base_url: DEFAULT_STRIPE_BASE_URL.to_string(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self::with_base_url(&format!("http://localhost:{DEFAULT_PORT}"))
    }
}

/// Completion service settings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// Always answer locally without calling the API
    pub use_fallback: bool,
    pub api_base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            use_fallback: false,
            api_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

/// Complete application configuration assembled from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub port: u16,
    pub json_logs: bool,
    pub dialog: DialogConfig,
    pub recovery: RecoveryConfig,
    pub openai: OpenAiConfig,
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let flag = |key: &str| var(key).is_some_and(|value| value.trim() == "true");

        let telegram_token =
            var("TELEGRAM_BOT_TOKEN").ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;
        let openai_token =
            var("OPENAI_TOKEN").ok_or_else(|| anyhow!("OPENAI_TOKEN must be set"))?;

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("PORT must be a valid port number: {e}"))?,
            None => {
                info!(port = DEFAULT_PORT, "Using default port");
                DEFAULT_PORT
            }
        };

        let base_url = var("BOT_WEBHOOK_BASE_URL").unwrap_or_else(|| {
            warn!("BOT_WEBHOOK_BASE_URL not set, payment redirects point to localhost");
            format!("http://localhost:{port}")
        });

        let mut payment = PaymentConfig::with_base_url(&base_url);
        payment.test_mode = flag("STRIPE_TEST_MODE");
        payment.secret_key = var("STRIPE_SECRET_KEY").unwrap_or_default();
        if payment.secret_key.is_empty() {
            warn!("STRIPE_SECRET_KEY not set, payment link creation will fail");
        }

        let openai = OpenAiConfig {
            api_key: openai_token,
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            use_fallback: flag("USE_OPENAI_FALLBACK"),
            ..OpenAiConfig::default()
        };

        let session_ttl = match var("SESSION_TTL_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse::<u64>().map_err(
                |e| anyhow!("SESSION_TTL_SECS must be a number of seconds: {e}"),
            )?)),
            None => None,
        };

        let dialog = DialogConfig {
            session_ttl,
            enable_debug_commands: flag("ENABLE_DEBUG_COMMANDS"),
            ..DialogConfig::default()
        };

        Ok(Self {
            telegram_token,
            port,
            json_logs: var("LOG_FORMAT").is_some_and(|value| value.trim() == "json"),
            dialog,
            recovery: RecoveryConfig::default(),
            openai,
            payment,
        })
    }
}
