//! Completion service backed by the OpenAI chat-completions API.
//!
//! When fallback mode is configured, or the circuit breaker is open after
//! repeated failures, answers are produced locally without calling the API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::collaborators::CompletionProvider;
use crate::config::{OpenAiConfig, RecoveryConfig};
use crate::errors::DownstreamError;
use crate::localization::{t_args_lang, t_lang};

const SYSTEM_PROMPT: &str = "You are an experienced fitness trainer and nutritionist. Your task is to provide personalized recommendations \
based on user data, which will be provided in JSON format at the beginning of the request. \
Consider gender, age, height, weight, diabetes status, fitness level, and user goals. \
Always give practical, science-based advice that can be applied immediately. \
Never give advice that could be dangerous to health. \
Your responses should be personalized, specific, and motivating.";

const MAX_TOKENS: u32 = 2500;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Whether a prompt asks for a full programme rather than a single answer
pub fn is_plan_request(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    lower.contains("workout program") || lower.contains("training plan")
}

/// Canned answer used when the API is not called
pub fn fallback_response(prompt: &str) -> String {
    if is_plan_request(prompt) {
        t_lang("fallback-plan", None)
    } else {
        let time = Utc::now().format("%H:%M:%S").to_string();
        t_args_lang("fallback-advice", &[("time", &time)], None)
    }
}

pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    circuit_breaker: CircuitBreaker,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, recovery: RecoveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()
            .context("Failed to create HTTP client for OpenAI")?;

        if config.use_fallback {
            info!("OpenAI fallback mode enabled, completions are answered locally");
        }

        Ok(Self {
            client,
            config,
            circuit_breaker: CircuitBreaker::new(recovery),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.api_base_url.trim_end_matches('/')
        )
    }

    async fn request(&self, prompt: &str) -> Result<String, DownstreamError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DownstreamError::Unavailable(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DownstreamError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DownstreamError::Unavailable(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DownstreamError::Unavailable(format!("Failed to parse OpenAI response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DownstreamError::Unavailable("No response from OpenAI".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, DownstreamError> {
        if self.config.use_fallback {
            return Ok(fallback_response(prompt));
        }
        if self.circuit_breaker.is_open() {
            warn!("OpenAI circuit breaker open, answering locally");
            return Ok(fallback_response(prompt));
        }

        match self.request(prompt).await {
            Ok(answer) => {
                self.circuit_breaker.record_success();
                info!(answer_len = answer.len(), "Received completion");
                Ok(answer)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                warn!(error = %e, "Completion request failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_request_detection() {
        assert!(is_plan_request("Create a detailed two-week Workout Program"));
        assert!(is_plan_request("my training plan please"));
        assert!(!is_plan_request("How much water should I drink?"));
    }

    #[test]
    fn test_fallback_responses_differ() {
        let plan = fallback_response("workout program");
        let advice = fallback_response("how do I stretch?");
        assert_ne!(plan, advice);
        assert!(!plan.starts_with("Missing translation"));
        assert!(!advice.starts_with("Missing translation"));
    }

    #[tokio::test]
    async fn test_fallback_mode_skips_network() {
        let config = OpenAiConfig {
            use_fallback: true,
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..OpenAiConfig::default()
        };
        let client = OpenAiClient::new(config, RecoveryConfig::default()).unwrap();
        let answer = client.complete("anything").await.unwrap();
        assert!(!answer.is_empty());
    }
}
