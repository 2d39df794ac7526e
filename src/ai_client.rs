//! # AI Client Module
//!
//! The text-generation collaborator used by the structured parser. A request
//! is an (instruction, user message) pair and the reply is raw text; the
//! marker protocol itself lives in [`crate::structured_parser`].
//!
//! Three implementations are provided:
//!
//! - [`HttpTextGenerator`]: OpenAI-compatible chat completions over `reqwest`,
//!   with retries, exponential backoff and a circuit breaker
//! - [`DisabledGenerator`]: always unavailable, used when no API key is set
//! - [`QuotaGuardedGenerator`]: wraps another generator and enforces a daily
//!   request allowance

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::ai_errors::AiError;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{AiConfig, RecoveryConfig};
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;

/// Produces free text for an instruction + user message pair
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &str, user_message: &str) -> Result<String, AiError>;
}

/// Calculate retry delay with exponential backoff and jitter
///
/// `attempt` is 1-based. The delay doubles per attempt from
/// `base_retry_delay_ms`, is capped at `max_retry_delay_ms`, and gets up to
/// 25% random jitter on top.
///
/// ```rust
/// use pantry_intake::ai_client::calculate_retry_delay;
/// use pantry_intake::config::RecoveryConfig;
///
/// let config = RecoveryConfig::default();
/// let first = calculate_retry_delay(1, &config);
/// assert!((1000..=1250).contains(&first));
/// ```
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let exponential = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent);
    let delay = exponential.min(recovery.max_retry_delay_ms);

    let jitter_range = delay / 4;
    if jitter_range == 0 {
        return delay;
    }
    delay + rand::random::<u64>() % (jitter_range + 1)
}

/// Whether a throttling reply means the allowance is spent rather than a
/// short-term rate limit
pub fn is_quota_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("insufficient_quota")
        || lower.contains("quota exceeded")
        || lower.contains("quota_exceeded")
        || lower.contains("exceeded your current quota")
        || lower.contains("daily limit")
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// OpenAI-compatible chat completions client
#[derive(Debug)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: AiConfig,
    circuit_breaker: CircuitBreaker,
}

impl HttpTextGenerator {
    /// Build a client from configuration
    ///
    /// Fails with [`AppError::Config`] when no API key is configured.
    pub fn new(config: AiConfig) -> AppResult<Self> {
        if !config.is_enabled() {
            return Err(AppError::Config(
                "AI_API_KEY is required for the HTTP text generator".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            circuit_breaker: CircuitBreaker::new(config.recovery.clone()),
            config,
        })
    }

    /// Number of consecutive failed requests seen by the circuit breaker
    pub fn consecutive_failures(&self) -> u32 {
        self.circuit_breaker.failure_count()
    }

    async fn send_once(&self, instruction: &str, user_message: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&self.config.api_url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = truncate_chars(&body, 200);
            return Err(if status == 429 {
                if is_quota_error(&body) {
                    AiError::QuotaExceeded(message)
                } else {
                    AiError::RateLimited(message)
                }
            } else {
                AiError::Api { status, message }
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::InvalidResponse("reply contained no message content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, instruction: &str, user_message: &str) -> Result<String, AiError> {
        let span = observability::ai_span("chat_completion");

        async {
            if self.circuit_breaker.is_open() {
                warn!("Circuit breaker is open, skipping AI request");
                observability::update_circuit_breaker_state(true);
                observability::record_ai_request("circuit_open", Duration::ZERO);
                return Err(AiError::Unavailable(
                    "AI provider temporarily disabled after repeated failures".to_string(),
                ));
            }
            observability::update_circuit_breaker_state(false);

            let start_time = Instant::now();
            let max_attempts = self.config.recovery.max_retries + 1;
            let mut attempt = 0;

            loop {
                attempt += 1;

                match self.send_once(instruction, user_message).await {
                    Ok(text) => {
                        self.circuit_breaker.record_success();
                        observability::record_ai_request("success", start_time.elapsed());
                        info!(
                            attempt,
                            reply_chars = text.chars().count(),
                            duration_ms = start_time.elapsed().as_millis() as u64,
                            "AI request completed"
                        );
                        return Ok(text);
                    }
                    Err(AiError::QuotaExceeded(message)) => {
                        // the provider is healthy, only the allowance is spent
                        observability::record_ai_request("quota_exceeded", start_time.elapsed());
                        warn!(attempt, "AI provider reported the quota as exhausted");
                        return Err(AiError::QuotaExceeded(message));
                    }
                    Err(err) if err.is_retryable() && attempt < max_attempts => {
                        let delay_ms = calculate_retry_delay(attempt, &self.config.recovery);
                        warn!("AI request attempt {attempt} failed: {err}. Retrying in {delay_ms}ms");
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    Err(err) => {
                        self.circuit_breaker.record_failure();
                        observability::update_circuit_breaker_state(self.circuit_breaker.is_open());
                        observability::record_ai_request("failure", start_time.elapsed());
                        error_logging::log_network_error(
                            &err,
                            "ai_chat_completion",
                            Some(self.config.api_url.as_str()),
                            Some(attempt),
                        );
                        return Err(err);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Stand-in used when no provider is configured; every parse falls back
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _instruction: &str, _user_message: &str) -> Result<String, AiError> {
        Err(AiError::Unavailable("no AI provider configured".to_string()))
    }
}

#[derive(Debug)]
struct DailyUsage {
    day: NaiveDate,
    count: u32,
}

/// Enforces a per-UTC-day request allowance in front of another generator
///
/// Once `daily_limit` requests were let through on the current day, further
/// calls fail with [`AiError::QuotaExceeded`] without reaching the inner
/// generator. A limit of 0 means unlimited.
#[derive(Debug)]
pub struct QuotaGuardedGenerator<G> {
    inner: G,
    daily_limit: u32,
    usage: Mutex<DailyUsage>,
}

impl<G: TextGenerator> QuotaGuardedGenerator<G> {
    pub fn new(inner: G, daily_limit: u32) -> Self {
        Self {
            inner,
            daily_limit,
            usage: Mutex::new(DailyUsage {
                day: Utc::now().date_naive(),
                count: 0,
            }),
        }
    }

    /// Requests still allowed today, `None` when unlimited
    pub fn remaining_today(&self) -> Option<u32> {
        if self.daily_limit == 0 {
            return None;
        }
        let usage = self.usage.lock();
        if usage.day != Utc::now().date_naive() {
            return Some(self.daily_limit);
        }
        Some(self.daily_limit.saturating_sub(usage.count))
    }

    /// Reserve one request on `today`; the counter resets when the day changes
    fn try_reserve(&self, today: NaiveDate) -> Result<(), AiError> {
        if self.daily_limit == 0 {
            return Ok(());
        }

        let mut usage = self.usage.lock();
        if usage.day != today {
            debug!(previous_day = %usage.day, "Resetting daily AI quota");
            usage.day = today;
            usage.count = 0;
        }
        if usage.count >= self.daily_limit {
            return Err(AiError::QuotaExceeded(format!(
                "daily limit of {} requests reached",
                self.daily_limit
            )));
        }
        usage.count += 1;
        Ok(())
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for QuotaGuardedGenerator<G> {
    async fn generate(&self, instruction: &str, user_message: &str) -> Result<String, AiError> {
        if let Err(err) = self.try_reserve(Utc::now().date_naive()) {
            observability::record_ai_request("quota_exceeded", Duration::ZERO);
            return Err(err);
        }
        self.inner.generate(instruction, user_message).await
    }
}
