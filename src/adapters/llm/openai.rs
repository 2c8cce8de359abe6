//! OpenAI-compatible chat-completions planner.
//!
//! Each use case (parameter extraction, safety validation, decomposition)
//! has its own model settings. Responses are requested in JSON mode and
//! deserialized straight into the domain types. Requests go through a token
//! bucket and transient failures are retried with exponential backoff.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::models::{
    ExtractedParameters, GeneratedPlan, LlmConfig, ModelSettings, SafetyAssessment,
};
use crate::domain::ports::{LlmError, LlmPlanner};

const EXTRACTION_PROMPT: &str = "You extract experiment parameters from requests made to a \
quantum-device lab automation agent. Answer with a JSON object with the optional string fields \
temperature, voltage_range, device_id, time_window (HH:00-HH:00, whole hours), measurement_type, duration and \
safety_level, plus an additional_params object for anything else. Use null for fields the \
request does not mention. Keep units as written.";

const SAFETY_PROMPT: &str = "You are the safety officer of a cryogenic transport lab. Assess the \
operation and answer with a JSON object: risk_level (LOW, MEDIUM, HIGH or CRITICAL), \
safety_issues, required_guards, blocking_issues and recommendations, each a list of strings. \
Guards use the forms interlock.<name>, shift=night_ops, shift=HH:MM-HH:MM and \
capability: <channel> <= <value><unit>. Only list blocking issues that must stop execution.";

const DECOMPOSITION_PROMPT: &str = "You decompose lab requests into task graphs. Answer with a \
JSON object: nodes (list), execution_summary, estimated_duration, safety_requirements and \
required_approvals. Each node has node_id, agent, tools, params, guards, on_success and on_fail. \
Agents are worker.cooldown, worker.sweep, worker.lockin, worker.generic, assistant.<task>, \
consultant.<task> and info_center.brief. Tools are dotted server.tool names such as \
instrMCP.cryostat, instrMCP.temperature, instrMCP.sweep, instrMCP.daq, arxiv.search and \
brief.update. List nodes in execution order, link them through on_success, and end every graph \
with a brief_update node using agent info_center.brief. Put hardware guards on every worker \
node that touches instruments.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: serde_json::Value,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiPlanner {
    config: LlmConfig,
    api_key: Option<String>,
    http: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl OpenAiPlanner {
    /// The API key comes from the config, then `OPENAI_API_KEY`.
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let limiter = RateLimiter::direct(quota(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst_size,
        ));
        Ok(Self {
            config,
            api_key,
            http,
            limiter,
        })
    }

    async fn complete<T: DeserializeOwned>(
        &self,
        settings: &ModelSettings,
        system: &str,
        user: &str,
    ) -> Result<T, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".to_string()))?;

        let request = ChatRequest {
            model: &settings.name,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            response_format: json!({"type": "json_object"}),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let retry = &self.config.retry;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let request = &request;

        let content = backoff::future::retry(policy, || async move {
            self.limiter.until_ready().await;
            match self.send(api_key, request).await {
                Ok(content) => Ok(content),
                Err(e) if e.is_transient() => {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    if attempt > retry.max_retries {
                        Err(backoff::Error::permanent(e))
                    } else {
                        warn!(attempt, error = %e, "transient LLM error, retrying");
                        Err(backoff::Error::transient(e))
                    }
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await?;

        debug!(model = %settings.name, bytes = content.len(), "LLM response received");
        Ok(serde_json::from_str(&content)?)
    }

    async fn send(&self, api_key: &str, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(match status.as_u16() {
                400 => LlmError::InvalidRequest(body),
                401 | 403 => LlmError::Unauthorized,
                429 => LlmError::RateLimitExceeded,
                code @ 500..=599 => LlmError::ServerError(code, body),
                code => LlmError::Network(format!("unexpected status {code}: {body}")),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("empty completion".to_string()))
    }
}

/// Slowest accepted rate: one request per hour.
const MIN_REQUESTS_PER_SECOND: f64 = 1.0 / 3600.0;

fn quota(requests_per_second: f64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let period = if requests_per_second > 0.0 {
        Duration::try_from_secs_f64(1.0 / requests_per_second.max(MIN_REQUESTS_PER_SECOND))
            .unwrap_or(Duration::from_secs(1))
    } else {
        Duration::from_secs(1)
    };
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[async_trait]
impl LlmPlanner for OpenAiPlanner {
    fn is_available(&self) -> bool {
        self.config.enabled && self.api_key.is_some()
    }

    async fn extract_parameters(&self, request: &str) -> Result<ExtractedParameters, LlmError> {
        let params: ExtractedParameters = self
            .complete(
                &self.config.models.parameter_extraction,
                EXTRACTION_PROMPT,
                &format!("Extract parameters from: {request}"),
            )
            .await?;
        info!(?params, "parameters extracted");
        Ok(params)
    }

    async fn validate_safety(
        &self,
        request: &str,
        params: &ExtractedParameters,
    ) -> Result<SafetyAssessment, LlmError> {
        let user = format!(
            "Operation: {request}\n\nExtracted parameters:\n{}\n\nEvaluate safety risks and requirements.",
            pretty(params)
        );
        let assessment: SafetyAssessment = self
            .complete(&self.config.models.safety_validation, SAFETY_PROMPT, &user)
            .await?;
        info!(risk = %assessment.risk_level, "safety validated");
        Ok(assessment)
    }

    async fn generate_task_graph(
        &self,
        request: &str,
        params: &ExtractedParameters,
        safety: &SafetyAssessment,
    ) -> Result<GeneratedPlan, LlmError> {
        let user = format!(
            "User request: {request}\n\nExtracted parameters:\n{}\n\nSafety assessment:\n{}\n\n\
             Generate a complete task graph that safely accomplishes this request.",
            pretty(params),
            pretty(safety)
        );
        let plan: GeneratedPlan = self
            .complete(&self.config.models.task_decomposition, DECOMPOSITION_PROMPT, &user)
            .await?;
        info!(nodes = plan.nodes.len(), "task graph generated");
        Ok(plan)
    }
}
