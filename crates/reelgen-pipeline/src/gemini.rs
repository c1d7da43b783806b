//! Gemini-backed scene planner.
//!
//! Each call sends one JSON-mode prompt and walks the configured model list
//! until a model returns parseable output.

use std::time::Duration;

use async_trait::async_trait;
use reelgen_models::{DurationViolation, ScenePlan, ValidationConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::planner::{PlannerError, ScenePlanner};
use crate::prompts;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Models tried in order when `GEMINI_MODELS` is not set.
pub const DEFAULT_GEMINI_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
    /// `output_format` requested in template prompts.
    pub output_format: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models: DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            output_format: "mp4".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    pub fn from_env() -> Result<Self, PlannerError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PlannerError::Config("GEMINI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);

        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

pub struct GeminiPlanner {
    config: GeminiConfig,
    client: Client,
}

impl GeminiPlanner {
    pub fn new(config: GeminiConfig) -> Result<Self, PlannerError> {
        if config.models.is_empty() {
            return Err(PlannerError::Config("no Gemini models configured".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlannerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, PlannerError> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// Send `prompt` to each model in turn and parse the first usable answer.
    async fn generate<T: DeserializeOwned>(&self, prompt: &str, purpose: &str) -> Result<T, PlannerError> {
        let mut last_error = None;

        for model in &self.config.models {
            debug!(model = %model, purpose, "Calling Gemini");
            match self.call_model(model, prompt).await {
                Ok(value) => {
                    info!(model = %model, purpose, "Gemini call succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(model = %model, purpose, error = %e, "Gemini model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PlannerError::request("All Gemini models failed")))
    }

    async fn call_model<T: DeserializeOwned>(&self, model: &str, prompt: &str) -> Result<T, PlannerError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| PlannerError::request(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlannerError::request(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::malformed(format!("Failed to parse Gemini response: {}", e)))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| PlannerError::malformed("No content in Gemini response"))?;

        serde_json::from_str(strip_code_fence(text))
            .map_err(|e| PlannerError::malformed(format!("Model output is not the expected JSON: {}", e)))
    }
}

#[async_trait]
impl ScenePlanner for GeminiPlanner {
    async fn plan_scenes(&self, config: &ValidationConfig) -> Result<ScenePlan, PlannerError> {
        self.generate(&prompts::planning_prompt(config), "plan").await
    }

    async fn repair_scenes(
        &self,
        plan: &ScenePlan,
        violations: &[DurationViolation],
        config: &ValidationConfig,
    ) -> Result<ScenePlan, PlannerError> {
        self.generate(&prompts::repair_prompt(plan, violations, config), "repair")
            .await
    }

    async fn generate_template(
        &self,
        plan: &ScenePlan,
        config: &ValidationConfig,
    ) -> Result<serde_json::Value, PlannerError> {
        let prompt = prompts::template_prompt(plan, config, &self.config.output_format);
        self.generate(&prompt, "template").await
    }
}
