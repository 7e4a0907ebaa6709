//! Drafting model backends: send one generation request per chunk.
//!
//! Two backends sit behind [`ReportModel`]:
//!
//! * [`WatsonxModel`] — the default. Exchanges the API key for a bearer token
//!   once, then calls the text-generation endpoint with the configured
//!   project, model and generation parameters.
//! * [`ProviderModel`] — any `edgequake-llm` provider (OpenAI, Anthropic,
//!   Ollama, …) selected by name. The instruction template goes in the system
//!   message and the chunk text in the user message.
//!
//! ## Failure scopes
//!
//! A generation request that cannot be delivered is fatal to the run. A
//! response that arrives but carries no usable text is local to its chunk
//! and ends up as a placeholder; [`ModelError`] keeps the two apart.

use crate::config::{GenerationParameters, ReportConfig};
use crate::error::ReportError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Why a generation request produced no text.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The provider answered, but the answer could not be used.
    #[error("unusable response: {detail}")]
    Malformed { detail: String, raw: String },

    /// The request never produced an answer.
    #[error("generation request failed: {0}")]
    Request(String),

    /// Anything that must stop the run, e.g. a refused token exchange.
    #[error(transparent)]
    Fatal(#[from] ReportError),
}

/// A model that drafts report text from an instruction template and the text
/// of one chunk.
#[async_trait]
pub trait ReportModel: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    async fn generate(&self, template: &str, chunk_text: &str) -> Result<String, ModelError>;
}

/// Fail early when no drafting backend can be built from `config`.
///
/// Called before any page is transcribed so a missing credential does not
/// cost a full recognition pass.
pub fn ensure_configured(config: &ReportConfig) -> Result<(), ReportError> {
    if config.model.is_some() || config.provider_name.is_some() {
        return Ok(());
    }
    if config.api_key.is_some() && config.project_id.is_some() {
        return Ok(());
    }
    Err(watsonx_not_configured(config))
}

fn watsonx_not_configured(config: &ReportConfig) -> ReportError {
    let missing: Vec<&str> = [
        (config.api_key.is_none(), crate::config::env::API_KEY),
        (config.project_id.is_none(), crate::config::env::PROJECT_ID),
    ]
    .into_iter()
    .filter_map(|(missing, var)| missing.then_some(var))
    .collect();

    ReportError::ProviderNotConfigured {
        provider: "watsonx".to_string(),
        hint: format!("Set {} or pass them on the command line.", missing.join(" and ")),
    }
}

/// Resolve the drafting model, from most-specific to least-specific:
///
/// 1. **Pre-built model** (`config.model`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model_id`,
///    built through [`ProviderFactory::create_llm_provider`].
/// 3. **watsonx** with the configured API key and project.
pub async fn resolve_model(config: &ReportConfig) -> Result<Arc<dyn ReportModel>, ReportError> {
    if let Some(ref model) = config.model {
        return Ok(Arc::clone(model));
    }

    if let Some(ref name) = config.provider_name {
        let model = ProviderModel::create(name, &config.model_id, config.generation.max_new_tokens)?;
        return Ok(Arc::new(model));
    }

    let model = WatsonxModel::connect(config).await?;
    Ok(Arc::new(model))
}

// ── watsonx ──────────────────────────────────────────────────────────────

/// Request body of the text-generation endpoint.
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    input: String,
    parameters: &'a GenerationParameters,
    model_id: &'a str,
    project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// watsonx.ai text generation with an IAM bearer token.
pub struct WatsonxModel {
    client: Client,
    token: String,
    generation_url: String,
    project_id: String,
    model_id: String,
    parameters: GenerationParameters,
}

impl std::fmt::Debug for WatsonxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatsonxModel")
            .field("generation_url", &self.generation_url)
            .field("project_id", &self.project_id)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl WatsonxModel {
    /// Exchange the API key for a token and prepare the generation client.
    pub async fn connect(config: &ReportConfig) -> Result<Self, ReportError> {
        let (Some(api_key), Some(project_id)) = (&config.api_key, &config.project_id) else {
            return Err(watsonx_not_configured(config));
        };

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ReportError::Internal(format!("HTTP client: {e}")))?;

        let token = exchange_token(&client, &config.iam_url, api_key).await?;
        info!("Obtained watsonx access token");

        Ok(Self {
            client,
            token,
            generation_url: generation_url(&config.watsonx_url, &config.api_version),
            project_id: project_id.clone(),
            model_id: config.model_id.clone(),
            parameters: config.generation.clone(),
        })
    }
}

/// `POST {base}/ml/v1/text/generation?version={version}`.
fn generation_url(base: &str, version: &str) -> String {
    format!(
        "{}/ml/v1/text/generation?version={}",
        base.trim_end_matches('/'),
        version
    )
}

async fn exchange_token(client: &Client, iam_url: &str, api_key: &str) -> Result<String, ReportError> {
    let fail = |detail: String| ReportError::TokenExchange {
        url: iam_url.to_string(),
        detail,
    };

    let response = client
        .post(iam_url)
        .header("Accept", "application/json")
        .form(&[
            ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
            ("apikey", api_key),
        ])
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }

    let body: TokenResponse = response.json().await.map_err(|e| fail(e.to_string()))?;
    if body.access_token.is_empty() {
        return Err(fail("empty access_token".into()));
    }
    Ok(body.access_token)
}

/// Pull `results[0].generated_text` out of a generation response body.
fn parse_generation(raw: &str) -> Result<String, String> {
    let body: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    body.get("results")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("generated_text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "no results[0].generated_text in response".to_string())
}

#[async_trait]
impl ReportModel for WatsonxModel {
    fn name(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, template: &str, chunk_text: &str) -> Result<String, ModelError> {
        let request = GenerationRequest {
            input: crate::prompts::generation_input(template, chunk_text),
            parameters: &self.parameters,
            model_id: &self.model_id,
            project_id: &self.project_id,
        };

        let response = self
            .client
            .post(&self.generation_url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;
        debug!("Generation returned HTTP {} with {} bytes", status, raw.len());

        parse_generation(&raw).map_err(|detail| ModelError::Malformed {
            detail: if status.is_success() {
                detail
            } else {
                format!("HTTP {status}: {detail}")
            },
            raw,
        })
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Drafting through any `edgequake-llm` chat provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    max_tokens: usize,
}

impl ProviderModel {
    /// Instantiate a named provider with the given model.
    pub fn create(provider_name: &str, model: &str, max_tokens: u32) -> Result<Self, ReportError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ReportError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}"), max_tokens))
    }

    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            label: label.into(),
            max_tokens: max_tokens as usize,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ReportModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, template: &str, chunk_text: &str) -> Result<String, ModelError> {
        let messages = vec![
            ChatMessage::system(template),
            ChatMessage::user_with_images(chunk_text, vec![]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}
