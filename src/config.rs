//! Configuration types for a report run.
//!
//! All run behaviour is controlled through [`ReportConfig`], built via its
//! [`ReportConfigBuilder`]. Service credentials can also be picked up from the
//! environment with [`ReportConfig::from_env`].

use crate::error::ReportError;
use crate::pipeline::llm::ReportModel;
use crate::pipeline::ocr::Recognizer;
use crate::pipeline::translate::Translator;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of pages batched into one generation request.
pub const DEFAULT_CHUNK_SIZE: usize = 90;

/// Default watsonx regional endpoint.
pub const DEFAULT_WATSONX_URL: &str = "https://us-south.ml.cloud.ibm.com";

/// IBM Cloud IAM token endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Public Google Translate web endpoint.
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub const DEFAULT_MODEL_ID: &str = "meta-llama/llama-3-3-70b-instruct";

pub const DEFAULT_API_VERSION: &str = "2024-01-15";

/// Environment variable names read by [`ReportConfig::from_env`].
pub mod env {
    pub const API_KEY: &str = "WATSONX_API_KEY";
    pub const PROJECT_ID: &str = "WATSONX_PROJECT_ID";
    pub const OCR_ENDPOINT: &str = "OCR_ENDPOINT";
    pub const WATSONX_URL: &str = "WATSONX_URL";
    pub const MODEL_ID: &str = "WATSONX_MODEL_ID";
}

/// Generation parameters sent with every chunk request.
///
/// The defaults ask for deterministic output: greedy decoding, no stop
/// sequences and a neutral repetition penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub decoding_method: String,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub repetition_penalty: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            decoding_method: "greedy".to_string(),
            max_new_tokens: 8100,
            min_new_tokens: 0,
            stop_sequences: Vec::new(),
            repetition_penalty: 1.0,
        }
    }
}

/// Configuration for a report run.
///
/// # Example
/// ```rust
/// use title_report::ReportConfig;
///
/// let config = ReportConfig::builder()
///     .chunk_size(15)
///     .ocr_endpoint("http://localhost:9000/ocr")
///     .api_key("my-key")
///     .project_id("my-project")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 15);
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Pages per generation request. Must be ≥ 1. Default: 90.
    pub chunk_size: usize,

    /// Language of the scanned records. Default: `kn` (Kannada).
    pub source_language: String,

    /// Language the page text is translated into. Default: `en`.
    pub target_language: String,

    /// Recognition service URL; each page is POSTed here as a file upload.
    pub ocr_endpoint: Option<String>,

    /// Translation endpoint. Default: [`DEFAULT_TRANSLATE_URL`].
    pub translate_endpoint: String,

    /// Longest text sent in one translation request. Default: 4500 chars.
    pub translation_segment_chars: usize,

    /// watsonx API key, exchanged for a bearer token.
    pub api_key: Option<String>,

    /// watsonx project identifier.
    pub project_id: Option<String>,

    /// watsonx base URL. Default: [`DEFAULT_WATSONX_URL`].
    pub watsonx_url: String,

    /// Token endpoint. Default: [`DEFAULT_IAM_URL`].
    pub iam_url: String,

    /// `version` query parameter of the generation endpoint.
    pub api_version: String,

    /// Model identifier. Default: [`DEFAULT_MODEL_ID`].
    pub model_id: String,

    pub generation: GenerationParameters,

    /// Replaces the built-in drafting instructions when set.
    pub instruction_prompt: Option<String>,

    /// Draft with an `edgequake-llm` provider (e.g. "openai") instead of watsonx.
    pub provider_name: Option<String>,

    /// Directory the rendered document is written to. Default: current dir.
    pub output_dir: PathBuf,

    /// Per-request timeout for service calls. Default: none (client default).
    pub request_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-constructed recognition client. Takes precedence over `ocr_endpoint`.
    pub recognizer: Option<Arc<dyn Recognizer>>,

    /// Pre-constructed translation client.
    pub translator: Option<Arc<dyn Translator>>,

    /// Pre-constructed drafting model. Takes precedence over every other
    /// model setting.
    pub model: Option<Arc<dyn ReportModel>>,

    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            source_language: "kn".to_string(),
            target_language: "en".to_string(),
            ocr_endpoint: None,
            translate_endpoint: DEFAULT_TRANSLATE_URL.to_string(),
            translation_segment_chars: 4500,
            api_key: None,
            project_id: None,
            watsonx_url: DEFAULT_WATSONX_URL.to_string(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            generation: GenerationParameters::default(),
            instruction_prompt: None,
            provider_name: None,
            output_dir: PathBuf::from("."),
            request_timeout_secs: None,
            download_timeout_secs: 120,
            recognizer: None,
            translator: None,
            model: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("chunk_size", &self.chunk_size)
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("translate_endpoint", &self.translate_endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("project_id", &self.project_id)
            .field("watsonx_url", &self.watsonx_url)
            .field("model_id", &self.model_id)
            .field("generation", &self.generation)
            .field("provider_name", &self.provider_name)
            .field("output_dir", &self.output_dir)
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn Recognizer>"))
            .field("translator", &self.translator.as_ref().map(|_| "<dyn Translator>"))
            .field("model", &self.model.as_ref().map(|_| "<dyn ReportModel>"))
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with credentials and endpoints taken from the environment.
    ///
    /// Unset or empty variables leave the corresponding field untouched.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = non_empty_var(env::API_KEY) {
            config.api_key = Some(v);
        }
        if let Some(v) = non_empty_var(env::PROJECT_ID) {
            config.project_id = Some(v);
        }
        if let Some(v) = non_empty_var(env::OCR_ENDPOINT) {
            config.ocr_endpoint = Some(v);
        }
        if let Some(v) = non_empty_var(env::WATSONX_URL) {
            config.watsonx_url = v;
        }
        if let Some(v) = non_empty_var(env::MODEL_ID) {
            config.model_id = v;
        }
        config
    }

    /// Turn an existing config back into a builder.
    pub fn into_builder(self) -> ReportConfigBuilder {
        ReportConfigBuilder { config: self }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn chunk_size(mut self, pages: usize) -> Self {
        self.config.chunk_size = pages;
        self
    }

    pub fn source_language(mut self, lang: impl Into<String>) -> Self {
        self.config.source_language = lang.into();
        self
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = Some(url.into());
        self
    }

    pub fn translate_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.translate_endpoint = url.into();
        self
    }

    pub fn translation_segment_chars(mut self, chars: usize) -> Self {
        self.config.translation_segment_chars = chars.max(1);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.config.project_id = Some(id.into());
        self
    }

    pub fn watsonx_url(mut self, url: impl Into<String>) -> Self {
        self.config.watsonx_url = url.into();
        self
    }

    pub fn iam_url(mut self, url: impl Into<String>) -> Self {
        self.config.iam_url = url.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn max_new_tokens(mut self, n: u32) -> Self {
        self.config.generation.max_new_tokens = n;
        self
    }

    pub fn generation(mut self, params: GenerationParameters) -> Self {
        self.config.generation = params;
        self
    }

    pub fn instruction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.instruction_prompt = Some(prompt.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn model(mut self, model: Arc<dyn ReportModel>) -> Self {
        self.config.model = Some(model);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(ReportError::InvalidConfig(
                "Chunk size must be ≥ 1 page".into(),
            ));
        }
        if c.generation.max_new_tokens == 0 {
            return Err(ReportError::InvalidConfig(
                "max_new_tokens must be ≥ 1".into(),
            ));
        }
        if c.source_language.trim().is_empty() || c.target_language.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "Source and target languages must be set".into(),
            ));
        }
        Ok(self.config)
    }
}
