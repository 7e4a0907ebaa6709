//! # title-report
//!
//! Draft a legal "Report on Title" from scanned land records (RTCs, mutation
//! registers, deeds, encumbrance certificates) delivered as one multi-page
//! PDF, usually in Kannada.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       load a local file or download from URL
//!  ├─ 2. Split       one standalone single-page PDF per page (lopdf)
//!  ├─ 3. Transcribe  per page: OCR service → JSON → translate to English
//!  ├─ 4. Chunk       contiguous batches of `chunk_size` pages (default 90)
//!  ├─ 5. Synthesize  one drafting request per chunk (watsonx or edgequake-llm)
//!  └─ 6. Render      Markdown report → `<base> AI Summary.docx`
//! ```
//!
//! Everything runs sequentially. A page that fails recognition or
//! translation is replaced by a placeholder such as `[OCR failed: 500]`; a
//! chunk whose model response cannot be read is replaced by a
//! `[Model response error: …]` placeholder. Neither stops the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use title_report::{generate_report, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // WATSONX_API_KEY, WATSONX_PROJECT_ID and OCR_ENDPOINT from the environment
//!     let config = ReportConfig::from_env().into_builder().chunk_size(30).build()?;
//!     let mut output = generate_report("deed.pdf", &config).await?;
//!     println!("{}", output.report);
//!     let path = output.render_once(&config.output_dir)?;
//!     eprintln!("written to {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `title-report` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! title-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationParameters, ReportConfig, ReportConfigBuilder};
pub use error::{ChunkError, PageError, ReportError};
pub use output::{Chunk, ChunkResponse, DocumentInfo, PageResult, ReportOutput, ReportStats};
pub use pipeline::llm::{ModelError, ProviderModel, ReportModel, WatsonxModel};
pub use pipeline::ocr::{HttpRecognizer, Recognizer};
pub use pipeline::outline::{read_outline, DocumentOutline, OutlineHeading};
pub use pipeline::translate::{GoogleTranslator, TranslationError, Translator};
pub use progress::{NoopProgressCallback, ProgressCallback, ReportProgressCallback};
pub use report::{
    generate_and_render, generate_report, generate_report_from_bytes, generate_report_sync,
    inspect,
};
