//! Error types for the title-report library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ReportError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, missing credentials, token exchange refused, output not writable).
//!   Returned as `Err(ReportError)` from the top-level `generate_report*`
//!   functions.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be recognised or
//!   translated. Stored inside [`crate::output::PageResult`]; the run moves on
//!   to the next page.
//!
//! * [`ChunkError`] — **Non-fatal**: the model answered for one chunk but the
//!   answer carried no usable text. Stored inside
//!   [`crate::output::ChunkResponse`]; the run moves on to the next chunk.
//!
//! Page and chunk errors stay structured until somebody asks for text; only
//! then are they folded into their placeholder strings.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the title-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("Input is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF structure could not be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// A single page could not be written out as a standalone PDF.
    #[error("Failed to split out page {page}: {detail}")]
    SplitFailed { page: usize, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The drafting model is not configured (missing API key, project id…).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The token endpoint refused the API key or returned no token.
    #[error("Token exchange with '{url}' failed: {detail}")]
    TokenExchange { url: String, detail: String },

    /// The generation request could not be delivered or answered.
    #[error("Generation request for chunk {chunk} failed: {detail}")]
    Generation { chunk: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Markdown could not be converted into a Word document.
    #[error("Failed to render '{path}': {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rendered document could not be read back.
    #[error("Failed to read document '{path}': {detail}")]
    DocumentReadFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageResult`] when a page fails. The run
/// continues with the next page; there is no retry.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The recognition service answered with a non-success status.
    #[error("Page {page}: recognition service returned HTTP {status}")]
    OcrStatus { page: usize, status: u16 },

    /// The recognition request never produced a response.
    #[error("Page {page}: recognition request failed: {detail}")]
    OcrRequest { page: usize, detail: String },

    /// The translation service raised an error.
    #[error("Page {page}: translation failed: {reason}")]
    Translation { page: usize, reason: String },

    /// Anything else, e.g. a success response whose body is not JSON.
    #[error("Page {page}: {detail}")]
    Unexpected { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::OcrStatus { page, .. }
            | PageError::OcrRequest { page, .. }
            | PageError::Translation { page, .. }
            | PageError::Unexpected { page, .. } => *page,
        }
    }

    /// The deterministic substitute text inserted in place of the page.
    pub fn placeholder(&self) -> String {
        match self {
            PageError::OcrStatus { status, .. } => format!("[OCR failed: {status}]"),
            PageError::OcrRequest { detail, .. } => format!("[OCR failed: {detail}]"),
            PageError::Translation { reason, .. } => format!("[Translation failed: {reason}]"),
            PageError::Unexpected { detail, .. } => format!("[Processing failed: {detail}]"),
        }
    }
}

/// A non-fatal error for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The provider answered, but no generated text could be extracted.
    #[error("Chunk {chunk}: unusable model response: {detail}")]
    ResponseUnparsable {
        chunk: usize,
        detail: String,
        raw: String,
    },
}

impl ChunkError {
    /// The deterministic substitute text inserted in place of the chunk.
    pub fn placeholder(&self) -> String {
        match self {
            ChunkError::ResponseUnparsable { detail, raw, .. } => {
                format!("[Model response error: {detail} - Raw: {raw}]")
            }
        }
    }
}
