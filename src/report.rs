//! Top-level entry points: run the whole pipeline for one document.
//!
//! A run is strictly sequential: split, then every page through recognition
//! and translation, then every chunk through the model. Page and chunk
//! failures are recorded and the run goes on; anything else stops it with a
//! [`ReportError`].

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::{DocumentInfo, ReportOutput, ReportStats};
use crate::pipeline::input::{self, LoadedDocument};
use crate::pipeline::ocr::{HttpRecognizer, Recognizer};
use crate::pipeline::translate::{GoogleTranslator, Translator};
use crate::pipeline::{chunk, llm, split, synthesize, transcribe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Draft a report from a PDF file or URL.
///
/// # Returns
/// `Ok(ReportOutput)` even when some pages or chunks failed; check
/// `output.stats.failed_pages` / `failed_chunks`. The output is not rendered
/// yet; call [`ReportOutput::render_once`] or use [`generate_and_render`].
///
/// # Errors
/// Only fatal errors: unreadable or non-PDF input, missing service
/// configuration, a refused token exchange, an undeliverable generation
/// request.
pub async fn generate_report(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let input_str = input_str.as_ref();
    info!("Starting report: {}", input_str);
    let document = input::load_input(input_str, config.download_timeout_secs).await?;
    run(document, config).await
}

/// Draft a report from PDF bytes already in memory.
///
/// `name` stands in for the file name: it decides the rendered document's
/// name (`deed.pdf` → `deed AI Summary.docx`).
pub async fn generate_report_from_bytes(
    name: &str,
    bytes: Vec<u8>,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let document = LoadedDocument::from_bytes(name, bytes)?;
    run(document, config).await
}

/// Draft a report and render it into `config.output_dir`.
pub async fn generate_and_render(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let mut output = generate_report(input_str, config).await?;
    let dir = config.output_dir.clone();
    tokio::task::spawn_blocking(move || output.render_once(&dir).map(|_| output))
        .await
        .map_err(|e| ReportError::Internal(format!("Render task panicked: {}", e)))?
}

/// Synchronous wrapper around [`generate_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_report_sync(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_report(input_str, config))
}

/// Page count and version of a PDF, without contacting any service.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentInfo, ReportError> {
    let document = input::load_input(input_str.as_ref(), 120).await?;
    tokio::task::spawn_blocking(move || split::inspect_bytes(&document.name, &document.bytes))
        .await
        .map_err(|e| ReportError::Internal(format!("Inspect task panicked: {}", e)))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(document: LoadedDocument, config: &ReportConfig) -> Result<ReportOutput, ReportError> {
    let total_start = Instant::now();

    // Configuration problems surface before any page is sent anywhere.
    let recognizer = resolve_recognizer(config)?;
    let translator = resolve_translator(config)?;
    llm::ensure_configured(config)?;

    let base_name = document.base_name();
    let pages = split::split_document(&document).await?;
    drop(document);

    let total_pages = pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }
    if total_pages == 0 {
        warn!("Document has no pages; the report will be empty");
    }

    let transcribe_start = Instant::now();
    let page_results =
        transcribe::transcribe_pages(pages, recognizer.as_ref(), translator.as_ref(), config).await;
    let transcription_duration_ms = transcribe_start.elapsed().as_millis() as u64;

    let chunks = chunk::chunk_pages(page_results.clone(), config.chunk_size);

    let generation_start = Instant::now();
    let responses = if chunks.is_empty() {
        Vec::new()
    } else {
        let model = llm::resolve_model(config).await?;
        synthesize::synthesize_chunks(&chunks, model.as_ref(), config).await?
    };
    let generation_duration_ms = generation_start.elapsed().as_millis() as u64;

    let report = synthesize::join_report(&responses);

    let failed_pages = page_results.iter().filter(|p| !p.is_ok()).count();
    let stats = ReportStats {
        total_pages,
        transcribed_pages: total_pages - failed_pages,
        failed_pages,
        total_chunks: responses.len(),
        failed_chunks: responses.iter().filter(|c| !c.is_ok()).count(),
        transcription_duration_ms,
        generation_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Report complete: {}/{} pages transcribed, {} chunks, {}ms total",
        stats.transcribed_pages, total_pages, stats.total_chunks, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, failed_pages, stats.total_chunks);
    }

    Ok(ReportOutput {
        base_name,
        pages: page_results,
        chunks: responses,
        report,
        stats,
        rendered: false,
        document_path: None,
    })
}

/// Pre-built client first, then the configured endpoint.
fn resolve_recognizer(config: &ReportConfig) -> Result<Arc<dyn Recognizer>, ReportError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }

    let endpoint = config
        .ocr_endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ReportError::ProviderNotConfigured {
            provider: "ocr".to_string(),
            hint: format!(
                "Set {} to the recognition service URL.",
                crate::config::env::OCR_ENDPOINT
            ),
        })?;

    let recognizer = HttpRecognizer::new(endpoint, config.request_timeout_secs)
        .map_err(|e| ReportError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(recognizer))
}

fn resolve_translator(config: &ReportConfig) -> Result<Arc<dyn Translator>, ReportError> {
    if let Some(ref translator) = config.translator {
        return Ok(Arc::clone(translator));
    }
    let translator = GoogleTranslator::new(
        config.translate_endpoint.clone(),
        config.translation_segment_chars,
        config.request_timeout_secs,
    )
    .map_err(|e| ReportError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(translator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ocr_endpoint_is_named() {
        let Err(err) = resolve_recognizer(&ReportConfig::default()) else {
            panic!("a recognizer was built without an endpoint");
        };
        match err {
            ReportError::ProviderNotConfigured { provider, hint } => {
                assert_eq!(provider, "ocr");
                assert!(hint.contains("OCR_ENDPOINT"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn endpoint_builds_http_recognizer() {
        let config = ReportConfig::builder()
            .ocr_endpoint("http://localhost:9000/ocr")
            .build()
            .unwrap();
        assert!(resolve_recognizer(&config).is_ok());
        assert!(resolve_translator(&config).is_ok());
    }

    #[tokio::test]
    async fn non_pdf_bytes_are_rejected_before_any_service_call() {
        let err = generate_report_from_bytes("notes.txt", b"hello".to_vec(), &ReportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn inspect_reads_local_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rtc.pdf");
        std::fs::write(&path, split::tests::sample_pdf(3)).unwrap();

        let info = inspect(path.to_str().unwrap()).await.unwrap();
        assert_eq!(info.page_count, 3);
        assert_eq!(info.file_name, "rtc.pdf");
    }
}
