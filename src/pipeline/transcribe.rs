//! Page transcription: recognise, canonicalise and translate every page.
//!
//! Pages are processed one at a time in page order. Each page either yields
//! translated text or a [`PageError`]; a failure never stops the loop and is
//! never retried.

use crate::config::ReportConfig;
use crate::error::PageError;
use crate::output::PageResult;
use crate::pipeline::ocr::{canonical_text, Recognizer};
use crate::pipeline::split::SinglePage;
use crate::pipeline::translate::Translator;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transcribe `pages` in order, producing exactly one result per page.
pub async fn transcribe_pages(
    pages: Vec<SinglePage>,
    recognizer: &dyn Recognizer,
    translator: &dyn Translator,
    config: &ReportConfig,
) -> Vec<PageResult> {
    let total_pages = pages.len();
    let mut results = Vec::with_capacity(total_pages);
    info!("Transcribing {} pages", total_pages);

    for page in pages {
        let page_num = page.number;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }

        let start = Instant::now();
        let outcome = transcribe_page(&page, recognizer, translator, config).await;
        // The page buffer is released here, before the next page is recognised.
        drop(page);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(text) => {
                debug!("Page {}: {} chars in {}ms", page_num, text.len(), duration_ms);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, total_pages, text.len());
                }
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, total_pages, &e.placeholder());
                }
            }
        }

        results.push(PageResult {
            page_num,
            outcome,
            duration_ms,
        });
    }

    results
}

async fn transcribe_page(
    page: &SinglePage,
    recognizer: &dyn Recognizer,
    translator: &dyn Translator,
    config: &ReportConfig,
) -> Result<String, PageError> {
    let structured = recognizer.recognize(page).await?;
    let text = canonical_text(structured);

    translator
        .translate(&text, &config.source_language, &config.target_language)
        .await
        .map_err(|e| PageError::Translation {
            page: page.number,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::translate::TranslationError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Fails recognition with the given status for the listed pages.
    struct ScriptedRecognizer {
        failing: Vec<(usize, u16)>,
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        async fn recognize(&self, page: &SinglePage) -> Result<Value, PageError> {
            if let Some(&(_, status)) = self.failing.iter().find(|(p, _)| *p == page.number) {
                return Err(PageError::OcrStatus {
                    page: page.number,
                    status,
                });
            }
            Ok(json!({ "request_id": format!("req-{}", page.number), "text": format!("ಪುಟ {}", page.number) }))
        }
    }

    /// Upper-cases text and records what it was asked to translate.
    #[derive(Default)]
    struct RecordingTranslator {
        seen: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Translator for RecordingTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: &str,
            _target: &str,
        ) -> Result<String, TranslationError> {
            self.seen.lock().unwrap().push(text.to_string());
            if let Some(ref needle) = self.fail_on {
                if text.contains(needle.as_str()) {
                    return Err(TranslationError::Status(429));
                }
            }
            Ok(text.to_uppercase())
        }
    }

    fn pages(n: usize) -> Vec<SinglePage> {
        (1..=n)
            .map(|number| SinglePage {
                number,
                bytes: b"%PDF-1.5".to_vec(),
            })
            .collect()
    }

    #[tokio::test]
    async fn ocr_failure_is_local_to_its_page() {
        let recognizer = ScriptedRecognizer {
            failing: vec![(2, 500)],
        };
        let translator = RecordingTranslator::default();
        let results =
            transcribe_pages(pages(3), &recognizer, &translator, &ReportConfig::default()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].text(), "[OCR failed: 500]");
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        assert_eq!(
            results.iter().map(|r| r.page_num).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // The failed page never reached the translator.
        assert_eq!(translator.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tracking_id_never_reaches_translation() {
        let recognizer = ScriptedRecognizer { failing: vec![] };
        let translator = RecordingTranslator::default();
        transcribe_pages(pages(2), &recognizer, &translator, &ReportConfig::default()).await;

        for text in translator.seen.lock().unwrap().iter() {
            assert!(!text.contains("request_id"), "leaked: {text}");
            assert!(!text.contains("req-"), "leaked: {text}");
        }
    }

    #[tokio::test]
    async fn translation_failure_becomes_placeholder() {
        let recognizer = ScriptedRecognizer { failing: vec![] };
        let translator = RecordingTranslator {
            fail_on: Some("ಪುಟ 1".to_string()),
            ..Default::default()
        };
        let results =
            transcribe_pages(pages(2), &recognizer, &translator, &ReportConfig::default()).await;

        assert_eq!(
            results[0].error(),
            Some(&PageError::Translation {
                page: 1,
                reason: "translation service returned HTTP 429".into()
            })
        );
        assert!(results[0].text().starts_with("[Translation failed: "));
        assert!(results[1].is_ok());
    }

    #[tokio::test]
    async fn empty_document_yields_no_results() {
        let recognizer = ScriptedRecognizer { failing: vec![] };
        let translator = RecordingTranslator::default();
        let results =
            transcribe_pages(vec![], &recognizer, &translator, &ReportConfig::default()).await;
        assert!(results.is_empty());
    }
}
