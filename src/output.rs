//! Result types produced by a report run.
//!
//! Every entity here is created once and never mutated afterwards, with one
//! exception: [`ReportOutput::rendered`] flips to `true` the first time the
//! report is rendered to a document.

use crate::error::{ChunkError, PageError, ReportError};
use crate::pipeline::{postprocess, render};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of transcribing one page: translated text or a page error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Translated text, or the reason the page has none.
    pub outcome: Result<String, PageError>,
    /// Wall-clock time spent on recognition + translation.
    pub duration_ms: u64,
}

impl PageResult {
    /// Key used when pages are listed by name, e.g. `"Page 3"`.
    pub fn key(&self) -> String {
        format!("Page {}", self.page_num)
    }

    /// The text that flows downstream: the translation or the placeholder.
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => e.placeholder(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&PageError> {
        self.outcome.as_ref().err()
    }
}

/// A contiguous, bounded run of pages sent to the model in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-indexed position among all chunks.
    pub chunk_num: usize,
    pub pages: Vec<PageResult>,
}

impl Chunk {
    /// Page texts in page order, one per line.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(PageResult::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First and last page number covered, `None` for an empty chunk.
    pub fn page_range(&self) -> Option<(usize, usize)> {
        let first = self.pages.first()?.page_num;
        let last = self.pages.last()?.page_num;
        Some((first, last))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// The model's answer for one chunk, tied to the chunk's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub chunk_num: usize,
    pub first_page: usize,
    pub last_page: usize,
    pub outcome: Result<String, ChunkError>,
    pub duration_ms: u64,
}

impl ChunkResponse {
    /// Generated text, or the placeholder when the response was unusable.
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => e.placeholder(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_pages: usize,
    pub transcribed_pages: usize,
    pub failed_pages: usize,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub transcription_duration_ms: u64,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Basic facts about an input PDF, available without any service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// File name of the input (last URL segment for downloads).
    pub file_name: String,
    pub page_count: usize,
    pub pdf_version: String,
    pub size_bytes: usize,
}

/// Everything a run produced.
///
/// A fresh `ReportOutput` always starts with `rendered == false`; re-running
/// the pipeline builds a new one from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    /// Base name used for the rendered document (`<base> AI Summary.docx`).
    pub base_name: String,
    /// Per-page transcription results, in page order.
    pub pages: Vec<PageResult>,
    /// Per-chunk model responses, in chunk order.
    pub chunks: Vec<ChunkResponse>,
    /// The authoritative report body: chunk texts joined by a blank line.
    pub report: String,
    pub stats: ReportStats,
    /// Whether [`ReportOutput::render_once`] has produced a document.
    pub rendered: bool,
    pub document_path: Option<PathBuf>,
}

impl ReportOutput {
    /// Markdown handed to the renderer: each chunk response cleaned up on
    /// its own, then joined with the same blank-line delimiter as `report`.
    pub fn render_markdown(&self) -> String {
        self.chunks
            .iter()
            .map(|c| postprocess::clean_markdown(&c.text()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the report to `<output_dir>/<base> AI Summary.docx` unless this
    /// run has already been rendered, returning the document path either way.
    pub fn render_once(&mut self, output_dir: &Path) -> Result<PathBuf, ReportError> {
        if self.rendered {
            if let Some(ref path) = self.document_path {
                return Ok(path.clone());
            }
        }
        let path = render::render_document(&self.render_markdown(), &self.base_name, output_dir)?;
        self.rendered = true;
        self.document_path = Some(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, outcome: Result<String, PageError>) -> PageResult {
        PageResult {
            page_num: n,
            outcome,
            duration_ms: 0,
        }
    }

    #[test]
    fn page_text_falls_back_to_placeholder() {
        let ok = page(1, Ok("Survey No. 12".into()));
        let failed = page(2, Err(PageError::OcrStatus { page: 2, status: 503 }));
        assert_eq!(ok.text(), "Survey No. 12");
        assert_eq!(failed.text(), "[OCR failed: 503]");
        assert_eq!(failed.key(), "Page 2");
    }

    #[test]
    fn chunk_text_joins_pages_with_newline() {
        let chunk = Chunk {
            chunk_num: 1,
            pages: vec![page(4, Ok("a".into())), page(5, Ok("b".into()))],
        };
        assert_eq!(chunk.text(), "a\nb");
        assert_eq!(chunk.page_range(), Some((4, 5)));
    }

    #[test]
    fn empty_chunk_has_no_range() {
        let chunk = Chunk {
            chunk_num: 1,
            pages: vec![],
        };
        assert!(chunk.is_empty());
        assert_eq!(chunk.page_range(), None);
    }
}
