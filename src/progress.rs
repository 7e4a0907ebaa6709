//! Progress-callback trait for per-page and per-chunk run events.
//!
//! Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive
//! events while the pipeline works through the document.
//!
//! # Example
//!
//! ```rust
//! use title_report::{ReportConfig, ReportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl ReportProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page and chunk.
///
/// The pipeline is strictly sequential, so calls never overlap, but the trait
/// is `Send + Sync` so the callback can live in an async runtime. Every
/// method has a no-op default.
pub trait ReportProgressCallback: Send + Sync {
    /// Called once after the document has been split.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is sent for recognition.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was recognised and translated.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page was replaced by a placeholder.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called just before a chunk is sent to the model.
    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        let _ = (chunk_num, total_chunks);
    }

    /// Called when a chunk produced generated text.
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, text_len: usize) {
        let _ = (chunk_num, total_chunks, text_len);
    }

    /// Called when a chunk was replaced by a placeholder.
    fn on_chunk_error(&self, chunk_num: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_num, total_chunks, error);
    }

    /// Called once the report body has been assembled.
    fn on_run_complete(&self, total_pages: usize, failed_pages: usize, total_chunks: usize) {
        let _ = (total_pages, failed_pages, total_chunks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;
