//! Pipeline stages for drafting a Report on Title from a scanned PDF.
//!
//! Each submodule implements exactly one step. Stages hand their output to
//! the next and share no other state.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ transcribe ──▶ chunk ──▶ synthesize ──▶ render
//! (path/URL) (lopdf)  (ocr+translate) (batches) (llm)         (docx)
//! ```
//!
//! 1. [`input`]      — load the user-supplied path or URL into memory
//! 2. [`split`]      — one standalone PDF per page; runs in `spawn_blocking`
//! 3. [`transcribe`] — per page: [`ocr`] → canonical JSON → [`translate`];
//!    failures become page placeholders
//! 4. [`chunk`]      — contiguous batches of `chunk_size` pages
//! 5. [`synthesize`] — one [`llm`] request per chunk, joined in chunk order
//! 6. [`render`]     — [`postprocess`]ed Markdown to a Word document;
//!    [`outline`] reads it back

pub mod chunk;
#[cfg(test)]
pub(crate) mod http_stub;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod outline;
pub mod postprocess;
pub mod render;
pub mod split;
pub mod synthesize;
pub mod transcribe;
pub mod translate;
