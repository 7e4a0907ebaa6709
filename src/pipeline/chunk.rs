//! Chunk aggregation: group page results into bounded, ordered batches.

use crate::output::{Chunk, PageResult};
use tracing::debug;

/// Partition `pages` into contiguous chunks of `chunk_size` pages, the last
/// chunk holding the remainder.
///
/// Chunks are numbered from 1. Every page lands in exactly one chunk and
/// page order is kept. An empty input yields no chunks.
pub fn chunk_pages(pages: Vec<PageResult>, chunk_size: usize) -> Vec<Chunk> {
    let size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(pages.len().div_ceil(size));
    let mut pages = pages.into_iter().peekable();

    while pages.peek().is_some() {
        let batch: Vec<PageResult> = pages.by_ref().take(size).collect();
        chunks.push(Chunk {
            chunk_num: chunks.len() + 1,
            pages: batch,
        });
    }

    debug!("Grouped pages into {} chunks of ≤{}", chunks.len(), size);
    chunks
}
