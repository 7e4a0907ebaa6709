//! Report synthesis: one generation request per chunk, joined in chunk order.

use crate::config::ReportConfig;
use crate::error::{ChunkError, ReportError};
use crate::output::{Chunk, ChunkResponse};
use crate::pipeline::llm::{ModelError, ReportModel};
use crate::prompts::TITLE_REPORT_PROMPT;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Delimiter between chunk responses in the report body.
pub const CHUNK_DELIMITER: &str = "\n\n";

/// Draft every chunk in order.
///
/// An unusable response becomes a [`ChunkError`] for that chunk and the loop
/// moves on. A request that cannot be delivered stops the run.
pub async fn synthesize_chunks(
    chunks: &[Chunk],
    model: &dyn ReportModel,
    config: &ReportConfig,
) -> Result<Vec<ChunkResponse>, ReportError> {
    let template = config
        .instruction_prompt
        .as_deref()
        .unwrap_or(TITLE_REPORT_PROMPT);
    let total_chunks = chunks.len();
    let mut responses = Vec::with_capacity(total_chunks);
    info!("Drafting {} chunks with {}", total_chunks, model.name());

    for chunk in chunks {
        let chunk_num = chunk.chunk_num;
        let (first_page, last_page) = chunk.page_range().unwrap_or((0, 0));
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_start(chunk_num, total_chunks);
        }

        let start = Instant::now();
        let outcome = match model.generate(template, &chunk.text()).await {
            Ok(text) => Ok(text),
            Err(ModelError::Malformed { detail, raw }) => Err(ChunkError::ResponseUnparsable {
                chunk: chunk_num,
                detail,
                raw,
            }),
            Err(ModelError::Request(detail)) => {
                return Err(ReportError::Generation {
                    chunk: chunk_num,
                    detail,
                })
            }
            Err(ModelError::Fatal(e)) => return Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(text) => {
                debug!(
                    "Chunk {} (pages {}-{}): {} chars in {}ms",
                    chunk_num,
                    first_page,
                    last_page,
                    text.len(),
                    duration_ms
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_complete(chunk_num, total_chunks, text.len());
                }
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_error(chunk_num, total_chunks, &e.to_string());
                }
            }
        }

        responses.push(ChunkResponse {
            chunk_num,
            first_page,
            last_page,
            outcome,
            duration_ms,
        });
    }

    Ok(responses)
}

/// The report body: every chunk's text, in chunk order, blank-line separated.
pub fn join_report(responses: &[ChunkResponse]) -> String {
    responses
        .iter()
        .map(ChunkResponse::text)
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the chunk text back, or misbehaves on request.
    #[derive(Default)]
    struct EchoModel {
        inputs: Mutex<Vec<(String, String)>>,
        malformed_on: Option<usize>,
        unreachable_on: Option<usize>,
    }

    #[async_trait]
    impl ReportModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, template: &str, chunk_text: &str) -> Result<String, ModelError> {
            let call = {
                let mut inputs = self.inputs.lock().unwrap();
                inputs.push((template.to_string(), chunk_text.to_string()));
                inputs.len()
            };
            if self.malformed_on == Some(call) {
                return Err(ModelError::Malformed {
                    detail: "no results[0].generated_text in response".into(),
                    raw: r#"{"errors":[]}"#.into(),
                });
            }
            if self.unreachable_on == Some(call) {
                return Err(ModelError::Request("connection reset".into()));
            }
            Ok(format!("[{chunk_text}]"))
        }
    }

    fn chunk(chunk_num: usize, pages: &[usize]) -> Chunk {
        Chunk {
            chunk_num,
            pages: pages
                .iter()
                .map(|&page_num| PageResult {
                    page_num,
                    outcome: Ok(format!("p{page_num}")),
                    duration_ms: 0,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn responses_keep_chunk_order_and_join_with_blank_line() {
        let model = EchoModel::default();
        let chunks = vec![chunk(1, &[1, 2]), chunk(2, &[3])];
        let responses = synthesize_chunks(&chunks, &model, &ReportConfig::default())
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!((responses[0].first_page, responses[0].last_page), (1, 2));
        assert_eq!(join_report(&responses), "[p1\np2]\n\n[p3]");

        let inputs = model.inputs.lock().unwrap();
        assert_eq!(inputs[0].0, TITLE_REPORT_PROMPT);
        assert_eq!(inputs[0].1, "p1\np2");
    }

    #[tokio::test]
    async fn custom_prompt_replaces_template() {
        let model = EchoModel::default();
        let config = ReportConfig::builder()
            .instruction_prompt("Summarise:")
            .build()
            .unwrap();
        synthesize_chunks(&[chunk(1, &[1])], &model, &config)
            .await
            .unwrap();
        assert_eq!(model.inputs.lock().unwrap()[0].0, "Summarise:");
    }

    #[tokio::test]
    async fn malformed_response_is_local_to_its_chunk() {
        let model = EchoModel {
            malformed_on: Some(1),
            ..Default::default()
        };
        let chunks = vec![chunk(1, &[1]), chunk(2, &[2])];
        let responses = synthesize_chunks(&chunks, &model, &ReportConfig::default())
            .await
            .unwrap();

        assert!(!responses[0].is_ok());
        assert_eq!(
            responses[0].text(),
            r#"[Model response error: no results[0].generated_text in response - Raw: {"errors":[]}]"#
        );
        assert_eq!(responses[1].text(), "[p2]");
    }

    #[tokio::test]
    async fn undeliverable_request_stops_the_run() {
        let model = EchoModel {
            unreachable_on: Some(2),
            ..Default::default()
        };
        let chunks = vec![chunk(1, &[1]), chunk(2, &[2]), chunk(3, &[3])];
        let err = synthesize_chunks(&chunks, &model, &ReportConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Generation { chunk: 2, .. }));
        assert_eq!(model.inputs.lock().unwrap().len(), 2);
    }

    #[test]
    fn no_chunks_is_an_empty_report() {
        assert_eq!(join_report(&[]), "");
    }
}
