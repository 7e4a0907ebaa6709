//! Translation client and text segmentation.
//!
//! The web translation endpoint rejects very long inputs, so text is cut into
//! segments on line boundaries, translated one segment at a time, and the
//! translations are joined back with newlines in the original order.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a translation request produced no text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Request(String),

    #[error("translation service returned HTTP {0}")]
    Status(u16),

    #[error("unexpected translation response: {0}")]
    Malformed(String),
}

/// A service that translates text between two languages.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslationError>;
}

/// Client for the public Google Translate web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
    segment_chars: usize,
}

impl GoogleTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        segment_chars: usize,
        timeout_secs: Option<u64>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            segment_chars: segment_chars.max(1),
        })
    }

    async fn translate_segment(
        &self,
        segment: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t")])
            .form(&[("q", segment)])
            .send()
            .await
            .map_err(|e| TranslationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::Malformed(e.to_string()))?;
        parse_response(&body)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslationError> {
        let segments = split_segments(text, self.segment_chars);
        debug!(
            "Translating {} chars in {} segment(s) {} → {}",
            text.chars().count(),
            segments.len(),
            source,
            target
        );

        let mut translated = Vec::with_capacity(segments.len());
        for segment in &segments {
            translated.push(self.translate_segment(segment, source, target).await?);
        }
        Ok(translated.join("\n"))
    }
}

/// Pull the translated sentences out of the endpoint's nested arrays:
/// `[[["translated", "original", …], …], …]`.
fn parse_response(body: &Value) -> Result<String, TranslationError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed(truncate(&body.to_string(), 200)))?;

    Ok(sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect())
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// Cut `text` into segments of at most `max_chars` characters.
///
/// Segments end on line boundaries, so joining them with `\n` restores the
/// input. A single line longer than the limit is cut into pieces of its own.
pub fn split_segments(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        if line_len > max_chars {
            if let Some((segment, _)) = current.take() {
                segments.push(segment);
            }
            let chars: Vec<char> = line.chars().collect();
            segments.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        current = match current.take() {
            Some((mut segment, len)) if len + 1 + line_len <= max_chars => {
                segment.push('\n');
                segment.push_str(line);
                Some((segment, len + 1 + line_len))
            }
            Some((segment, _)) => {
                segments.push(segment);
                Some((line.to_string(), line_len))
            }
            None => Some((line.to_string(), line_len)),
        };
    }

    if let Some((segment, _)) = current {
        segments.push(segment);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_text_is_one_segment() {
        assert_eq!(split_segments("a\nb", 10), vec!["a\nb".to_string()]);
    }

    #[test]
    fn segments_respect_limit_and_rejoin() {
        let text = (0..50)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let segments = split_segments(&text, 60);
        assert!(segments.len() > 1);
        for s in &segments {
            assert!(s.chars().count() <= 60, "segment too long: {s:?}");
        }
        assert_eq!(segments.join("\n"), text);
    }

    #[test]
    fn overlong_line_is_cut() {
        let text = "x".repeat(25);
        let segments = split_segments(&text, 10);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments.concat(), text);
    }

    #[test]
    fn parses_nested_sentence_arrays() {
        let body = json!([[["Survey ", "ಸರ್ವೆ ", null], ["number 12", "ನಂಬರ್ 12", null]], null, "kn"]);
        assert_eq!(parse_response(&body).unwrap(), "Survey number 12");
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = parse_response(&json!({"error": "quota"})).unwrap_err();
        assert!(matches!(err, TranslationError::Malformed(_)));
    }
}
