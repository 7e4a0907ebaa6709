//! Recognition service client: one single-page PDF in, structured JSON out.
//!
//! The service takes the page as a multipart file upload (field `file`) and
//! answers with an opaque JSON object on `200 OK`; any other status is a
//! failure for that page. The only fields we know about are the
//! request-tracking ids, which are stripped before the result goes anywhere
//! else: it differs on every call and would leak into the translated text and
//! the model input.

use crate::error::PageError;
use crate::pipeline::split::SinglePage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Top-level fields removed from every recognition result.
pub const TRACKING_FIELDS: &[&str] = &["request_id", "tracking_id"];

/// A service that extracts structured text from one page.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise one page. Every failure is page-local.
    async fn recognize(&self, page: &SinglePage) -> Result<Value, PageError>;
}

/// HTTP client for the recognition service.
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    client: Client,
    endpoint: String,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>, timeout_secs: Option<u64>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, page: &SinglePage) -> Result<Value, PageError> {
        // The upload is built from the in-memory page; nothing is staged on disk.
        let part = Part::bytes(page.bytes.clone())
            .file_name(page.file_name())
            .mime_str("application/pdf")
            .map_err(|e| PageError::Unexpected {
                page: page.number,
                detail: e.to_string(),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PageError::OcrRequest {
                page: page.number,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PageError::OcrStatus {
                page: page.number,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| PageError::OcrRequest {
            page: page.number,
            detail: e.to_string(),
        })?;
        debug!("Page {}: recognition returned {} bytes", page.number, body.len());

        serde_json::from_str(&body).map_err(|e| PageError::Unexpected {
            page: page.number,
            detail: format!("recognition response is not JSON: {e}"),
        })
    }
}

/// Remove the tracking fields and serialise the rest as pretty JSON.
///
/// Field order is kept as the service sent it and non-ASCII text is written
/// as-is, so Kannada script reaches the translator unescaped.
pub fn canonical_text(mut result: Value) -> String {
    if let Value::Object(ref mut map) = result {
        for field in TRACKING_FIELDS {
            map.shift_remove(*field);
        }
    }
    serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
}
