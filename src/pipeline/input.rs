//! Input resolution: load a user-supplied path or URL into memory.
//!
//! Splitting works on an in-memory buffer, so a URL is downloaded straight
//! into memory and a local file is read once. The PDF magic bytes (`%PDF`)
//! are checked before returning so callers get a meaningful error rather than
//! a parser failure deep inside the splitter.

use crate::error::ReportError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A PDF loaded into memory, with the name it was known by.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File name (`deed.pdf`), or the last URL segment for downloads.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl LoadedDocument {
    /// Wrap bytes that are already in memory, checking they look like a PDF.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ReportError> {
        let name = name.into();
        check_magic(&name, &bytes)?;
        Ok(Self { name, bytes })
    }

    /// Name without extension, used for the rendered document's file name.
    pub fn base_name(&self) -> String {
        base_name_of(&self.name)
    }
}

/// Strip the directory and extension: `scans/deed.pdf` → `deed`.
pub fn base_name_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input: download it if it is a URL, read it otherwise.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, ReportError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

async fn load_local(path_str: &str) -> Result<LoadedDocument, ReportError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ReportError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReportError::PermissionDenied { path });
        }
        Err(_) => return Err(ReportError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    check_magic(&name, &bytes)?;
    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(LoadedDocument { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, ReportError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReportError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let name = file_name_from_url(url);
    check_magic(&name, &bytes)?;
    info!("Downloaded {} bytes as '{}'", bytes.len(), name);

    Ok(LoadedDocument { name, bytes })
}

/// Take the last path segment of the URL if it looks like a file name.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), ReportError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(ReportError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}
