//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! Invoices are small, so the whole file is kept in memory; pdfium reads it
//! straight from the byte slice. The declared type comes from the file
//! extension, with a magic-byte sniff when the extension says nothing. A
//! declared PDF must start with `%PDF` so callers get a meaningful error
//! rather than a pdfium crash.

use crate::error::InvoiceError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Declared type of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Infer the type from a file name's extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" => Some(DocumentKind::Image),
            _ => None,
        }
    }

    /// Infer the type from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(DocumentKind::Pdf);
        }
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) | Ok(image::ImageFormat::Jpeg) => {
                Some(DocumentKind::Image)
            }
            _ => None,
        }
    }
}

/// An uploaded invoice: raw bytes plus declared type.
///
/// Immutable once built. Bytes are behind an `Arc` so blocking stages can
/// take a cheap clone onto the blocking thread pool.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    kind: DocumentKind,
    bytes: Arc<[u8]>,
}

impl Document {
    /// Build a document from a name and its bytes, validating the type.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, InvoiceError> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();

        let kind = DocumentKind::from_name(&name)
            .or_else(|| DocumentKind::sniff(&bytes))
            .ok_or_else(|| InvoiceError::UnsupportedFormat { name: name.clone() })?;

        Self::with_kind(name, kind, bytes)
    }

    /// Build a document with an explicitly declared type.
    pub fn with_kind(
        name: impl Into<String>,
        kind: DocumentKind,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Self, InvoiceError> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();

        if kind == DocumentKind::Pdf && !bytes.starts_with(b"%PDF") {
            let magic = bytes.iter().take(4).copied().collect();
            return Err(InvoiceError::NotAPdf { name, magic });
        }

        Ok(Self {
            name,
            kind,
            bytes: bytes.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL into a [`Document`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, InvoiceError> {
    if input.trim().is_empty() {
        return Err(InvoiceError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path_str: &str) -> Result<Document, InvoiceError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => InvoiceError::FileNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => InvoiceError::PermissionDenied { path: path.clone() },
        _ => InvoiceError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local invoice: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(name, bytes)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, InvoiceError> {
    info!("Downloading invoice from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InvoiceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let name = filename_for(url, content_type.as_deref());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| InvoiceError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Document::from_bytes(name, bytes.to_vec())
}

/// Pick a file name from the URL path, falling back to the content type.
fn filename_for(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    match content_type {
        Some(ct) if ct.starts_with("image/png") => "invoice.png".to_string(),
        Some(ct) if ct.starts_with("image/jpeg") => "invoice.jpg".to_string(),
        _ => "invoice.pdf".to_string(),
    }
}
