//! Error types for the invoice-extract library.
//!
//! Everything funnels into [`InvoiceError`]. Variants are grouped by the stage
//! that raises them so the CLI (or any other shell) can show a precise message
//! without inspecting strings. No stage recovers silently: an OCR backend that
//! is missing is an error, never an empty string, because empty text would be
//! indistinguishable from a genuinely blank invoice.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the invoice-extract library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Invoice file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but could not be read as a file (a directory, an I/O fault).
    #[error("Cannot read invoice file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Neither the extension nor the leading bytes identify a PDF or a supported image.
    #[error("Unsupported document '{name}': expected a PDF, PNG or JPEG invoice")]
    UnsupportedFormat { name: String },

    /// Declared as a PDF, but the bytes do not start with `%PDF`.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// Image bytes could not be decoded.
    #[error("Image '{name}' could not be decoded: {detail}")]
    CorruptImage { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The OCR engine or the PDF backend is missing or failed while running.
    #[error("Text extraction unavailable ({backend}): {detail}")]
    ExtractionUnavailable { backend: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The model replied, but not with the fixed four-key JSON object.
    #[error("Model output does not match the invoice schema: {detail}\nReply began with: {excerpt:?}")]
    MalformedModelOutput { detail: String, excerpt: String },

    /// The provider rejected the credential (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    UpstreamAuthError { provider: String, detail: String },

    /// The provider returned HTTP 429 or a quota error.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    UpstreamRateLimited { provider: String, detail: String },

    /// Any other provider failure.
    #[error("LLM API error from provider '{provider}': {detail}")]
    LlmApiError { provider: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The credential for the selected provider is absent or empty.
    #[error("Missing credential for provider '{provider}': set {env_var} (environment or .env file)")]
    MissingCredential { provider: String, env_var: String },

    /// The provider factory could not build the named provider.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Shorthand for an OCR/rendering backend failure.
    pub fn unavailable(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        InvoiceError::ExtractionUnavailable {
            backend: backend.into(),
            detail: detail.into(),
        }
    }
}
