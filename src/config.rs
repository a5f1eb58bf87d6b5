//! Configuration types for invoice extraction.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The config is resolved once, when an
//! [`crate::InvoiceExtractor`] is constructed, and is read-only afterwards.

use crate::error::InvoiceError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::pdf::PdfBackend;
use crate::pipeline::preprocess::PreprocessOptions;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Model used when none is named.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for an invoice extraction.
///
/// # Example
/// ```rust
/// use invoice_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .min_native_chars(40)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Minimum non-whitespace characters the PDF text layer must yield before
    /// it is trusted. Below this the whole document goes through OCR. Default: 20.
    ///
    /// The decision is taken once for the entire document, not per page.
    pub min_native_chars: usize,

    /// DPI used when rasterising PDF pages for OCR. Range: 72–400. Default: 200.
    pub render_dpi: u32,

    /// Cap on either dimension of a rendered page, in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Image cleanup applied before OCR.
    pub preprocess: PreprocessOptions,

    /// Tesseract language pack(s), e.g. `"eng"` or `"eng+deu"`. Default: `"eng"`.
    pub ocr_language: String,

    /// Path or name of the tesseract binary. Default: `"tesseract"` (PATH lookup).
    pub tesseract_path: String,

    /// Directory (or full path) of the pdfium shared library. `None` binds
    /// the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, uses [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and skips the credential check.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// PDF backend override. `None` uses pdfium.
    pub pdf_backend: Option<Arc<dyn PdfBackend>>,

    /// OCR engine override. `None` uses the tesseract CLI.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Sampling temperature for the field-parsing call. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 512.
    ///
    /// The reply is a four-key object, so this only needs headroom for
    /// long vendor names.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses
    /// [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_native_chars: 20,
            render_dpi: 200,
            max_rendered_pixels: 3000,
            password: None,
            preprocess: PreprocessOptions::default(),
            ocr_language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            pdfium_library_path: None,
            model: None,
            provider_name: None,
            provider: None,
            pdf_backend: None,
            ocr_engine: None,
            temperature: 0.0,
            max_tokens: 512,
            system_prompt: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("min_native_chars", &self.min_native_chars)
            .field("render_dpi", &self.render_dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("preprocess", &self.preprocess)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("pdf_backend", &self.pdf_backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Provider name after defaults.
    pub fn provider_name_or_default(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Model after defaults.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn min_native_chars(mut self, n: usize) -> Self {
        self.config.min_native_chars = n;
        self
    }

    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn preprocess(mut self, options: PreprocessOptions) -> Self {
        self.config.preprocess = options;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.pdf_backend = Some(backend);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.render_dpi < 72 || c.render_dpi > 400 {
            return Err(InvoiceError::InvalidConfig(format!(
                "Render DPI must be 72–400, got {}",
                c.render_dpi
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(InvoiceError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Environment variable holding the API key for a provider.
///
/// Returns `None` for local providers that need no key, and for providers
/// this crate does not know (the provider factory validates those itself).
pub fn credential_env_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        _ => None,
    }
}

/// Fail fast when the credential for `provider` is absent.
///
/// `lookup` abstracts the environment so callers (and tests) can supply
/// their own source; production code passes `|k| std::env::var(k).ok()`.
pub fn require_credential<F>(provider: &str, lookup: F) -> Result<(), InvoiceError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(env_var) = credential_env_var(provider) else {
        return Ok(());
    };
    match lookup(env_var) {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(InvoiceError::MissingCredential {
            provider: provider.to_string(),
            env_var: env_var.to_string(),
        }),
    }
}
