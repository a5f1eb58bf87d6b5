//! Request entry points.
//!
//! [`InvoiceExtractor`] is built once at process start. Construction resolves
//! the LLM provider and checks its credential, so a missing API key fails
//! before any document is read. Each call to [`InvoiceExtractor::extract`]
//! then runs one request: cascade, then field parser. Nothing is cached or
//! shared between requests.

use crate::config::{require_credential, ExtractionConfig};
use crate::error::InvoiceError;
use crate::output::{ExtractedText, ExtractionStats, InvoiceExtraction};
use crate::pipeline::cascade::{self, TextSources};
use crate::pipeline::fields;
use crate::pipeline::input::{self, Document};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Extracts invoice fields; holds the resolved provider and text backends.
#[derive(Clone)]
pub struct InvoiceExtractor {
    config: ExtractionConfig,
    provider: Arc<dyn LLMProvider>,
    provider_label: String,
    sources: TextSources,
}

impl std::fmt::Debug for InvoiceExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceExtractor")
            .field("provider", &self.provider_label)
            .field("config", &self.config)
            .finish()
    }
}

impl InvoiceExtractor {
    /// Resolve provider and credential from the process environment.
    ///
    /// # Errors
    /// [`InvoiceError::MissingCredential`] when the selected provider's API
    /// key is not set; [`InvoiceError::ProviderNotConfigured`] when the
    /// provider cannot be built.
    pub fn new(config: ExtractionConfig) -> Result<Self, InvoiceError> {
        Self::with_env(config, |k| std::env::var(k).ok())
    }

    /// Like [`Self::new`], reading credentials through `lookup`.
    pub fn with_env<F>(config: ExtractionConfig, lookup: F) -> Result<Self, InvoiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (provider, provider_label) = match config.provider {
            Some(ref provider) => (Arc::clone(provider), "custom".to_string()),
            None => {
                let name = config.provider_name_or_default();
                require_credential(name, lookup)?;
                let model = config.model_or_default();
                let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                    InvoiceError::ProviderNotConfigured {
                        provider: name.to_string(),
                        hint: format!("{e}"),
                    }
                })?;
                info!("Using provider '{}' with model '{}'", name, model);
                (provider, name.to_string())
            }
        };

        let sources = TextSources::from_config(&config);
        Ok(Self {
            config,
            provider,
            provider_label,
            sources,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run one request against an in-memory document.
    pub async fn extract(&self, document: &Document) -> Result<InvoiceExtraction, InvoiceError> {
        let total_start = Instant::now();
        info!("Extracting invoice fields from '{}'", document.name());

        // ── Step 1: Cascade ──────────────────────────────────────────────
        let text_start = Instant::now();
        let extracted = cascade::extract_text(document, &self.sources, &self.config).await?;
        let text_duration_ms = text_start.elapsed().as_millis() as u64;
        info!(
            "Text via {} path: {} chars in {}ms",
            extracted.source,
            extracted.meaningful_chars(),
            text_duration_ms
        );

        // ── Step 2: Field parser ─────────────────────────────────────────
        let llm_start = Instant::now();
        let parsed =
            fields::parse_fields(&self.provider, &self.provider_label, &extracted.text, &self.config)
                .await?;
        let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

        let stats = ExtractionStats {
            page_count: extracted.pages.len(),
            text_chars: extracted.meaningful_chars(),
            input_tokens: parsed.input_tokens,
            output_tokens: parsed.output_tokens,
            text_duration_ms,
            llm_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!("Extraction complete in {}ms", stats.total_duration_ms);

        Ok(InvoiceExtraction {
            document: document.name().to_string(),
            fields: parsed.fields,
            source: extracted.source,
            stats,
        })
    }

    /// Resolve a path or URL, then [`Self::extract`].
    pub async fn extract_input(&self, input_str: impl AsRef<str>) -> Result<InvoiceExtraction, InvoiceError> {
        let document = input::resolve_input(input_str.as_ref(), self.config.download_timeout_secs).await?;
        self.extract(&document).await
    }

    /// Extract and write the four fields as pretty JSON to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn extract_to_file(
        &self,
        input_str: impl AsRef<str>,
        output_path: impl AsRef<Path>,
    ) -> Result<InvoiceExtraction, InvoiceError> {
        let extraction = self.extract_input(input_str).await?;
        let json = serde_json::to_string_pretty(&extraction.fields)
            .map_err(|e| InvoiceError::Internal(format!("serialising fields: {e}")))?;
        write_atomic(output_path.as_ref(), json.as_bytes()).await?;
        Ok(extraction)
    }
}

/// One-shot helper: build an extractor from `config` and run one input.
///
/// Callers handling many documents should build an [`InvoiceExtractor`] once
/// and reuse it.
pub async fn extract_invoice(
    input_str: impl AsRef<str>,
    config: ExtractionConfig,
) -> Result<InvoiceExtraction, InvoiceError> {
    InvoiceExtractor::new(config)?.extract_input(input_str).await
}

/// Synchronous wrapper: build an extractor and run one input.
///
/// Creates a temporary tokio runtime internally.
pub fn extract_invoice_sync(
    input_str: impl AsRef<str>,
    config: ExtractionConfig,
) -> Result<InvoiceExtraction, InvoiceError> {
    let extractor = InvoiceExtractor::new(config)?;
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extractor.extract_input(input_str))
}

/// Run only the cascade on a path or URL.
///
/// Does not require an LLM provider or API key.
pub async fn extract_text_only(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractedText, InvoiceError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let sources = TextSources::from_config(config);
    cascade::extract_text(&document, &sources, config).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InvoiceError> {
    let fail = |e| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}
