//! The extraction cascade: native text layer first, OCR as the fallback.
//!
//! ```text
//! PDF ──▶ text layer ──(≥ min_native_chars)──▶ native
//!              │
//!              └─(too little text)──▶ render ──▶ preprocess ──▶ OCR ──▶ ocr
//! image ─────────────────────────────────────▶ preprocess ──▶ OCR ──▶ ocr
//! ```
//!
//! The native/OCR decision is taken once for the whole document from the
//! total amount of recovered text. A PDF that mixes text pages and scanned
//! pages is therefore either read natively or fully OCR'd; there is no
//! per-page fallback.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::{meaningful_chars, ExtractedText, PageText, TextSource};
use crate::pipeline::input::{Document, DocumentKind};
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend, RenderOptions};
use crate::pipeline::preprocess::{preprocess, PreprocessOptions};
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The backends the cascade draws text from.
#[derive(Clone)]
pub struct TextSources {
    pub pdf: Arc<dyn PdfBackend>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl TextSources {
    pub fn new(pdf: Arc<dyn PdfBackend>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { pdf, ocr }
    }

    /// Use the overrides from `config`, else pdfium and tesseract.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let pdf = config.pdf_backend.clone().unwrap_or_else(|| {
            let backend = match &config.pdfium_library_path {
                Some(path) => PdfiumBackend::with_library_path(path),
                None => PdfiumBackend::new(),
            };
            Arc::new(backend) as Arc<dyn PdfBackend>
        });
        let ocr = config.ocr_engine.clone().unwrap_or_else(|| {
            Arc::new(TesseractEngine::new(
                config.tesseract_path.clone(),
                config.ocr_language.clone(),
            )) as Arc<dyn OcrEngine>
        });
        Self { pdf, ocr }
    }
}

/// Obtain the text of `document`, reporting which stage produced it.
///
/// # Errors
/// - [`InvoiceError::ExtractionUnavailable`] when pdfium or the OCR engine
///   is missing or fails
/// - [`InvoiceError::CorruptPdf`], [`InvoiceError::PasswordRequired`],
///   [`InvoiceError::WrongPassword`], [`InvoiceError::CorruptImage`] for bad input
pub async fn extract_text(
    document: &Document,
    sources: &TextSources,
    config: &ExtractionConfig,
) -> Result<ExtractedText, InvoiceError> {
    match document.kind() {
        DocumentKind::Pdf => extract_pdf(document, sources, config).await,
        DocumentKind::Image => {
            info!("'{}' is an image; running OCR", document.name());
            let image = decode_image(document)?;
            ocr_pages(sources, vec![image], config.preprocess).await
        }
    }
}

async fn extract_pdf(
    document: &Document,
    sources: &TextSources,
    config: &ExtractionConfig,
) -> Result<ExtractedText, InvoiceError> {
    let pdf = Arc::clone(&sources.pdf);
    let doc = document.clone();
    let password = config.password.clone();
    let pages = run_blocking("text layer", move || {
        pdf.page_texts(&doc, password.as_deref())
    })
    .await?;

    let text = join_pages(&pages);
    let chars = meaningful_chars(&text);
    if chars >= config.min_native_chars {
        info!(
            "Using native text layer: {} pages, {} chars",
            pages.len(),
            chars
        );
        return Ok(ExtractedText {
            text,
            source: TextSource::Native,
            pages,
        });
    }

    warn!(
        "Text layer of '{}' has {} chars (< {}); treating as scanned and running OCR",
        document.name(),
        chars,
        config.min_native_chars
    );

    let pdf = Arc::clone(&sources.pdf);
    let doc = document.clone();
    let password = config.password.clone();
    let render = RenderOptions {
        dpi: config.render_dpi,
        max_pixels: config.max_rendered_pixels,
    };
    let images = run_blocking("render", move || {
        pdf.render_pages(&doc, password.as_deref(), &render)
    })
    .await?;

    ocr_pages(sources, images, config.preprocess).await
}

/// Preprocess and OCR each image in order.
async fn ocr_pages(
    sources: &TextSources,
    images: Vec<DynamicImage>,
    options: PreprocessOptions,
) -> Result<ExtractedText, InvoiceError> {
    let ocr = Arc::clone(&sources.ocr);
    let pages = run_blocking("ocr", move || {
        images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                let prepared = preprocess(image, &options);
                let text = ocr.recognize(&prepared)?;
                debug!("OCR page {}: {} chars", idx + 1, text.len());
                Ok(PageText {
                    page_index: idx,
                    text,
                })
            })
            .collect::<Result<Vec<_>, InvoiceError>>()
    })
    .await?;

    let text = join_pages(&pages);
    info!(
        "OCR produced {} chars over {} pages",
        meaningful_chars(&text),
        pages.len()
    );
    Ok(ExtractedText {
        text,
        source: TextSource::Ocr,
        pages,
    })
}

/// Join page texts in page order, one newline between pages.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.trim_end_matches(['\n', '\r']))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_image(document: &Document) -> Result<DynamicImage, InvoiceError> {
    image::load_from_memory(document.bytes()).map_err(|e| InvoiceError::CorruptImage {
        name: document.name().to_string(),
        detail: e.to_string(),
    })
}

/// Run a blocking closure on the blocking pool.
async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T, InvoiceError>
where
    F: FnOnce() -> Result<T, InvoiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| InvoiceError::Internal(format!("{stage} task panicked: {e}")))?
}
