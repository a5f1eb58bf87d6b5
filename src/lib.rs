//! # invoice-extract
//!
//! Pull the invoice number, date, vendor name and total amount out of a PDF
//! or image invoice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Cascade   PDF text layer; if it holds too little text, render
//!  │               pages and OCR them (tesseract). Images go straight to OCR.
//!  ├─ 3. Fields    one LLM call turns the text into a fixed four-key JSON object
//!  └─ 4. Output    ExtractedFields + source used + token/timing stats
//! ```
//!
//! Every field is either a string or `null`; `null` means the value was not
//! found. The four keys are always present.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_extract::{ExtractionConfig, InvoiceExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fails here, before any file is read, if OPENAI_API_KEY is unset.
//!     let extractor = InvoiceExtractor::new(ExtractionConfig::default())?;
//!     let result = extractor.extract_input("invoice.pdf").await?;
//!     println!("{}", serde_json::to_string_pretty(&result.fields)?);
//!     eprintln!("text via {} in {}ms", result.source, result.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-extract` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! ## Runtime requirements
//!
//! - `libpdfium` loadable by the system loader, or pointed to by
//!   [`ExtractionConfig::pdfium_library_path`]
//! - the `tesseract` binary with the configured language pack, for scanned
//!   PDFs and images

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::InvoiceError;
pub use extract::{extract_invoice, extract_invoice_sync, extract_text_only, InvoiceExtractor};
pub use output::{
    ExtractedFields, ExtractedText, ExtractionStats, InvoiceExtraction, PageText, TextSource,
};
pub use pipeline::cascade::TextSources;
pub use pipeline::input::{Document, DocumentKind};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::pdf::{PdfBackend, PdfiumBackend, RenderOptions};
pub use pipeline::preprocess::PreprocessOptions;
