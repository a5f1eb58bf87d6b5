//! End-to-end tests for invoice-extract.
//!
//! These use real invoices in `./test_cases/`, the system pdfium library, the
//! `tesseract` binary and live LLM API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Expected files (any that are missing are skipped):
//!   test_cases/digital_invoice.pdf   text-layer PDF
//!   test_cases/scanned_invoice.pdf   image-only PDF
//!   test_cases/invoice_photo.jpg     photographed invoice
//!   test_cases/blank.png             blank page

use invoice_extract::{
    extract_invoice_sync, extract_text_only, ExtractionConfig, InvoiceExtractor, TesseractEngine,
    TextSource,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Route library logs to the test output; `RUST_LOG` overrides the default.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("invoice_extract=info")),
        )
        .with_test_writer()
        .try_init();
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn tesseract_missing() -> bool {
    if TesseractEngine::default().is_available() {
        return false;
    }
    println!("SKIP — tesseract binary not found");
    true
}

// ── Cascade only (no LLM) ────────────────────────────────────────────────────

#[tokio::test]
async fn test_digital_pdf_uses_text_layer() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digital_invoice.pdf"));

    let text = extract_text_only(path.to_str().unwrap(), &ExtractionConfig::default())
        .await
        .expect("cascade should succeed");

    assert_eq!(text.source, TextSource::Native);
    assert!(text.meaningful_chars() >= 20);
    println!("{} chars over {} pages", text.meaningful_chars(), text.pages.len());
}

#[tokio::test]
async fn test_scanned_pdf_uses_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_invoice.pdf"));
    if tesseract_missing() {
        return;
    }

    let text = extract_text_only(path.to_str().unwrap(), &ExtractionConfig::default())
        .await
        .expect("cascade should succeed");

    assert_eq!(text.source, TextSource::Ocr);
    assert!(!text.text.trim().is_empty(), "OCR recognised nothing");
}

#[tokio::test]
async fn test_photo_uses_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("invoice_photo.jpg"));
    if tesseract_missing() {
        return;
    }

    let text = extract_text_only(path.to_str().unwrap(), &ExtractionConfig::default())
        .await
        .expect("cascade should succeed");
    assert_eq!(text.source, TextSource::Ocr);
    assert_eq!(text.pages.len(), 1);
}

// ── Full extraction (live LLM) ───────────────────────────────────────────────

#[tokio::test]
async fn test_extract_digital_invoice_to_file() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digital_invoice.pdf"));
    let out_path = output_dir().join("digital_invoice_fields.json");

    let extractor =
        InvoiceExtractor::new(ExtractionConfig::default()).expect("API key should be configured");
    let result = extractor
        .extract_to_file(path.to_str().unwrap(), &out_path)
        .await
        .expect("extraction should succeed");

    assert_eq!(result.source, TextSource::Native);
    assert!(!result.fields.is_empty(), "no field was found");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written.as_object().unwrap().len(), 4);

    println!("{}", serde_json::to_string_pretty(&result).unwrap());
}

#[tokio::test]
async fn test_blank_image_gives_all_null() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("blank.png"));
    if tesseract_missing() {
        return;
    }

    let extractor =
        InvoiceExtractor::new(ExtractionConfig::default()).expect("API key should be configured");
    let result = extractor
        .extract_input(path.to_str().unwrap())
        .await
        .expect("a blank page is not an error");

    assert_eq!(result.source, TextSource::Ocr);
    assert!(result.fields.is_empty(), "got: {:?}", result.fields);
}

#[test]
fn test_sync_wrapper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digital_invoice.pdf"));

    let result = extract_invoice_sync(path.to_str().unwrap(), ExtractionConfig::default())
        .expect("extraction should succeed");
    assert!(result.stats.input_tokens > 0);
    assert!(result.stats.total_duration_ms >= result.stats.llm_duration_ms);
}
