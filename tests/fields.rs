//! Field record shape, reply decoding, the model call and start-up
//! credential checks.

use edgequake_llm::{LLMProvider, LlmError, MockProvider};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use invoice_extract::config::{credential_env_var, require_credential};
use invoice_extract::pipeline::fields::{classify_llm_error, decode_fields};
use invoice_extract::prompts::{invoice_text_message, DEFAULT_SYSTEM_PROMPT};
use invoice_extract::{
    Document, ExtractedFields, ExtractionConfig, InvoiceError, InvoiceExtractor, OcrEngine,
    PageText, PdfBackend, RenderOptions, TextSource,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

fn acme() -> ExtractedFields {
    ExtractedFields {
        invoice_number: Some("1042".into()),
        date: Some("2024-01-15".into()),
        vendor_name: Some("Acme Corp".into()),
        total_amount: Some("532.10".into()),
    }
}

// ── Shape ────────────────────────────────────────────────────────────────────

#[test]
fn serialised_record_always_has_exactly_four_keys() {
    for fields in [acme(), ExtractedFields::not_found()] {
        let value = serde_json::to_value(&fields).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["date", "invoice_number", "total_amount", "vendor_name"]);
    }
}

#[test]
fn record_round_trips_through_json() {
    let mut partial = acme();
    partial.date = None;
    for fields in [acme(), partial, ExtractedFields::not_found()] {
        let json = serde_json::to_string(&fields).unwrap();
        let back: ExtractedFields = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }
}

// ── Decoding model replies ──────────────────────────────────────────────────

#[test]
fn acme_reply_decodes_to_expected_fields() {
    let reply = r#"{"invoice_number": "1042", "date": "2024-01-15", "vendor_name": "Acme Corp", "total_amount": "532.10"}"#;
    assert_eq!(decode_fields(reply).unwrap(), acme());
}

#[test]
fn blank_scan_reply_is_all_null_and_not_an_error() {
    let reply = r#"{"invoice_number": null, "date": null, "vendor_name": null, "total_amount": null}"#;
    let fields = decode_fields(reply).unwrap();
    assert!(fields.is_empty());
    assert_eq!(fields, ExtractedFields::not_found());
}

#[test]
fn whitespace_values_become_null() {
    let reply = r#"{"invoice_number": "  ", "date": "", "vendor_name": " Acme Corp ", "total_amount": null}"#;
    let fields = decode_fields(reply).unwrap();
    assert_eq!(fields.invoice_number, None);
    assert_eq!(fields.date, None);
    assert_eq!(fields.vendor_name.as_deref(), Some("Acme Corp"));
}

#[test]
fn fenced_reply_is_accepted() {
    let reply = "```json\n{\"invoice_number\": \"1042\", \"date\": \"2024-01-15\", \"vendor_name\": \"Acme Corp\", \"total_amount\": \"532.10\"}\n```";
    assert_eq!(decode_fields(reply).unwrap(), acme());
}

#[test]
fn missing_key_is_malformed() {
    let reply = r#"{"invoice_number": "1042", "date": "2024-01-15", "vendor_name": "Acme Corp"}"#;
    assert!(matches!(
        decode_fields(reply),
        Err(InvoiceError::MalformedModelOutput { .. })
    ));
}

#[test]
fn extra_key_is_malformed() {
    let reply = r#"{"invoice_number": null, "date": null, "vendor_name": null, "total_amount": null, "products": []}"#;
    assert!(matches!(
        decode_fields(reply),
        Err(InvoiceError::MalformedModelOutput { .. })
    ));
}

#[test]
fn numeric_value_is_malformed() {
    let reply = r#"{"invoice_number": 1042, "date": null, "vendor_name": null, "total_amount": 532.1}"#;
    assert!(matches!(
        decode_fields(reply),
        Err(InvoiceError::MalformedModelOutput { .. })
    ));
}

#[test]
fn prose_reply_is_malformed() {
    let err = decode_fields("I could not find an invoice in this text.").unwrap_err();
    assert!(err.to_string().contains("I could not find"));
}

// ── Upstream errors ──────────────────────────────────────────────────────────

#[test]
fn upstream_errors_are_classified() {
    assert!(matches!(
        classify_llm_error("openai", LlmError::AuthError("invalid api key".into())),
        InvoiceError::UpstreamAuthError { .. }
    ));
    assert!(matches!(
        classify_llm_error("openai", LlmError::RateLimited("retry in 4012ms".into())),
        InvoiceError::UpstreamRateLimited { .. }
    ));
    assert!(matches!(
        classify_llm_error(
            "openai",
            LlmError::ApiError("500 Internal Server Error (request id req_7e403a)".into())
        ),
        InvoiceError::LlmApiError { .. }
    ));
}

// ── Model call through the extractor ─────────────────────────────────────────

struct TextLayer(&'static str);

impl PdfBackend for TextLayer {
    fn name(&self) -> &str {
        "text-layer"
    }

    fn page_texts(&self, _pdf: &Document, _password: Option<&str>) -> Result<Vec<PageText>, InvoiceError> {
        Ok(vec![PageText {
            page_index: 0,
            text: self.0.to_string(),
        }])
    }

    fn render_pages(
        &self,
        _pdf: &Document,
        _password: Option<&str>,
        _options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, InvoiceError> {
        panic!("text-layer PDFs are never rendered")
    }
}

struct BlankOcr;

impl OcrEngine for BlankOcr {
    fn name(&self) -> &str {
        "blank"
    }

    fn recognize(&self, _image: &GrayImage) -> Result<String, InvoiceError> {
        Ok(String::new())
    }
}

const ACME_TEXT: &str = "Invoice #1042, Date: 2024-01-15, Vendor: Acme Corp, Total: $532.10";
const ACME_REPLY: &str = r#"{"invoice_number": "1042", "date": "2024-01-15", "vendor_name": "Acme Corp", "total_amount": "532.10"}"#;
const NULL_REPLY: &str = r#"{"invoice_number": null, "date": null, "vendor_name": null, "total_amount": null}"#;

async fn extractor_replying(reply: &str, pdf_text: &'static str) -> InvoiceExtractor {
    let mock = MockProvider::new();
    mock.add_response(reply).await;
    let config = ExtractionConfig::builder()
        .provider(Arc::new(mock) as Arc<dyn LLMProvider>)
        .pdf_backend(Arc::new(TextLayer(pdf_text)))
        .ocr_engine(Arc::new(BlankOcr))
        .build()
        .unwrap();
    // A pre-built provider skips the credential lookup entirely.
    InvoiceExtractor::with_env(config, |_| None).unwrap()
}

fn pdf_doc() -> Document {
    Document::from_bytes("acme.pdf", b"%PDF-1.7\n% test fixture\n".to_vec()).unwrap()
}

fn blank_scan() -> Document {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, image::Rgb([255, 255, 255])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Document::from_bytes("blank.png", buf.into_inner()).unwrap()
}

#[tokio::test]
async fn acme_pdf_goes_native_and_yields_all_four_fields() {
    let extractor = extractor_replying(ACME_REPLY, ACME_TEXT).await;
    let result = extractor.extract(&pdf_doc()).await.unwrap();

    assert_eq!(result.source, TextSource::Native);
    assert_eq!(result.fields, acme());
    assert_eq!(result.document, "acme.pdf");
    assert_eq!(result.stats.page_count, 1);
}

#[tokio::test]
async fn blank_scan_yields_all_null_without_error() {
    let extractor = extractor_replying(NULL_REPLY, "").await;
    let result = extractor.extract(&blank_scan()).await.unwrap();

    assert_eq!(result.source, TextSource::Ocr);
    assert_eq!(result.fields, ExtractedFields::not_found());
}

#[tokio::test]
async fn prose_from_the_model_is_malformed_output() {
    let extractor = extractor_replying("Sure! The invoice number is 1042.", ACME_TEXT).await;
    let err = extractor.extract(&pdf_doc()).await.unwrap_err();
    assert!(
        matches!(err, InvoiceError::MalformedModelOutput { .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn extract_to_file_writes_exactly_the_four_fields() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("acme.pdf");
    std::fs::write(&input, b"%PDF-1.7\n% test fixture\n").unwrap();
    let out = dir.path().join("invoice_fields.json");

    let extractor = extractor_replying(ACME_REPLY, ACME_TEXT).await;
    extractor
        .extract_to_file(input.to_str().unwrap(), &out)
        .await
        .unwrap();

    let written: ExtractedFields =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, acme());
}

// ── Prompt ───────────────────────────────────────────────────────────────────

#[test]
fn prompt_carries_schema_and_text() {
    assert!(DEFAULT_SYSTEM_PROMPT.contains("null"));
    let msg = invoice_text_message("Invoice #1042, Date: 2024-01-15, Vendor: Acme Corp, Total: $532.10");
    assert!(msg.contains("Acme Corp"));
}

// ── Credentials ──────────────────────────────────────────────────────────────

#[test]
fn missing_credential_fails_at_construction() {
    let config = ExtractionConfig::default();
    let err = InvoiceExtractor::with_env(config, |_| None).unwrap_err();
    match err {
        InvoiceError::MissingCredential { provider, env_var } => {
            assert_eq!(provider, "openai");
            assert_eq!(env_var, "OPENAI_API_KEY");
        }
        other => panic!("expected MissingCredential, got {other:?}"),
    }
}

#[test]
fn empty_credential_counts_as_missing() {
    let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "   ")].into_iter().collect();
    let err = require_credential("gemini", |k| env.get(k).map(|v| v.to_string())).unwrap_err();
    assert!(matches!(err, InvoiceError::MissingCredential { .. }));
}

#[test]
fn present_credential_passes() {
    let env: HashMap<&str, &str> = [("MISTRAL_API_KEY", "k-123")].into_iter().collect();
    require_credential("mistral", |k| env.get(k).map(|v| v.to_string())).unwrap();
}

#[test]
fn local_providers_need_no_credential() {
    assert_eq!(credential_env_var("ollama"), None);
    assert_eq!(credential_env_var("lmstudio"), None);
    require_credential("ollama", |_| None).unwrap();
}
