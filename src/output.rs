//! Result types: the four extracted fields and per-request diagnostics.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The fixed-shape invoice record returned to the caller.
///
/// Every field is either a string or `None`, and `None` is the explicit
/// "not found" marker. All four keys are always serialised (`null` for
/// `None`), so consumers never see a partial object.
///
/// Deserialisation is strict: every key must be present (even if `null`),
/// values must be strings or `null`, and unknown keys are rejected. This is
/// what turns a sloppy model reply into
/// [`crate::error::InvoiceError::MalformedModelOutput`] instead of silently
/// defaulting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedFields {
    #[serde(deserialize_with = "required_nullable")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub date: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub vendor_name: Option<String>,
    #[serde(deserialize_with = "required_nullable")]
    pub total_amount: Option<String>,
}

/// Key names in serialisation order.
pub const FIELD_KEYS: [&str; 4] = ["invoice_number", "date", "vendor_name", "total_amount"];

// `deserialize_with` disables serde's implicit `None` for a missing `Option`
// field, so an absent key becomes a "missing field" error.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

impl ExtractedFields {
    /// A record with all four fields marked "not found".
    pub fn not_found() -> Self {
        Self::default()
    }

    /// `true` when no field was found.
    pub fn is_empty(&self) -> bool {
        self.invoice_number.is_none()
            && self.date.is_none()
            && self.vendor_name.is_none()
            && self.total_amount.is_none()
    }

    /// Trim every value and turn blank strings into "not found".
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            invoice_number: clean(self.invoice_number),
            date: clean(self.date),
            vendor_name: clean(self.vendor_name),
            total_amount: clean(self.total_amount),
        }
    }
}

/// Which cascade stage produced the text handed to the field parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// Embedded PDF text layer.
    Native,
    /// OCR over rendered pages or an uploaded image.
    Ocr,
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextSource::Native => write!(f, "native"),
            TextSource::Ocr => write!(f, "ocr"),
        }
    }
}

/// Text recovered from one page (0-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_index: usize,
    pub text: String,
}

/// Output of the extraction cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Page texts joined with `\n`, in page order.
    pub text: String,
    /// Stage the text came from.
    pub source: TextSource,
    /// Per-page breakdown from the winning stage.
    pub pages: Vec<PageText>,
}

impl ExtractedText {
    /// Number of non-whitespace characters in [`Self::text`].
    pub fn meaningful_chars(&self) -> usize {
        meaningful_chars(&self.text)
    }
}

/// Count non-whitespace characters; the cascade's content measure.
pub fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Timing and usage numbers for a single request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    pub text_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub text_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Full result of one extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceExtraction {
    /// Name of the processed document.
    pub document: String,
    pub fields: ExtractedFields,
    pub source: TextSource,
    pub stats: ExtractionStats,
}
