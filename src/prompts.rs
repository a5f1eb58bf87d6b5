//! Prompts for the field-parsing model call.
//!
//! The schema in the system prompt must stay in lock-step with
//! [`crate::output::ExtractedFields`]: the reply is deserialised strictly,
//! so any key named here but not there (or vice versa) turns every reply
//! into a `MalformedModelOutput`.

/// Default system prompt for turning invoice text into the four fields.
///
/// Used when `ExtractionConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an invoice-processing assistant.

Extract exactly the following fields from the invoice text supplied by the user
and return them as a single JSON object:

  "invoice_number": string  (the invoice identifier, without a leading '#' or "No.")
  "date":           string  (the invoice date, formatted YYYY-MM-DD when it can be determined)
  "vendor_name":    string  (the company or person issuing the invoice)
  "total_amount":   string  (the final amount due, digits and decimal point only, no currency symbol)

Rules:
- All four keys MUST be present.
- If a field cannot be found in the text, use null for that key. Never guess.
- Every value is either a JSON string or null. Do not use numbers.
- Do not add any other keys.
- The text may come from OCR and contain noise; if it is empty or unreadable, return null for every key.
- Respond ONLY with the JSON object: no markdown fences, no commentary."#;

/// Wrap the extracted text in the user message.
pub fn invoice_text_message(text: &str) -> String {
    format!("Here is the raw invoice text:\n```\n{}\n```", text.trim())
}
