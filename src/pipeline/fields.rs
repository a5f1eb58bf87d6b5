//! Field parser: one model call that turns invoice text into [`ExtractedFields`].
//!
//! The request carries the schema-bearing system prompt and the text as the
//! user turn. The reply must be the fixed four-key JSON object; a single
//! ```` ```json ```` fence around it is tolerated and stripped, anything
//! else that fails strict deserialisation is a
//! [`InvoiceError::MalformedModelOutput`].
//!
//! There is no retry here. Auth and rate-limit failures are classified from
//! the provider's typed error and surfaced as-is.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::ExtractedFields;
use crate::prompts::{invoice_text_message, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Characters of the raw reply kept in error messages.
const EXCERPT_CHARS: usize = 120;

/// Parsed fields plus token usage of the call.
#[derive(Debug, Clone)]
pub struct ParsedFields {
    pub fields: ExtractedFields,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Ask the model for the four invoice fields contained in `text`.
///
/// `text` may be empty; the model is still asked and is expected to answer
/// with all four keys set to `null`.
pub async fn parse_fields(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    text: &str,
    config: &ExtractionConfig,
) -> Result<ParsedFields, InvoiceError> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(invoice_text_message(text)),
    ];
    let options = build_options(config);

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| classify_llm_error(provider_label, e))?;

    debug!(
        "Field parser: {} input tokens, {} output tokens",
        response.prompt_tokens, response.completion_tokens
    );

    let fields = decode_fields(&response.content)?;
    Ok(ParsedFields {
        fields,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
    })
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Strictly decode a model reply into [`ExtractedFields`].
pub fn decode_fields(raw: &str) -> Result<ExtractedFields, InvoiceError> {
    let trimmed = raw.trim();
    let body = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    serde_json::from_str::<ExtractedFields>(body)
        .map(ExtractedFields::normalized)
        .map_err(|e| InvoiceError::MalformedModelOutput {
            detail: e.to_string(),
            excerpt: excerpt(trimmed),
        })
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}

static RE_AUTH_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(401|403)\b|unauthori[sz]ed|invalid[ _]api[ _]key|incorrect api key").unwrap()
});

static RE_RATE_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|rate[ _]limit|too many requests|quota").unwrap()
});

/// Map a provider error onto the upstream error taxonomy.
///
/// The typed variant decides when it is specific. Only the generic
/// `ApiError`/`ProviderError`/`Unknown` variants fall back to the message,
/// where status codes must appear as whole words.
pub fn classify_llm_error(provider: &str, err: LlmError) -> InvoiceError {
    let provider = provider.to_string();
    match err {
        LlmError::AuthError(_) => InvoiceError::UpstreamAuthError {
            provider,
            detail: err.to_string(),
        },
        LlmError::RateLimited(_) => InvoiceError::UpstreamRateLimited {
            provider,
            detail: err.to_string(),
        },
        LlmError::ApiError(ref msg) | LlmError::ProviderError(ref msg) | LlmError::Unknown(ref msg) => {
            let detail = err.to_string();
            if RE_AUTH_STATUS.is_match(msg) {
                InvoiceError::UpstreamAuthError { provider, detail }
            } else if RE_RATE_STATUS.is_match(msg) {
                InvoiceError::UpstreamRateLimited { provider, detail }
            } else {
                InvoiceError::LlmApiError { provider, detail }
            }
        }
        other => InvoiceError::LlmApiError {
            provider,
            detail: other.to_string(),
        },
    }
}
