//! CLI binary for invoice-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_extract::{
    extract_text_only, ExtractionConfig, InvoiceExtraction, InvoiceExtractor, PreprocessOptions,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the four fields as JSON
  invoice-extract invoice.pdf

  # Write them to invoice_fields.json
  invoice-extract scan.png -o invoice_fields.json

  # Full report: fields, text source, token usage and timings
  invoice-extract --report invoice.pdf

  # Only run the text cascade (no API key needed)
  invoice-extract --text-only scan.jpg

  # From a URL, with another provider
  invoice-extract --provider anthropic --model claude-haiku-4-20250514 https://example.com/inv.pdf

OUTPUT:
  {"invoice_number": "1042", "date": "2024-01-15", "vendor_name": "Acme Corp", "total_amount": "532.10"}
  A field that cannot be found is null.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, mistral, ollama, ...)
  EDGEQUAKE_MODEL         Override model ID
  TESSERACT_PATH          tesseract binary (default: tesseract on PATH)
  PDFIUM_LIB_PATH         Directory or file of an existing libpdfium

  A .env file in the working directory is loaded first.

SETUP:
  1. Install tesseract:   apt install tesseract-ocr   (or brew install tesseract)
  2. Install libpdfium and point PDFIUM_LIB_PATH at it if it is not on the loader path
  3. Set API key:         export OPENAI_API_KEY=sk-...
"#;

/// Extract invoice number, date, vendor and total from a PDF or image.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract invoice number, date, vendor and total from a PDF or image",
    long_about = "Extract the invoice number, date, vendor name and total amount from a PDF or \
image invoice. Digital PDFs are read from their text layer; scanned PDFs and images go through \
tesseract OCR. The text is then structured by a language model into a fixed four-key JSON object.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PNG/JPEG path or HTTP/HTTPS URL.
    input: String,

    /// Write the fields JSON to this file (e.g. invoice_fields.json).
    #[arg(short, long, env = "INVOICE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (default: gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, mistral, openrouter, azure, ollama.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Minimum non-whitespace characters for the text layer to be trusted.
    #[arg(long, env = "INVOICE_MIN_NATIVE_CHARS", default_value_t = 20)]
    min_native_chars: usize,

    /// Rendering DPI for OCR of scanned PDFs (72–400).
    #[arg(long, env = "INVOICE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Tesseract language(s), e.g. eng or eng+deu.
    #[arg(long, env = "INVOICE_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Path to the tesseract binary.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: String,

    /// Directory or file of an existing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Skip Otsu binarisation before OCR.
    #[arg(long, env = "INVOICE_NO_BINARIZE")]
    no_binarize: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INVOICE_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "INVOICE_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INVOICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the full extraction report (fields, source, stats) as JSON.
    #[arg(long)]
    report: bool,

    /// Only run the text cascade and print the recovered text.
    #[arg(long)]
    text_only: bool,

    /// Disable the spinner.
    #[arg(long, env = "INVOICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.report && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let spinner = show_progress.then(|| spinner("Reading text"));
        let text = extract_text_only(&cli.input, &config).await;
        if let Some(sp) = spinner {
            sp.finish_and_clear();
        }
        let text = text.context("Text extraction failed")?;

        if cli.report {
            println!(
                "{}",
                serde_json::to_string_pretty(&text).context("Failed to serialise text")?
            );
        } else {
            println!("{}", text.text);
            if !cli.quiet {
                eprintln!(
                    "{} {} chars via {} over {} pages",
                    dim("→"),
                    text.meaningful_chars(),
                    bold(&text.source.to_string()),
                    text.pages.len()
                );
            }
        }
        return Ok(());
    }

    // Resolve the provider before touching the input so a missing key
    // is reported first.
    let extractor = InvoiceExtractor::new(config).context("Failed to initialise extractor")?;

    let spinner = show_progress.then(|| spinner("Extracting"));
    let result = match cli.output {
        Some(ref path) => extractor.extract_to_file(&cli.input, path).await,
        None => extractor.extract_input(&cli.input).await,
    };
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let extraction = result.context("Extraction failed")?;

    if cli.report {
        println!(
            "{}",
            serde_json::to_string_pretty(&extraction).context("Failed to serialise report")?
        );
    } else if cli.output.is_none() {
        println!(
            "{}",
            serde_json::to_string_pretty(&extraction.fields).context("Failed to serialise fields")?
        );
    }

    if !cli.quiet {
        print_summary(&extraction, cli.output.as_ref());
    }

    Ok(())
}

fn spinner(prefix: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix(prefix);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_summary(extraction: &InvoiceExtraction, output: Option<&PathBuf>) {
    let found = [
        &extraction.fields.invoice_number,
        &extraction.fields.date,
        &extraction.fields.vendor_name,
        &extraction.fields.total_amount,
    ]
    .iter()
    .filter(|f| f.is_some())
    .count();

    let mark = if found == 4 { green("✔") } else { yellow("⚠") };
    let target = output
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{mark}  {found}/4 fields  via {}  {}ms{target}",
        extraction.source, extraction.stats.total_duration_ms
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&extraction.stats.input_tokens.to_string()),
        dim(&extraction.stats.output_tokens.to_string()),
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .min_native_chars(cli.min_native_chars)
        .render_dpi(cli.dpi)
        .ocr_language(&cli.lang)
        .tesseract_path(&cli.tesseract)
        .preprocess(PreprocessOptions {
            binarize: !cli.no_binarize,
            ..PreprocessOptions::default()
        })
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
