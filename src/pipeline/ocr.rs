//! OCR engine adapter.
//!
//! [`OcrEngine`] is the seam between the cascade and whatever recognises
//! text. [`TesseractEngine`] shells out to the `tesseract` binary: the page
//! is written to a temporary PNG and recognised text is read from stdout.
//!
//! A missing binary or a non-zero exit is reported as
//! [`InvoiceError::ExtractionUnavailable`]. A successful run that recognises
//! nothing returns an empty string.

use crate::error::InvoiceError;
use image::{GrayImage, ImageFormat};
use std::process::Command;
use tracing::debug;

/// Recognises text in a preprocessed page image.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs and errors.
    fn name(&self) -> &str;

    /// Recognise the text in one image. Blocking.
    fn recognize(&self, image: &GrayImage) -> Result<String, InvoiceError>;
}

/// OCR via the tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: String,
    page_seg_mode: Option<u8>,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            page_seg_mode: None,
        }
    }

    /// Pass `--psm <mode>` to tesseract.
    pub fn with_page_seg_mode(mut self, mode: u8) -> Self {
        self.page_seg_mode = Some(mode);
        self
    }

    /// `true` when `tesseract --version` runs successfully.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn args(&self, input: &std::path::Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            input.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
        ];
        if let Some(psm) = self.page_seg_mode {
            args.push("--psm".into());
            args.push(psm.to_string().into());
        }
        args
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String, InvoiceError> {
        let tmp = tempfile::Builder::new()
            .prefix("invoice-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| InvoiceError::Internal(format!("tempfile: {e}")))?;
        image
            .save_with_format(tmp.path(), ImageFormat::Png)
            .map_err(|e| InvoiceError::Internal(format!("writing OCR input: {e}")))?;

        let output = Command::new(&self.binary)
            .args(self.args(tmp.path()))
            .output()
            .map_err(|e| {
                InvoiceError::unavailable(
                    "tesseract",
                    format!("failed to run '{}' (is it installed?): {e}", self.binary),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InvoiceError::unavailable(
                "tesseract",
                format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract recognised {} chars from {}x{} image",
            text.len(),
            image.width(),
            image.height()
        );
        Ok(text)
    }
}
