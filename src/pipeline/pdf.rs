//! PDF access: native text layer and page rasterisation.
//!
//! Both cascade stages that touch the PDF go through [`PdfBackend`], so the
//! cascade can be exercised without pdfium. [`PdfiumBackend`] is the real
//! implementation.
//!
//! pdfium is a C++ library with thread-local state, so every call here is
//! blocking and is expected to run inside `spawn_blocking`. A fresh binding
//! is made per call; nothing pdfium-related outlives a request.

use crate::error::InvoiceError;
use crate::output::PageText;
use crate::pipeline::input::Document;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of PDF text and page images.
pub trait PdfBackend: Send + Sync {
    /// Short backend name for logs and errors.
    fn name(&self) -> &str;

    /// Text layer of every page, in page order.
    fn page_texts(&self, pdf: &Document, password: Option<&str>) -> Result<Vec<PageText>, InvoiceError>;

    /// Rasterise every page, in page order.
    fn render_pages(
        &self,
        pdf: &Document,
        password: Option<&str>,
        options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, InvoiceError>;
}

/// Rasterisation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_pixels: u32,
}

impl RenderOptions {
    /// pdfium measures pages in points (1/72 inch).
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// pdfium-backed [`PdfBackend`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Bind the system pdfium library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind pdfium from a directory or explicit library file.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, InvoiceError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            InvoiceError::unavailable(
                "pdfium",
                format!(
                    "failed to bind pdfium library: {e:?}\n\
                     Install libpdfium or set PDFIUM_LIB_PATH to its directory."
                ),
            )
        })?;
        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(
        &self,
        pdfium: &'a Pdfium,
        pdf: &'a Document,
        password: Option<&'a str>,
    ) -> Result<PdfDocument<'a>, InvoiceError> {
        pdfium
            .load_pdf_from_byte_slice(pdf.bytes(), password)
            .map_err(|e| classify_load_error(pdf.name(), password.is_some(), &format!("{e:?}")))
    }
}

impl PdfBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn page_texts(&self, pdf: &Document, password: Option<&str>) -> Result<Vec<PageText>, InvoiceError> {
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, pdf, password)?;
        let pages = document.pages();
        info!("PDF '{}' loaded: {} pages", pdf.name(), pages.len());

        let mut results = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| {
                    InvoiceError::unavailable("pdfium", format!("text layer of page {}: {e:?}", idx + 1))
                })?
                .all();
            debug!("Page {}: {} chars of native text", idx + 1, text.len());
            results.push(PageText {
                page_index: idx,
                text,
            });
        }
        Ok(results)
    }

    fn render_pages(
        &self,
        pdf: &Document,
        password: Option<&str>,
        options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, InvoiceError> {
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, pdf, password)?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(options.scale())
            .set_maximum_width(options.max_pixels as i32)
            .set_maximum_height(options.max_pixels as i32);

        let pages = document.pages();
        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                InvoiceError::unavailable("pdfium", format!("rasterising page {}: {e:?}", idx + 1))
            })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}

/// Accept either the library file itself or the directory containing it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(Pdfium::pdfium_platform_library_name())
    } else {
        path.to_path_buf()
    }
}

/// Map a pdfium load failure to the matching input error.
fn classify_load_error(name: &str, had_password: bool, detail: &str) -> InvoiceError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            InvoiceError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            InvoiceError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        InvoiceError::CorruptPdf {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }
}
