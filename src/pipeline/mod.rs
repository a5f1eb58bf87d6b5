//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements one step; the cascade and the field parser are
//! the only ones that call into others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ cascade ─┬─▶ pdf (text layer) ───────────────────────┬─▶ fields
//! (path/URL)         └─▶ pdf (render) ──▶ preprocess ──▶ ocr ───┘   (LLM)
//! ```
//!
//! 1. [`input`]     : resolve a path or URL into an in-memory `Document`
//! 2. [`pdf`]       : pdfium text layer and page rasterisation
//! 3. [`preprocess`]: grayscale/upscale/binarise ahead of OCR
//! 4. [`ocr`]       : tesseract adapter
//! 5. [`cascade`]   : native-vs-OCR decision for the whole document
//! 6. [`fields`]    : the single model call and strict JSON decoding

pub mod cascade;
pub mod fields;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
