//! # edgequake-md2pdf
//!
//! Convert a Markdown document, math included, into a paginated PDF.
//!
//! ## Why this crate?
//!
//! Pandoc + LaTeX is a heavyweight toolchain for "I just want this README as a
//! PDF". This crate renders Markdown with [comrak], typesets `$…$` and
//! `$$…$$` math with KaTeX, and lets headless Chromium do the pagination. The
//! result looks like the page in a browser, printed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input     read the file as UTF-8
//!  ├─ 2. Markup    comrak + KaTeX → HTML fragment (CPU-bound, spawn_blocking)
//!  ├─ 3. Compose   wrap in the styled page shell
//!  ├─ 4. Export    headless Chromium → PDF, after the page settles
//!  └─ 5. Compress  optional Ghostscript pass → <stem>-compressed.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{convert, ConversionConfig, PdfPreset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .compress(PdfPreset::Screen)
//!         .build()?;
//!     let output = convert("notes.md", &config).await?;
//!     println!("PDF: {}", output.paths.pdf.display());
//!     for issue in &output.math_issues {
//!         eprintln!("warning: {issue}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! | Stage | Needs |
//! |-------|-------|
//! | Export | A Chromium/Chrome binary (auto-detected, or set `chrome_executable`) |
//! | Export | Network access to the KaTeX stylesheet URL |
//! | Compress | Ghostscript (`gs`) on `PATH`, only with compression enabled |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BrowserOptions, CompressionConfig, ConversionConfig, ConversionConfigBuilder, Margins,
    MarkdownOptions, MathOptions, PageOptions, PaperFormat, PdfPreset, SettleStrategy,
};
pub use convert::{convert, convert_sync, convert_to_file, render_html, RenderedHtml};
pub use error::{ErrorKind, MathIssue, Md2PdfError};
pub use output::{compressed_path, ConversionOutput, ConversionStats, OutputPaths};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
