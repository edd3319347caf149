//! Error types for the edgequake-md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] — **Fatal**: the conversion cannot proceed at all
//!   (unreadable input, browser crash, compressor missing). Returned as
//!   `Err(Md2PdfError)` from the top-level `convert*` functions.
//!
//! * [`MathIssue`] — **Non-fatal**: one math expression could not be
//!   typeset. It is rendered as inert error-coloured text and recorded in
//!   [`crate::output::ConversionOutput::math_issues`]; the document still
//!   converts.
//!
//! Every fatal variant belongs to exactly one [`ErrorKind`]. The CLI treats
//! all kinds the same way (log + exit 1), but callers and tests can branch
//! on [`Md2PdfError::kind`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure class of an [`Md2PdfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or unreadable input document.
    Input,
    /// Browser launch, page load, settle, PDF export or output write.
    Render,
    /// External compression tool.
    Compression,
    /// Builder validation.
    Config,
    /// Unexpected internal failure (task panic, etc.).
    Internal,
}

/// All fatal errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but is not valid UTF-8 text.
    #[error("'{path}' is not valid UTF-8 text: {detail}")]
    InvalidEncoding { path: PathBuf, detail: String },

    /// Any other I/O failure while reading the input.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Render / export errors ────────────────────────────────────────────
    /// Chromium could not be started.
    #[error(
        "Failed to launch headless browser: {detail}\n\
Install Chrome/Chromium or point to it with --chrome <PATH> (or CHROME=...)."
    )]
    BrowserLaunch { detail: String },

    /// Page creation, navigation or script evaluation failed.
    #[error("Failed to load document into the browser: {detail}")]
    PageLoad { detail: String },

    /// The page never reached a settled state within the bounded wait.
    #[error(
        "Document did not finish rendering within {timeout_ms}ms \
(stylesheet, fonts or images still loading)"
    )]
    SettleTimeout { timeout_ms: u64 },

    /// Chromium's print-to-PDF call failed.
    #[error("PDF export failed: {detail}")]
    PdfExport { detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Compression errors ────────────────────────────────────────────────
    /// The compressor program could not be launched.
    #[error(
        "Compression tool '{program}' could not be started: {source}\n\
Install Ghostscript or pass --gs <PROGRAM>."
    )]
    CompressorNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The compressor ran but exited unsuccessfully.
    #[error("Compression tool '{program}' failed ({status}): {stderr}")]
    CompressorFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The compressed output path cannot be passed to the compressor.
    #[error("Invalid compressed output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::InvalidEncoding { .. }
            | Self::ReadFailed { .. } => ErrorKind::Input,
            Self::BrowserLaunch { .. }
            | Self::PageLoad { .. }
            | Self::SettleTimeout { .. }
            | Self::PdfExport { .. }
            | Self::OutputWriteFailed { .. } => ErrorKind::Render,
            Self::CompressorNotFound { .. }
            | Self::CompressorFailed { .. }
            | Self::InvalidOutputPath { .. } => ErrorKind::Compression,
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A math expression that could not be typeset.
///
/// The expression is still present in the output, as source text in the
/// configured error colour.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} math `{expression}`: {message}", math_style(.display))]
pub struct MathIssue {
    /// The TeX source as written in the document.
    pub expression: String,
    /// `true` for `$$…$$` / fenced math, `false` for inline `$…$`.
    pub display: bool,
    /// Parser or engine message.
    pub message: String,
}

fn math_style(display: &bool) -> &'static str {
    if *display {
        "display"
    } else {
        "inline"
    }
}
