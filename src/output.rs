//! Output paths and conversion results.
//!
//! Output locations are a pure function of the input path: the PDF lands
//! next to the Markdown file with its extension swapped, and the compressed
//! variant inserts `-compressed` before the extension of the PDF path.

use crate::error::MathIssue;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const COMPRESSED_SUFFIX: &str = "-compressed";

/// Where a conversion writes its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// The uncompressed PDF. Always written on success.
    pub pdf: PathBuf,
    /// The compressed PDF, if compression is enabled.
    pub compressed: Option<PathBuf>,
}

impl OutputPaths {
    /// Derive output paths from the Markdown input path.
    ///
    /// `notes/doc.md` → `notes/doc.pdf` (+ `notes/doc-compressed.pdf`).
    pub fn for_input(input: impl AsRef<Path>, compress: bool) -> Self {
        Self::for_output(input.as_ref().with_extension("pdf"), compress)
    }

    /// Use an explicit PDF path; the compressed path is derived from it.
    pub fn for_output(pdf: impl Into<PathBuf>, compress: bool) -> Self {
        let pdf = pdf.into();
        let compressed = compress.then(|| compressed_path(&pdf));
        Self { pdf, compressed }
    }
}

/// Insert `-compressed` immediately before the extension of `pdf`.
///
/// `out/doc.pdf` → `out/doc-compressed.pdf`; a path without an extension
/// simply gets the suffix appended.
pub fn compressed_path(pdf: &Path) -> PathBuf {
    let mut name = OsString::from(pdf.file_stem().unwrap_or_default());
    name.push(COMPRESSED_SUFFIX);
    if let Some(ext) = pdf.extension() {
        name.push(".");
        name.push(ext);
    }
    pdf.with_file_name(name)
}

/// Timings and sizes for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Bytes of Markdown read.
    pub input_bytes: usize,
    /// Bytes of the composed HTML page.
    pub html_bytes: usize,
    /// Size of the uncompressed PDF.
    pub pdf_bytes: u64,
    /// Size of the compressed PDF, when produced.
    pub compressed_bytes: Option<u64>,
    /// Math expressions rendered.
    pub math_expressions: usize,
    pub markup_duration_ms: u64,
    pub export_duration_ms: u64,
    pub compress_duration_ms: Option<u64>,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    /// Compressed size as a fraction of the original, e.g. `0.42`.
    pub fn compression_ratio(&self) -> Option<f64> {
        match self.compressed_bytes {
            Some(c) if self.pdf_bytes > 0 => Some(c as f64 / self.pdf_bytes as f64),
            _ => None,
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Files written.
    pub paths: OutputPaths,
    /// Math expressions that were rendered as inline error text.
    pub math_issues: Vec<MathIssue>,
    pub stats: ConversionStats,
}
