//! PDF compression by delegating to Ghostscript.
//!
//! The uncompressed PDF is never touched: Ghostscript reads it and writes a
//! second file. If the tool is missing or exits non-zero, the error
//! propagates and the original PDF stays on disk as it was.

use crate::config::CompressionConfig;
use crate::error::Md2PdfError;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Maximum stderr bytes kept in [`Md2PdfError::CompressorFailed`].
const STDERR_LIMIT: usize = 2000;

/// Rewrite `input` into `output` with the configured Ghostscript preset.
/// Returns the size of the compressed file.
pub async fn compress_pdf(
    input: &Path,
    output: &Path,
    config: &CompressionConfig,
) -> Result<u64, Md2PdfError> {
    let args = gs_args(input, output, config)?;
    debug!("Running {} {:?}", config.program, args);

    let result = Command::new(&config.program)
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| Md2PdfError::CompressorNotFound {
            program: config.program.clone(),
            source,
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let stderr = stderr.trim();
        let stderr = match stderr.char_indices().nth(STDERR_LIMIT) {
            Some((cut, _)) => format!("{}…", &stderr[..cut]),
            None => stderr.to_string(),
        };
        return Err(Md2PdfError::CompressorFailed {
            program: config.program.clone(),
            status: result.status.to_string(),
            stderr,
        });
    }

    let bytes = tokio::fs::metadata(output)
        .await
        .map(|m| m.len())
        .map_err(|e| Md2PdfError::CompressorFailed {
            program: config.program.clone(),
            status: result.status.to_string(),
            stderr: format!("no output at '{}': {}", output.display(), e),
        })?;

    info!("Wrote {} ({} bytes)", output.display(), bytes);
    Ok(bytes)
}

/// Ghostscript command line for one conversion.
///
/// `-sOutputFile=<path>` is a single argument, so the output path must be
/// valid Unicode and must not start with `-`.
pub fn gs_args(
    input: &Path,
    output: &Path,
    config: &CompressionConfig,
) -> Result<Vec<OsString>, Md2PdfError> {
    let out = output.to_str().ok_or_else(|| Md2PdfError::InvalidOutputPath {
        path: output.to_path_buf(),
        reason: "path is not valid UTF-8".into(),
    })?;
    if out.is_empty() || out.starts_with('-') {
        return Err(Md2PdfError::InvalidOutputPath {
            path: output.to_path_buf(),
            reason: "path is empty or looks like a command-line flag".into(),
        });
    }

    let mut args: Vec<OsString> = [
        "-sDEVICE=pdfwrite".to_string(),
        format!("-dCompatibilityLevel={}", config.compatibility_level),
        format!("-dPDFSETTINGS={}", config.preset.as_gs_setting()),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        format!("-sOutputFile={}", out),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());
    Ok(args)
}
