//! Conversion entry points.
//!
//! [`convert`] runs the whole pipeline for one Markdown file and writes the
//! PDF (and optionally its compressed sibling) next to it.
//! [`convert_to_file`] does the same with an explicit output path.
//! [`render_html`] stops before the browser and returns the composed page,
//! which is handy for previews and for testing without Chromium.

use crate::config::ConversionConfig;
use crate::error::{MathIssue, Md2PdfError};
use crate::output::{ConversionOutput, ConversionStats, OutputPaths};
use crate::pipeline::{compose, compress, export, input, markup};
use crate::progress::Stage;
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_TITLE: &str = "Document";

/// Composed HTML page plus what the markup stage recovered from.
#[derive(Debug, Clone)]
pub struct RenderedHtml {
    /// Complete HTML document.
    pub html: String,
    /// Math expressions found in the source.
    pub math_count: usize,
    /// Math expressions rendered as error text.
    pub math_issues: Vec<MathIssue>,
}

/// Convert a Markdown file to PDF next to it.
///
/// Writes `<dir>/<stem>.pdf`, and `<dir>/<stem>-compressed.pdf` when
/// `config.compression` is set.
///
/// # Errors
/// Any stage failure is fatal. If compression fails, the uncompressed PDF has
/// already been written and is left in place.
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let input_path = input_path.as_ref();
    let paths = OutputPaths::for_input(input_path, config.compression.is_some());
    run_pipeline(input_path, paths, config).await
}

/// Convert a Markdown file to PDF at `output_path`.
///
/// The compressed variant, if enabled, is derived from `output_path`.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let paths = OutputPaths::for_output(
        output_path.as_ref(),
        config.compression.is_some(),
    );
    run_pipeline(input_path.as_ref(), paths, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_path, config))
}

/// Render Markdown to the complete HTML page the browser would print.
///
/// The page is titled "Document" and relative resources are left unresolved
/// (no `<base>` element).
pub async fn render_html(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<RenderedHtml, Md2PdfError> {
    let rendered =
        markup::render_markdown(markdown.to_string(), &config.markdown, &config.math).await?;
    let doc = compose::compose_document(&rendered.html, DEFAULT_TITLE, &config.page, None);
    Ok(RenderedHtml {
        html: doc.html,
        math_count: rendered.math_count,
        math_issues: rendered.math_issues,
    })
}

async fn run_pipeline(
    input_path: &Path,
    paths: OutputPaths,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input_path.display());
    check_outputs_differ_from_input(input_path, &paths)?;

    // ── Step 1: Read ─────────────────────────────────────────────────────
    let (markdown, _) = stage(config, Stage::Load, input::read_document(input_path)).await?;
    let input_bytes = markdown.len();

    // ── Step 2: Markdown + math → HTML fragment ──────────────────────────
    let (rendered, markup_duration_ms) = stage(
        config,
        Stage::Markup,
        markup::render_markdown(markdown, &config.markdown, &config.math),
    )
    .await?;
    if !rendered.math_issues.is_empty() {
        warn!(
            "{} of {} math expressions could not be typeset; rendered as error text",
            rendered.math_issues.len(),
            rendered.math_count
        );
    }

    // ── Step 3: Page template ────────────────────────────────────────────
    let title = input::document_title(input_path);
    let base_dir = absolute_parent(input_path);
    let (doc, _) = stage(config, Stage::Compose, async {
        Ok(compose::compose_document(
            &rendered.html,
            &title,
            &config.page,
            base_dir.as_deref(),
        ))
    })
    .await?;

    // ── Step 4: Browser → PDF ────────────────────────────────────────────
    let (pdf_bytes, export_duration_ms) = stage(
        config,
        Stage::Export,
        export::export_pdf(&doc, &paths.pdf, &config.page, &config.browser),
    )
    .await?;
    info!("PDF created: {}", paths.pdf.display());

    // ── Step 5: Optional compression ─────────────────────────────────────
    let (compressed_bytes, compress_duration_ms) =
        match (&config.compression, &paths.compressed) {
            (Some(compression), Some(target)) => {
                let (bytes, ms) = stage(
                    config,
                    Stage::Compress,
                    compress::compress_pdf(&paths.pdf, target, compression),
                )
                .await?;
                (Some(bytes), Some(ms))
            }
            _ => (None, None),
        };

    let stats = ConversionStats {
        input_bytes,
        html_bytes: doc.html.len(),
        pdf_bytes,
        compressed_bytes,
        math_expressions: rendered.math_count,
        markup_duration_ms,
        export_duration_ms,
        compress_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} bytes of Markdown → {} byte PDF in {}ms",
        stats.input_bytes, stats.pdf_bytes, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(&stats);
    }

    Ok(ConversionOutput {
        paths,
        math_issues: rendered.math_issues,
        stats,
    })
}

/// Run one stage, timing it and reporting it to the progress callback.
async fn stage<T>(
    config: &ConversionConfig,
    stage: Stage,
    fut: impl Future<Output = Result<T, Md2PdfError>>,
) -> Result<(T, u64), Md2PdfError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    let start = Instant::now();
    match fut.await {
        Ok(value) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            info!("{} finished in {}ms", stage.label(), elapsed_ms);
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_complete(stage, elapsed_ms);
            }
            Ok((value, elapsed_ms))
        }
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_error(stage, &e.to_string());
            }
            Err(e)
        }
    }
}

/// Refuse to run when an output would overwrite the Markdown source
/// (e.g. `notes.pdf` as input).
fn check_outputs_differ_from_input(
    input_path: &Path,
    paths: &OutputPaths,
) -> Result<(), Md2PdfError> {
    let input = std::path::absolute(input_path).unwrap_or_else(|_| input_path.to_path_buf());
    let targets = std::iter::once(&paths.pdf).chain(paths.compressed.as_ref());
    for target in targets {
        let target_abs = std::path::absolute(target).unwrap_or_else(|_| target.clone());
        if target_abs == input {
            return Err(Md2PdfError::InvalidConfig(format!(
                "output '{}' would overwrite the input file",
                target.display()
            )));
        }
    }
    Ok(())
}

/// Directory containing `path`, made absolute for the `<base>` URL.
fn absolute_parent(path: &Path) -> Option<std::path::PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    absolute.parent().map(Path::to_path_buf)
}
