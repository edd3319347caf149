//! End-to-end integration tests for edgequake-md2pdf.
//!
//! These tests launch a real headless Chromium (and, for compression,
//! Ghostscript). They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Point `CHROME` at a browser binary if it is not auto-detected.

use edgequake_md2pdf::{
    convert, convert_to_file, ConversionConfig, ConversionConfigBuilder, ErrorKind, Md2PdfError,
    PdfPreset, SettleStrategy,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if `program` cannot be spawned.
macro_rules! skip_unless_program {
    ($program:expr) => {{
        if std::process::Command::new($program)
            .arg("--version")
            .output()
            .is_err()
        {
            println!("SKIP — {} not installed", $program);
            return;
        }
    }};
}

/// Builder pre-loaded with the browser settings the e2e environment needs.
fn e2e_builder() -> ConversionConfigBuilder {
    let mut builder = ConversionConfig::builder().no_sandbox(true);
    if let Ok(chrome) = std::env::var("CHROME") {
        builder = builder.chrome_executable(chrome);
    }
    builder
}

fn write_markdown(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write markdown");
    path
}

fn assert_is_pdf(path: &Path, context: &str) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("[{context}] cannot read {}: {e}", path.display()));
    assert!(
        bytes.starts_with(b"%PDF-"),
        "[{context}] {} is not a PDF",
        path.display()
    );
    println!("[{context}] ✓  {} bytes", bytes.len());
}

fn pdfs_in(dir: &Path) -> Vec<PathBuf> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
        .collect();
    pdfs.sort();
    pdfs
}

// ── Conversion tests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_one_line_document_yields_one_pdf() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "hello.md", "Hello, PDF.\n");

    let config = e2e_builder().build().unwrap();
    let output = convert(&input, &config).await.expect("convert");

    assert_eq!(output.paths.pdf, dir.path().join("hello.pdf"));
    assert_eq!(output.paths.compressed, None);
    assert_eq!(pdfs_in(dir.path()), vec![dir.path().join("hello.pdf")]);
    assert_is_pdf(&output.paths.pdf, "one-line");
    assert_eq!(
        output.stats.pdf_bytes,
        std::fs::metadata(&output.paths.pdf).unwrap().len()
    );

    let text = pdf_extract::extract_text(&output.paths.pdf).expect("extract text");
    assert!(text.contains("Hello, PDF."), "extracted text: {text:?}");
}

#[tokio::test]
async fn test_unreachable_stylesheet_still_exports() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "offline.md", "Offline $x^2$ run.\n");

    // Nothing listens on the discard port, so the fetch errors out.
    let config = e2e_builder()
        .stylesheet_url("http://127.0.0.1:9/katex.min.css")
        .build()
        .unwrap();
    let output = convert(&input, &config).await.expect("convert");

    assert_is_pdf(&output.paths.pdf, "offline");
    let text = pdf_extract::extract_text(&output.paths.pdf).expect("extract text");
    assert!(text.contains("Offline"), "extracted text: {text:?}");
}

#[tokio::test]
async fn test_pending_stylesheet_times_out_without_output() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "stuck.md", "Never printed.\n");

    // Accepts connections (via the backlog) but never answers.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = e2e_builder()
        .stylesheet_url(format!("http://127.0.0.1:{port}/katex.min.css"))
        .settle(SettleStrategy::Observe {
            timeout_ms: 1_500,
            poll_interval_ms: 50,
        })
        .build()
        .unwrap();
    let err = convert(&input, &config).await.unwrap_err();

    // Navigation itself may give up waiting for the load event first.
    assert!(
        matches!(
            err,
            Md2PdfError::SettleTimeout { timeout_ms: 1_500 } | Md2PdfError::PageLoad { .. }
        ),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(!dir.path().join("stuck.pdf").exists());
    drop(listener);
}

#[tokio::test]
async fn test_math_document_with_invalid_expression_still_exports() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(
        dir.path(),
        "math.md",
        "# Math\n\nGood: $E = mc^2$\n\nBroken: $x^{$\n\n$$\\sum_{i=1}^n i$$\n",
    );

    let config = e2e_builder().build().unwrap();
    let output = convert(&input, &config).await.expect("convert");

    assert_is_pdf(&output.paths.pdf, "math");
    assert_eq!(output.math_issues.len(), 1, "{:?}", output.math_issues);
    assert_eq!(output.math_issues[0].expression, "x^{");
    assert_eq!(output.stats.math_expressions, 3);
}

#[tokio::test]
async fn test_relative_image_and_lists_render() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    // 1×1 transparent GIF.
    let gif: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
    ];
    std::fs::create_dir(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img/dot.gif"), gif).unwrap();
    let input = write_markdown(
        dir.path(),
        "figure.md",
        "![dot](img/dot.gif)\n\n1. one\n2. two\n\n- a\n- b\n",
    );

    let config = e2e_builder().build().unwrap();
    let output = convert(&input, &config).await.expect("convert");
    assert_is_pdf(&output.paths.pdf, "figure");
}

#[tokio::test]
async fn test_explicit_output_path_and_fixed_settle() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "notes.md", "Some *notes*.\n");
    let target = dir.path().join("build/out.pdf");

    let config = e2e_builder()
        .settle(SettleStrategy::fixed_default())
        .build()
        .unwrap();
    let output = convert_to_file(&input, &target, &config)
        .await
        .expect("convert_to_file");

    assert_eq!(output.paths.pdf, target);
    assert_is_pdf(&target, "explicit-output");
    assert!(!dir.path().join("notes.pdf").exists());
}

// ── Compression tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_compression_writes_second_pdf() {
    e2e_skip_unless_enabled!();
    skip_unless_program!("gs");
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "paper.md", "# Title\n\nBody text.\n");

    let config = e2e_builder().compress(PdfPreset::Screen).build().unwrap();
    let output = convert(&input, &config).await.expect("convert");

    let compressed = dir.path().join("paper-compressed.pdf");
    assert_eq!(output.paths.compressed.as_deref(), Some(compressed.as_path()));
    assert_is_pdf(&output.paths.pdf, "uncompressed");
    assert_is_pdf(&compressed, "compressed");
    assert!(output.stats.compression_ratio().is_some());
}

#[tokio::test]
async fn test_missing_compressor_keeps_uncompressed_pdf() {
    e2e_skip_unless_enabled!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_markdown(dir.path(), "doc.md", "Compress me.\n");

    let mut compression = edgequake_md2pdf::CompressionConfig::default();
    compression.program = dir
        .path()
        .join("no-such-gs")
        .to_string_lossy()
        .into_owned();
    let config = e2e_builder().compression(Some(compression)).build().unwrap();

    let err = convert(&input, &config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compression);
    assert!(matches!(err, Md2PdfError::CompressorNotFound { .. }), "{err}");
    assert_is_pdf(&dir.path().join("doc.pdf"), "kept");
    assert!(!dir.path().join("doc-compressed.pdf").exists());
}
