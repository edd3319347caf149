//! Headless-browser export: composed HTML → paginated PDF.
//!
//! The page is written to a temporary directory and opened via `file://`,
//! so the `<base>` element can resolve images relative to the Markdown file.
//! After loading, the exporter waits for the page to settle (see
//! [`SettleStrategy`]), prints it with Chromium's print-to-PDF, and writes the
//! bytes atomically to the output path.
//!
//! ## Browser lifetime
//!
//! [`BrowserSession`] owns the Chromium child process and the task driving
//! its CDP event stream. [`export_pdf`] always calls
//! [`BrowserSession::close`] before inspecting the print result, so the
//! browser is shut down on the success and failure paths alike.

use crate::config::{cm_to_inches, BrowserOptions, PageOptions, SettleStrategy};
use crate::error::Md2PdfError;
use crate::pipeline::compose::{file_url, ComposedDocument};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Holds when the document, its images and web fonts are loaded and every
/// stylesheet has either loaded or been marked failed by its `onerror`.
pub const SETTLED_EXPRESSION: &str = "document.readyState === 'complete' \
&& Array.from(document.querySelectorAll('link[rel=\"stylesheet\"]')).every(l => l.sheet !== null || l.dataset.failed === 'true') \
&& Array.from(document.images).every(img => img.complete) \
&& (!document.fonts || document.fonts.status === 'loaded')";

/// URLs of stylesheets that failed to load.
pub const FAILED_STYLESHEETS_EXPRESSION: &str =
    "Array.from(document.querySelectorAll('link[rel=\"stylesheet\"][data-failed]')).map(l => l.href)";

const DOCUMENT_FILE: &str = "document.html";

/// Render `doc` to a PDF at `output`. Returns the number of bytes written.
pub async fn export_pdf(
    doc: &ComposedDocument,
    output: &Path,
    page_opts: &PageOptions,
    browser_opts: &BrowserOptions,
) -> Result<u64, Md2PdfError> {
    let staging = TempDir::new().map_err(|e| Md2PdfError::PageLoad {
        detail: format!("cannot create staging directory: {}", e),
    })?;
    let html_path = staging.path().join(DOCUMENT_FILE);
    tokio::fs::write(&html_path, &doc.html)
        .await
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: html_path.clone(),
            source: e,
        })?;
    let url = file_url(&html_path);
    debug!("Staged document at {}", url);

    let session = BrowserSession::launch(browser_opts).await?;
    let printed = session
        .print_pdf(&url, page_opts, browser_opts.settle)
        .await;
    session.close().await;
    let pdf = printed?;

    write_atomic(output, &pdf).await?;
    info!("Wrote {} ({} bytes)", output.display(), pdf.len());
    Ok(pdf.len() as u64)
}

/// A running headless Chromium plus its CDP event loop.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile_dir: TempDir,
}

impl BrowserSession {
    /// Launch a headless browser with a throwaway profile directory.
    pub async fn launch(opts: &BrowserOptions) -> Result<Self, Md2PdfError> {
        let profile_dir = TempDir::new().map_err(|e| Md2PdfError::BrowserLaunch {
            detail: format!("cannot create profile directory: {}", e),
        })?;

        let mut builder = BrowserConfig::builder().user_data_dir(profile_dir.path());
        if let Some(ref exe) = opts.executable {
            debug!("Using browser executable {}", exe.display());
            builder = builder.chrome_executable(exe);
        }
        if opts.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|detail| Md2PdfError::BrowserLaunch { detail })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| Md2PdfError::BrowserLaunch {
                    detail: e.to_string(),
                })?;

        // Individual CDP messages can fail to decode; the stream ends when
        // the connection closes.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Headless browser launched");
        Ok(Self {
            browser,
            handler,
            _profile_dir: profile_dir,
        })
    }

    /// Open `url`, wait for it to settle, and print it.
    pub async fn print_pdf(
        &self,
        url: &str,
        page_opts: &PageOptions,
        settle: SettleStrategy,
    ) -> Result<Vec<u8>, Md2PdfError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Md2PdfError::PageLoad {
                detail: format!("cannot open page: {}", e),
            })?;

        page.goto(url).await.map_err(|e| Md2PdfError::PageLoad {
            detail: format!("cannot load {}: {}", url, e),
        })?;

        wait_for_settle(&page, settle).await?;
        for href in failed_stylesheets(&page).await {
            warn!("Stylesheet failed to load, printing without it: {}", href);
        }

        let pdf = page
            .pdf(print_params(page_opts))
            .await
            .map_err(|e| Md2PdfError::PdfExport {
                detail: e.to_string(),
            })?;

        if let Err(e) = page.close().await {
            debug!("Page close failed: {}", e);
        }
        Ok(pdf)
    }

    /// Shut the browser down and reap the child process.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        match self.browser.wait().await {
            Ok(status) => debug!("Browser exited: {:?}", status),
            Err(e) => warn!("Waiting for browser exit failed: {}", e),
        }
        self.handler.abort();
    }
}

/// Chromium print settings for the configured paper and margins.
pub fn print_params(page_opts: &PageOptions) -> PrintToPdfParams {
    let (width, height) = page_opts.paper.size_inches();
    let m = page_opts.margins;
    PrintToPdfParams {
        print_background: Some(page_opts.print_background),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(cm_to_inches(m.top)),
        margin_right: Some(cm_to_inches(m.right)),
        margin_bottom: Some(cm_to_inches(m.bottom)),
        margin_left: Some(cm_to_inches(m.left)),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}

async fn wait_for_settle(page: &Page, strategy: SettleStrategy) -> Result<(), Md2PdfError> {
    let start = Instant::now();
    let max_wait = strategy.max_wait();
    match strategy {
        SettleStrategy::Fixed { delay_ms } => {
            tokio::time::sleep(max_wait).await;
            debug!("Waited fixed {}ms before printing", delay_ms);
            Ok(())
        }
        SettleStrategy::Observe {
            timeout_ms,
            poll_interval_ms,
        } => {
            let poll = Duration::from_millis(poll_interval_ms);
            let observe = async {
                loop {
                    if is_settled(page).await? {
                        return Ok::<(), Md2PdfError>(());
                    }
                    tokio::time::sleep(poll).await;
                }
            };
            tokio::time::timeout(max_wait, observe)
                .await
                .map_err(|_| Md2PdfError::SettleTimeout { timeout_ms })??;
            debug!("Page settled after {}ms", start.elapsed().as_millis());
            Ok(())
        }
    }
}

async fn is_settled(page: &Page) -> Result<bool, Md2PdfError> {
    page.evaluate(SETTLED_EXPRESSION)
        .await
        .map_err(|e| Md2PdfError::PageLoad {
            detail: format!("settle check failed: {}", e),
        })?
        .into_value::<bool>()
        .map_err(|e| Md2PdfError::PageLoad {
            detail: format!("settle check returned a non-boolean: {}", e),
        })
}

/// Best effort: a failed lookup only loses the warning.
async fn failed_stylesheets(page: &Page) -> Vec<String> {
    match page.evaluate(FAILED_STYLESHEETS_EXPRESSION).await {
        Ok(result) => result.into_value::<Vec<String>>().unwrap_or_default(),
        Err(e) => {
            debug!("Failed-stylesheet lookup failed: {}", e);
            Vec::new()
        }
    }
}

/// Write via a sibling temp file + rename so a failure never leaves a
/// truncated file at `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |source| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
