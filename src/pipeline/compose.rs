//! Wrap a rendered HTML fragment in the fixed page template.
//!
//! Pure string composition: no I/O, no failure modes. The embedded
//! stylesheet constrains the body to page width, keeps images inside their
//! container, and replaces native ordered-list markers with counters drawn
//! to the left of the list margin so multi-digit numbers stay aligned.

use crate::config::PageOptions;
use crate::pipeline::markup::escape_html;
use std::path::{Path, PathBuf};

/// Embedded stylesheet for every exported document.
pub const PAGE_CSS: &str = r#"
      body {
        font-family: Arial, sans-serif;
        line-height: 1.6;
        color: #333;
        padding: 2rem;
        max-width: 210mm;
        margin: 0 auto;
      }
      .katex {
        font-size: 1em !important;
      }
      .katex-display {
        overflow-x: auto;
        padding: 1rem 0;
        margin: 1rem 0;
      }
      .katex-display > .katex {
        text-align: left;
        white-space: normal;
      }
      img {
        max-width: 100%;
        height: auto;
        display: block;
        margin: 1rem auto;
      }
      ol {
        padding-left: 2rem;
        margin: 1rem 0;
        counter-reset: list-counter;
      }
      ol > li {
        margin: 1rem 0;
        position: relative;
        list-style: none;
      }
      ol > li:before {
        content: counter(list-counter) ".";
        counter-increment: list-counter;
        position: absolute;
        left: -2rem;
        width: 1.5rem;
        text-align: right;
      }
      p { margin: 0.5rem 0; }
      .math-block {
        display: block;
        margin: 1rem 0;
        overflow-x: auto;
      }
      .math-error {
        font-family: monospace;
      }
"#;

/// Marks a stylesheet `<link>` that failed to load, so the exporter can stop
/// waiting for it.
pub const STYLESHEET_ONERROR: &str = "this.dataset.failed = 'true'";

/// A complete HTML page ready for the browser.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    /// Full HTML text.
    pub html: String,
    /// Directory relative resources (images) resolve against.
    pub base_dir: Option<PathBuf>,
}

/// Build the full page around `fragment`.
///
/// When `base_dir` is given, a `<base>` element points relative URLs at it,
/// so `![](img/fig.png)` finds the image next to the Markdown file.
pub fn compose_document(
    fragment: &str,
    title: &str,
    page: &PageOptions,
    base_dir: Option<&Path>,
) -> ComposedDocument {
    let base = base_dir
        .map(|dir| {
            format!(
                "\n    <base href=\"{}\">",
                escape_html(&directory_url(dir))
            )
        })
        .unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>{title}</title>{base}
    <link rel="stylesheet" href="{stylesheet}" onerror="{on_error}">
    <style>{css}    </style>
  </head>
  <body>
{fragment}
  </body>
</html>
"#,
        title = escape_html(title),
        base = base,
        stylesheet = escape_html(&page.stylesheet_url),
        on_error = STYLESHEET_ONERROR,
        css = PAGE_CSS,
        fragment = fragment,
    );

    ComposedDocument {
        html,
        base_dir: base_dir.map(Path::to_path_buf),
    }
}

/// `file://` URL for a local path; each path segment is percent-encoded.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = raw
        .split('/')
        .map(|segment| {
            // Keep Windows drive letters ("C:") readable.
            if segment.len() == 2 && segment.ends_with(':') {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect();
    let joined = encoded.join("/");
    if joined.starts_with('/') {
        format!("file://{}", joined)
    } else {
        format!("file:///{}", joined)
    }
}

fn directory_url(dir: &Path) -> String {
    let mut url = file_url(dir);
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
