//! Markdown → HTML fragment, with math typeset by KaTeX.
//!
//! comrak parses the document into an AST with its math extensions enabled,
//! so `$…$`, `$$…$$` and ```` ```math ```` blocks arrive as dedicated nodes.
//! Each math node is replaced in place by raw HTML produced by KaTeX, then
//! the tree is serialised. The browser only needs the KaTeX stylesheet, no
//! client-side script.
//!
//! Math never aborts the conversion. KaTeX runs in non-throwing mode and
//! renders bad input as coloured source text; those spans are detected and
//! reported as [`MathIssue`]s. If the engine itself fails, the expression is
//! emitted as escaped text in the error colour instead.
//!
//! Rendering spins up a JavaScript context, so the public entry point runs on
//! the blocking pool (same pattern as any CPU-bound stage).

use crate::config::{MarkdownOptions, MathOptions};
use crate::error::{Md2PdfError, MathIssue};
use comrak::nodes::{NodeHtmlBlock, NodeValue};
use comrak::{Arena, Options};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Output of the markup stage.
#[derive(Debug, Clone, Default)]
pub struct RenderedMarkup {
    /// HTML fragment (body content only).
    pub html: String,
    /// Number of math expressions encountered.
    pub math_count: usize,
    /// Expressions that were rendered as error text.
    pub math_issues: Vec<MathIssue>,
}

/// Render `markdown` on the blocking pool.
pub async fn render_markdown(
    markdown: String,
    markdown_opts: &MarkdownOptions,
    math_opts: &MathOptions,
) -> Result<RenderedMarkup, Md2PdfError> {
    let markdown_opts = markdown_opts.clone();
    let math_opts = math_opts.clone();

    tokio::task::spawn_blocking(move || {
        render_markdown_blocking(&markdown, &markdown_opts, &math_opts)
    })
    .await
    .map_err(|e| Md2PdfError::Internal(format!("Markup task panicked: {}", e)))?
}

/// Blocking implementation of the markup stage.
pub fn render_markdown_blocking(
    markdown: &str,
    markdown_opts: &MarkdownOptions,
    math_opts: &MathOptions,
) -> Result<RenderedMarkup, Md2PdfError> {
    let options = comrak_options(markdown_opts);
    let arena = Arena::new();
    let root = comrak::parse_document(&arena, markdown, &options);

    let mut math_count = 0;
    let mut math_issues = Vec::new();

    for node in root.descendants() {
        let math = match &node.data.borrow().value {
            NodeValue::Math(m) => Some((m.literal.clone(), m.display_math, false)),
            NodeValue::CodeBlock(cb) if markdown_opts.math && is_math_fence(&cb.info) => {
                Some((cb.literal.clone(), true, true))
            }
            _ => None,
        };
        let Some((tex, display, block)) = math else {
            continue;
        };

        math_count += 1;
        let (html, issue) = typeset(tex.trim(), display, math_opts);
        if let Some(issue) = issue {
            warn!("{}", issue);
            math_issues.push(issue);
        }

        node.data.borrow_mut().value = if block {
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: format!("{html}\n"),
            })
        } else {
            NodeValue::HtmlInline(html)
        };
    }

    let mut out = Vec::with_capacity(markdown.len() * 2);
    comrak::format_html(root, &options, &mut out)
        .map_err(|e| Md2PdfError::Internal(format!("HTML serialisation failed: {}", e)))?;
    let html = String::from_utf8(out)
        .map_err(|e| Md2PdfError::Internal(format!("HTML is not UTF-8: {}", e)))?;

    debug!(
        "Rendered {} bytes of HTML ({} math expressions, {} issues)",
        html.len(),
        math_count,
        math_issues.len()
    );

    Ok(RenderedMarkup {
        html,
        math_count,
        math_issues,
    })
}

fn comrak_options(opts: &MarkdownOptions) -> Options<'static> {
    let mut options = Options::default();
    options.render.unsafe_ = opts.raw_html;
    options.render.hardbreaks = opts.hard_breaks;
    options.parse.smart = opts.typographer;
    options.extension.table = opts.tables;
    options.extension.strikethrough = opts.tables;
    options.extension.math_dollars = opts.math;
    options.extension.math_code = opts.math;
    options
}

fn is_math_fence(info: &str) -> bool {
    info.split_whitespace().next() == Some("math")
}

// ── KaTeX ────────────────────────────────────────────────────────────────────

static RE_KATEX_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="katex-error" title="([^"]*)""#).unwrap());

/// Typeset one expression. Always yields HTML; the issue is `Some` when the
/// expression could not be rendered properly.
fn typeset(tex: &str, display: bool, opts: &MathOptions) -> (String, Option<MathIssue>) {
    let issue = |message: String| MathIssue {
        expression: tex.to_string(),
        display,
        message,
    };

    let rendered = katex::Opts::builder()
        .display_mode(display)
        .throw_on_error(opts.throw_on_error)
        .error_color(opts.error_color.clone())
        .build()
        .map_err(|e| e.to_string())
        .and_then(|katex_opts| {
            katex::render_with_opts(tex, &katex_opts).map_err(|e| e.to_string())
        });

    let (html, issue) = match rendered {
        Ok(html) => {
            let issue = RE_KATEX_ERROR
                .captures(&html)
                .map(|caps| issue(unescape_attr(&caps[1])));
            (html, issue)
        }
        Err(message) => (fallback_html(tex, &message, opts), Some(issue(message))),
    };

    let html = if display {
        format!(r#"<span class="math-block">{html}</span>"#)
    } else {
        html
    };
    (html, issue)
}

/// Inert, error-coloured source text for an expression the engine rejected.
fn fallback_html(tex: &str, message: &str, opts: &MathOptions) -> String {
    format!(
        r#"<span class="math-error" title="{}" style="color:{}">{}</span>"#,
        escape_html(message),
        escape_html(&opts.error_color),
        escape_html(tex)
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn unescape_attr(s: &str) -> String {
    s.replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> RenderedMarkup {
        render_markdown_blocking(md, &MarkdownOptions::default(), &MathOptions::default())
            .unwrap()
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let out = render("# Title\n\nSome *emphasis*.\n\n1. one\n2. two\n\n- a\n- b\n");
        assert!(out.html.contains("<h1>Title</h1>"), "{}", out.html);
        assert!(out.html.contains("<em>emphasis</em>"));
        assert!(out.html.contains("<ol>"));
        assert!(out.html.contains("<ul>"));
        assert_eq!(out.math_count, 0);
    }

    #[test]
    fn soft_breaks_become_hard_breaks() {
        let out = render("line one\nline two\n");
        assert!(out.html.contains("<br />"), "{}", out.html);
    }

    #[test]
    fn typographer_substitutes_quotes_and_dashes() {
        let out = render("\"quoted\" -- and --- here...\n");
        assert!(out.html.contains('“') && out.html.contains('”'), "{}", out.html);
        assert!(out.html.contains('–'));
        assert!(out.html.contains('—'));
        assert!(out.html.contains('…'));
    }

    #[test]
    fn raw_html_passes_through() {
        let out = render("<div class=\"note\">kept</div>\n\ntext <kbd>K</kbd>\n");
        assert!(out.html.contains("<div class=\"note\">kept</div>"), "{}", out.html);
        assert!(out.html.contains("<kbd>K</kbd>"));
    }

    #[test]
    fn images_are_rendered() {
        let out = render("![diagram](img/fig.png)\n");
        assert!(out.html.contains(r#"<img src="img/fig.png" alt="diagram""#), "{}", out.html);
    }

    #[test]
    fn inline_math_is_typeset() {
        let out = render("Euler: $e^{i\\pi} + 1 = 0$.\n");
        assert_eq!(out.math_count, 1);
        assert!(out.math_issues.is_empty(), "{:?}", out.math_issues);
        assert!(out.html.contains(r#"class="katex""#), "{}", out.html);
        assert!(!out.html.contains("math-block"));
    }

    #[test]
    fn display_math_is_wrapped() {
        let out = render("$$\\int_0^1 x\\,dx$$\n");
        assert_eq!(out.math_count, 1);
        assert!(out.html.contains(r#"<span class="math-block">"#), "{}", out.html);
        assert!(out.html.contains("katex-display"));
    }

    #[test]
    fn math_fence_is_display_math() {
        let out = render("```math\na^2 + b^2 = c^2\n```\n");
        assert_eq!(out.math_count, 1);
        assert!(out.html.contains("katex-display"), "{}", out.html);
        assert!(!out.html.contains("<pre>"));
    }

    #[test]
    fn invalid_math_is_recovered_not_fatal() {
        let out = render("Broken: $\\frac{1$ but the rest survives.\n");
        assert_eq!(out.math_count, 1);
        assert_eq!(out.math_issues.len(), 1);
        let issue = &out.math_issues[0];
        assert_eq!(issue.expression, "\\frac{1");
        assert!(!issue.display);
        assert!(out.html.contains("#cc0000"), "{}", out.html);
        assert!(out.html.contains("the rest survives"));
    }

    #[test]
    fn throw_on_error_still_recovers() {
        let math = MathOptions {
            throw_on_error: true,
            ..MathOptions::default()
        };
        let out = render_markdown_blocking("$\\frac{1$\n", &MarkdownOptions::default(), &math)
            .unwrap();
        assert_eq!(out.math_issues.len(), 1);
        assert!(out.html.contains("math-error"), "{}", out.html);
        assert!(out.html.contains("color:#cc0000"));
    }

    #[test]
    fn math_disabled_leaves_dollars() {
        let md = MarkdownOptions {
            math: false,
            ..MarkdownOptions::default()
        };
        let out = render_markdown_blocking("costs $5 and $6\n", &md, &MathOptions::default())
            .unwrap();
        assert_eq!(out.math_count, 0);
        assert!(out.html.contains("$5 and $6"), "{}", out.html);

        let out = render_markdown_blocking("```math\nx^2\n```\n", &md, &MathOptions::default())
            .unwrap();
        assert_eq!(out.math_count, 0);
        assert!(!out.html.contains("katex"), "{}", out.html);
        assert!(out.html.contains("x^2"), "{}", out.html);
    }

    #[test]
    fn escape_and_unescape() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
        assert_eq!(unescape_attr("Expected &#x27;}&#x27; &amp; more"), "Expected '}' & more");
    }

    #[tokio::test]
    async fn async_entry_point_matches_blocking() {
        let md = "# Hi\n\n$x$\n".to_string();
        let out = render_markdown(md, &MarkdownOptions::default(), &MathOptions::default())
            .await
            .unwrap();
        assert!(out.html.contains("<h1>Hi</h1>"));
        assert_eq!(out.math_count, 1);
    }
}
