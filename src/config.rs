//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Each pipeline stage receives only the
//! immutable slice of configuration it needs ([`MarkdownOptions`],
//! [`MathOptions`], [`PageOptions`], [`BrowserOptions`],
//! [`CompressionConfig`]), constructed once per invocation.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Stylesheet providing KaTeX glyph fonts and layout rules.
pub const DEFAULT_KATEX_STYLESHEET: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.7/dist/katex.min.css";

/// Colour used for math expressions that fail to parse.
pub const DEFAULT_MATH_ERROR_COLOR: &str = "#cc0000";

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::{ConversionConfig, PaperFormat, PdfPreset};
///
/// let config = ConversionConfig::builder()
///     .paper(PaperFormat::Letter)
///     .margin_cm(2.5)
///     .compress(PdfPreset::Screen)
///     .build()
///     .unwrap();
/// assert!(config.compression.is_some());
/// ```
#[derive(Clone, Default)]
pub struct ConversionConfig {
    /// Markdown parser/renderer switches.
    pub markdown: MarkdownOptions,

    /// KaTeX settings.
    pub math: MathOptions,

    /// Paper size, margins and document shell settings.
    pub page: PageOptions,

    /// Headless browser launch and settle behaviour.
    pub browser: BrowserOptions,

    /// When set, a second `<stem>-compressed.pdf` is produced with Ghostscript.
    pub compression: Option<CompressionConfig>,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("markdown", &self.markdown)
            .field("math", &self.math)
            .field("page", &self.page)
            .field("browser", &self.browser)
            .field("compression", &self.compression)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

// ── Stage options ────────────────────────────────────────────────────────

/// Markdown conversion switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// Pass raw HTML in the source through to the output. Default: true.
    pub raw_html: bool,
    /// Render soft line breaks as `<br />`. Default: true.
    pub hard_breaks: bool,
    /// Smart quotes, en/em dashes and ellipses. Default: true.
    pub typographer: bool,
    /// GFM tables and strikethrough. Default: true.
    pub tables: bool,
    /// Recognise `$…$`, `$$…$$` and ```` ```math ```` blocks. Default: true.
    pub math: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            raw_html: true,
            hard_breaks: true,
            typographer: true,
            tables: true,
            math: true,
        }
    }
}

/// KaTeX options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathOptions {
    /// Colour applied to expressions that fail to parse. Default: `#cc0000`.
    pub error_color: String,
    /// Raise instead of rendering parse errors inline. Default: false.
    ///
    /// Even when true, the pipeline recovers the error locally and records a
    /// [`crate::error::MathIssue`]; math never aborts a conversion.
    pub throw_on_error: bool,
}

impl Default for MathOptions {
    fn default() -> Self {
        Self {
            error_color: DEFAULT_MATH_ERROR_COLOR.to_string(),
            throw_on_error: false,
        }
    }
}

/// Page geometry and document shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOptions {
    /// Paper size. Default: A4.
    pub paper: PaperFormat,
    /// Margins on each side, in centimetres. Default: 2 cm all round.
    pub margins: Margins,
    /// Print CSS backgrounds. Default: true.
    pub print_background: bool,
    /// Linked stylesheet for math glyphs. Default: KaTeX 0.16 on jsDelivr.
    pub stylesheet_url: String,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            paper: PaperFormat::default(),
            margins: Margins::uniform(2.0),
            print_background: true,
            stylesheet_url: DEFAULT_KATEX_STYLESHEET.to_string(),
        }
    }
}

/// Margins in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    /// Same margin on all four sides.
    pub fn uniform(cm: f64) -> Self {
        Self {
            top: cm,
            right: cm,
            bottom: cm,
            left: cm,
        }
    }

    fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|m| m.is_finite() && *m >= 0.0)
    }
}

/// Browser launch and settle options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Explicit Chrome/Chromium executable. Default: auto-detect.
    pub executable: Option<PathBuf>,
    /// Launch with `--no-sandbox` (containers, CI). Default: false.
    pub no_sandbox: bool,
    /// How to decide that the page has finished rendering.
    pub settle: SettleStrategy,
}

/// Ghostscript invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Program to run. Default: `gs`.
    pub program: String,
    /// `-dPDFSETTINGS` preset. Default: `/screen`.
    pub preset: PdfPreset,
    /// `-dCompatibilityLevel`. Default: `1.4`.
    pub compatibility_level: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            program: "gs".to_string(),
            preset: PdfPreset::default(),
            compatibility_level: "1.4".to_string(),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn raw_html(mut self, v: bool) -> Self {
        self.config.markdown.raw_html = v;
        self
    }

    pub fn hard_breaks(mut self, v: bool) -> Self {
        self.config.markdown.hard_breaks = v;
        self
    }

    pub fn typographer(mut self, v: bool) -> Self {
        self.config.markdown.typographer = v;
        self
    }

    pub fn math(mut self, v: bool) -> Self {
        self.config.markdown.math = v;
        self
    }

    pub fn math_error_color(mut self, color: impl Into<String>) -> Self {
        self.config.math.error_color = color.into();
        self
    }

    pub fn paper(mut self, paper: PaperFormat) -> Self {
        self.config.page.paper = paper;
        self
    }

    pub fn margin_cm(mut self, cm: f64) -> Self {
        self.config.page.margins = Margins::uniform(cm);
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.page.margins = margins;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.config.page.print_background = v;
        self
    }

    pub fn stylesheet_url(mut self, url: impl Into<String>) -> Self {
        self.config.page.stylesheet_url = url.into();
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser.executable = Some(path.into());
        self
    }

    pub fn no_sandbox(mut self, v: bool) -> Self {
        self.config.browser.no_sandbox = v;
        self
    }

    pub fn settle(mut self, strategy: SettleStrategy) -> Self {
        self.config.browser.settle = strategy;
        self
    }

    /// Enable compression with the given preset and default program.
    pub fn compress(mut self, preset: PdfPreset) -> Self {
        let mut compression = self.config.compression.take().unwrap_or_default();
        compression.preset = preset;
        self.config.compression = Some(compression);
        self
    }

    pub fn compression(mut self, compression: Option<CompressionConfig>) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if !c.page.margins.is_valid() {
            return Err(Md2PdfError::InvalidConfig(format!(
                "margins must be finite and ≥ 0 cm, got {:?}",
                c.page.margins
            )));
        }
        let (width_cm, height_cm) = c.page.paper.size_cm();
        let m = c.page.margins;
        if m.left + m.right >= width_cm || m.top + m.bottom >= height_cm {
            return Err(Md2PdfError::InvalidConfig(format!(
                "margins {:?} leave no printable area on {:?}",
                m, c.page.paper
            )));
        }
        if c.page.stylesheet_url.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "stylesheet URL must not be empty".into(),
            ));
        }
        if c.math.error_color.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "math error colour must not be empty".into(),
            ));
        }
        if let SettleStrategy::Observe {
            timeout_ms,
            poll_interval_ms,
        } = c.browser.settle
        {
            if timeout_ms == 0 || poll_interval_ms == 0 {
                return Err(Md2PdfError::InvalidConfig(
                    "settle timeout and poll interval must be > 0".into(),
                ));
            }
        }
        if let Some(ref compression) = c.compression {
            if compression.program.trim().is_empty() {
                return Err(Md2PdfError::InvalidConfig(
                    "compression program must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Fixed paper sizes accepted by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    /// ISO A4, 21.0 × 29.7 cm. (default)
    #[default]
    A4,
    /// ISO A3, 29.7 × 42.0 cm.
    A3,
    /// US Letter, 8.5 × 11 in.
    Letter,
    /// US Legal, 8.5 × 14 in.
    Legal,
}

impl PaperFormat {
    /// Width and height in centimetres.
    pub fn size_cm(self) -> (f64, f64) {
        match self {
            PaperFormat::A4 => (21.0, 29.7),
            PaperFormat::A3 => (29.7, 42.0),
            PaperFormat::Letter => (21.59, 27.94),
            PaperFormat::Legal => (21.59, 35.56),
        }
    }

    /// Width and height in inches, the unit Chromium's print API expects.
    pub fn size_inches(self) -> (f64, f64) {
        let (w, h) = self.size_cm();
        (cm_to_inches(w), cm_to_inches(h))
    }
}

/// Convert centimetres to inches.
pub fn cm_to_inches(cm: f64) -> f64 {
    cm / 2.54
}

/// Ghostscript `-dPDFSETTINGS` presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfPreset {
    /// 72 dpi images, smallest files. (default)
    #[default]
    Screen,
    /// 150 dpi images.
    Ebook,
    /// 300 dpi images.
    Printer,
    /// 300 dpi, colour preserving.
    Prepress,
    /// Ghostscript's general-purpose default.
    Default,
}

impl PdfPreset {
    /// The value passed as `-dPDFSETTINGS=<…>`.
    pub fn as_gs_setting(self) -> &'static str {
        match self {
            PdfPreset::Screen => "/screen",
            PdfPreset::Ebook => "/ebook",
            PdfPreset::Printer => "/printer",
            PdfPreset::Prepress => "/prepress",
            PdfPreset::Default => "/default",
        }
    }
}

/// How the exporter decides that in-page rendering is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleStrategy {
    /// Poll the page until stylesheets, fonts and images report loaded.
    /// Fails with [`Md2PdfError::SettleTimeout`] after `timeout_ms`. (default)
    Observe {
        timeout_ms: u64,
        poll_interval_ms: u64,
    },
    /// Sleep for a fixed duration and export whatever is on the page.
    Fixed { delay_ms: u64 },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Observe {
            timeout_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

impl SettleStrategy {
    /// The legacy one-second settle delay.
    pub fn fixed_default() -> Self {
        SettleStrategy::Fixed { delay_ms: 1_000 }
    }

    /// Upper bound on time spent settling.
    pub fn max_wait(&self) -> Duration {
        match *self {
            SettleStrategy::Observe { timeout_ms, .. } => Duration::from_millis(timeout_ms),
            SettleStrategy::Fixed { delay_ms } => Duration::from_millis(delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_match_export_contract() {
        let config = ConversionConfig::default();
        assert_eq!(config.page.paper, PaperFormat::A4);
        assert_eq!(config.page.margins, Margins::uniform(2.0));
        assert!(config.page.print_background);
        assert!(config.compression.is_none());
        assert!(config.markdown.raw_html);
        assert!(config.markdown.hard_breaks);
        assert!(config.markdown.typographer);
        assert!(!config.math.throw_on_error);
        assert_eq!(config.math.error_color, "#cc0000");
    }

    #[test]
    fn compress_enables_gs_screen() {
        let config = ConversionConfig::builder()
            .compress(PdfPreset::Screen)
            .build()
            .unwrap();
        let c = config.compression.unwrap();
        assert_eq!(c.program, "gs");
        assert_eq!(c.preset.as_gs_setting(), "/screen");
        assert_eq!(c.compatibility_level, "1.4");
    }

    #[test]
    fn negative_margin_rejected() {
        let err = ConversionConfig::builder()
            .margin_cm(-1.0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn margins_wider_than_paper_rejected() {
        let err = ConversionConfig::builder()
            .margin_cm(11.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("printable area"), "got: {err}");
    }

    #[test]
    fn zero_settle_timeout_rejected() {
        let result = ConversionConfig::builder()
            .settle(SettleStrategy::Observe {
                timeout_ms: 0,
                poll_interval_ms: 100,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn empty_compressor_rejected() {
        let result = ConversionConfig::builder()
            .compression(Some(CompressionConfig {
                program: "  ".into(),
                ..CompressionConfig::default()
            }))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn a4_in_inches() {
        let (w, h) = PaperFormat::A4.size_inches();
        assert!((w - 8.27).abs() < 0.01, "width {w}");
        assert!((h - 11.69).abs() < 0.01, "height {h}");
        assert!((cm_to_inches(2.0) - 0.787).abs() < 0.001);
    }

    #[test]
    fn settle_max_wait() {
        assert_eq!(
            SettleStrategy::fixed_default().max_wait(),
            Duration::from_secs(1)
        );
        assert_eq!(
            SettleStrategy::default().max_wait(),
            Duration::from_secs(10)
        );
    }
}
