//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use edgequake_md2pdf::{
    convert, convert_to_file, CompressionConfig, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, ConversionStats, PaperFormat, PdfPreset, ProgressCallback,
    SettleStrategy, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that names the running stage and logs one line per
/// finished stage above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("md2pdf");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{}…", stage.label()));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.bar.println(format!("  {} {}", red("✗"), stage.label()));
        self.bar.finish_and_clear();
    }

    fn on_conversion_complete(&self, _stats: &ConversionStats) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (notes.md → notes.pdf)
  md2pdf notes.md

  # Explicit output path
  md2pdf notes.md -o build/notes.pdf

  # Also write a Ghostscript-compressed copy (notes-compressed.pdf)
  md2pdf --compress notes.md

  # US Letter, 1.5 cm margins, custom Chrome, inside a container
  md2pdf --paper letter --margin-cm 1.5 --chrome /usr/bin/chromium --no-sandbox notes.md

  # Legacy behaviour: print after a fixed delay instead of waiting for load
  md2pdf --settle-delay-ms 1000 notes.md

  # Machine-readable summary
  md2pdf --json notes.md > summary.json

ENVIRONMENT VARIABLES:
  CHROME             Path to the Chrome/Chromium executable
  MD2PDF_OUTPUT      Default output path
  MD2PDF_COMPRESS    Enable compression (true/false)
  MD2PDF_GS          Ghostscript program (default: gs)
  RUST_LOG           Log filter, overrides --verbose/--quiet
"#;

/// Convert a Markdown file (with math) to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert a Markdown file with KaTeX math to a paginated PDF",
    long_about = "Convert a Markdown document to PDF. Math written as $…$, $$…$$ or ```math \
blocks is typeset with KaTeX; headless Chromium paginates the result. Optionally writes a \
second, Ghostscript-compressed copy.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert.
    input: Option<PathBuf>,

    /// Write the PDF here instead of next to the input.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write <stem>-compressed.pdf via Ghostscript.
    #[arg(long, env = "MD2PDF_COMPRESS")]
    compress: bool,

    /// Ghostscript quality preset.
    #[arg(long, value_enum, default_value = "screen")]
    compress_preset: PresetArg,

    /// Ghostscript program name or path.
    #[arg(long = "gs", env = "MD2PDF_GS", default_value = "gs")]
    gs: String,

    /// Paper size.
    #[arg(long, value_enum, default_value = "a4")]
    paper: PaperArg,

    /// Page margin on all sides, in centimetres.
    #[arg(long, default_value_t = 2.0)]
    margin_cm: f64,

    /// Chrome/Chromium executable (auto-detected when unset).
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,

    /// Launch the browser with --no-sandbox (needed in most containers).
    #[arg(long)]
    no_sandbox: bool,

    /// Seconds to wait for stylesheets, fonts and images before failing.
    #[arg(long, default_value_t = 10)]
    settle_timeout: u64,

    /// Wait this many milliseconds instead of observing page load.
    #[arg(long, conflicts_with = "settle_timeout")]
    settle_delay_ms: Option<u64>,

    /// KaTeX stylesheet URL linked from the page.
    #[arg(long)]
    stylesheet_url: Option<String>,

    /// Colour for math that fails to parse.
    #[arg(long)]
    math_error_color: Option<String>,

    /// Print a JSON summary (paths, math issues, stats) to stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    A4,
    A3,
    Letter,
    Legal,
}

impl From<PaperArg> for PaperFormat {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::A4 => PaperFormat::A4,
            PaperArg::A3 => PaperFormat::A3,
            PaperArg::Letter => PaperFormat::Letter,
            PaperArg::Legal => PaperFormat::Legal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PresetArg {
    Screen,
    Ebook,
    Printer,
    Prepress,
    Default,
}

impl From<PresetArg> for PdfPreset {
    fn from(v: PresetArg) -> Self {
        match v {
            PresetArg::Screen => PdfPreset::Screen,
            PresetArg::Ebook => PdfPreset::Ebook,
            PresetArg::Printer => PdfPreset::Printer,
            PresetArg::Prepress => PdfPreset::Prepress,
            PresetArg::Default => PdfPreset::Default,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Every failure exits 1, including argument errors (clap would use 2).
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let Some(input) = cli.input.clone() else {
        eprintln!("{}", Cli::command().render_usage());
        eprintln!("\nFor more information, try '--help'.");
        return ExitCode::FAILURE;
    };

    init_logging(&cli);

    match run(&cli, input).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && !cli.json
}

fn init_logging(cli: &Cli) {
    // Suppress INFO-level library logs when the spinner is active;
    // it already reports each stage.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress(cli) {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli, input: PathBuf) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress(cli) {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    let output = match cli.output {
        Some(ref output_path) => convert_to_file(&input, output_path, &config).await,
        None => convert(&input, &config).await,
    }
    .with_context(|| format!("Conversion of '{}' failed", input.display()))?;

    report(cli, &output)
}

fn report(cli: &Cli, output: &ConversionOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    for issue in &output.math_issues {
        eprintln!("warning: {issue}");
    }

    println!("PDF created successfully: {}", output.paths.pdf.display());
    if let Some(ref compressed) = output.paths.compressed {
        println!("Compressed PDF created successfully: {}", compressed.display());
    }

    if !cli.quiet {
        let stats = &output.stats;
        let mut line = format!(
            "   {} bytes  ·  {} math  ·  {}ms total",
            stats.pdf_bytes, stats.math_expressions, stats.total_duration_ms
        );
        if let Some(ratio) = stats.compression_ratio() {
            line.push_str(&format!("  ·  compressed to {:.0}%", ratio * 100.0));
        }
        eprintln!("{}", dim(&line));
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let settle = match cli.settle_delay_ms {
        Some(delay_ms) => SettleStrategy::Fixed { delay_ms },
        None => SettleStrategy::Observe {
            timeout_ms: cli.settle_timeout.saturating_mul(1000),
            poll_interval_ms: 100,
        },
    };

    let mut builder = ConversionConfig::builder()
        .paper(cli.paper.into())
        .margin_cm(cli.margin_cm)
        .no_sandbox(cli.no_sandbox)
        .settle(settle);

    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_executable(chrome);
    }
    if let Some(ref url) = cli.stylesheet_url {
        builder = builder.stylesheet_url(url);
    }
    if let Some(ref color) = cli.math_error_color {
        builder = builder.math_error_color(color);
    }
    if cli.compress {
        builder = builder.compression(Some(CompressionConfig {
            program: cli.gs.clone(),
            preset: cli.compress_preset.into(),
            ..CompressionConfig::default()
        }));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
