//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to be told
//! when each stage starts and finishes. The library never prints anything
//! itself; the `md2pdf` binary forwards these events to a terminal spinner.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl ConversionProgressCallback for PrintStages {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{} done in {elapsed_ms}ms", stage.label());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ConversionStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One step of the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Reading the Markdown file.
    Load,
    /// Markdown + math → HTML fragment.
    Markup,
    /// Fragment → full HTML page.
    Compose,
    /// Headless browser → PDF.
    Export,
    /// Ghostscript → compressed PDF.
    Compress,
}

impl Stage {
    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Load => "Reading",
            Stage::Markup => "Rendering Markdown",
            Stage::Compose => "Composing",
            Stage::Export => "Printing PDF",
            Stage::Compress => "Compressing",
        }
    }
}

/// Called by the conversion pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync` so a config holding one can cross
/// `tokio::spawn` boundaries. All methods have default no-op implementations
/// so callers only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called just before a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`      — the stage that finished
    /// * `elapsed_ms` — wall-clock time spent in it
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. The error is also returned to the caller.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after every output file has been written.
    fn on_conversion_complete(&self, stats: &ConversionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
