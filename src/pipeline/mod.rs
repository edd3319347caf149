//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and only [`export`] needs a browser.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ markup ──▶ compose ──▶ export ──▶ compress (optional)
//! (read)   (comrak +   (page      (Chromium   (Ghostscript)
//!           KaTeX)      template)  print)
//! ```
//!
//! 1. [`input`]    — read the Markdown file as UTF-8
//! 2. [`markup`]   — Markdown + math → HTML fragment; runs in
//!    `spawn_blocking` because KaTeX evaluates JavaScript
//! 3. [`compose`]  — wrap the fragment in the styled page shell
//! 4. [`export`]   — load the page in headless Chromium, wait for it to
//!    settle, print to PDF
//! 5. [`compress`] — rewrite the PDF with a Ghostscript preset

pub mod compose;
pub mod compress;
pub mod export;
pub mod input;
pub mod markup;
