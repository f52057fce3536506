//! Markup rewriting for exported documents.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Parse** | `scraper` (html5ever) → owned [`Document`] tree |
//! | **Rewrite** | rule table in [`rewrite`], fanned out with `rayon` |
//! | **Serialize** | [`Document::to_html`], escaping through `maud::Render` |
//!
//! The module is split into:
//! - **Tree**: owned, `Send` node types plus parse/serialize
//! - **Style**: pure functions over inline `style` declaration lists
//! - **Rewrite**: the per-element rules and the bounded parallel traversal

mod rewrite;
mod style;
mod tree;

use thiserror::Error;

pub use rewrite::{HIDE_STYLE, RewriteOptions, rewrite};
pub use style::strip_theme_declarations;
pub use tree::{Document, Element, Node};

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("markup is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("markup has no <body> element")]
    MissingBody,
}
