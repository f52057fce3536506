//! Exported-document rewrite rules.
//!
//! The exporter emits markup styled for its own editor. Before the markup can
//! sit inside a site theme it is rewritten in a single traversal:
//!
//! | Element | Rule |
//! |---|---|
//! | any with `style` | drop `color` and `font-*` declarations |
//! | `body` | empty the `style` attribute |
//! | `a` | unwrap redirect-wrapper links to their `q` target |
//! | `h1`–`h5` | demote one level (`h6` stays `h6`) |
//! | `img` | point `src` at the normalized asset path |
//! | `p.title`, `p.subtitle` | append `visibility:hidden;display:none` |
//! | `style` | removed from its parent |
//!
//! Headings are demoted because level 1 belongs to the post title, which the
//! site renders from frontmatter; the exporter also emits several level-1
//! headings per document. Titles are hidden rather than deleted so the
//! document keeps its shape.
//!
//! ## Parallel Traversal
//!
//! Every rule reads and writes only the element it visits (or, for `style`
//! elements, the parent's child list after the children are done), so
//! siblings can be rewritten on different rayon workers. Fan-out happens only
//! above `parallel_depth`; deeper subtrees are walked sequentially on the
//! worker that reached them, which keeps task counts bounded for deep or wide
//! documents. Output does not depend on scheduling.

use super::RewriteError;
use super::style::{append_declarations, strip_theme_declarations};
use super::tree::{Document, Element, Node};
use crate::naming::normalized_asset_path;
use rayon::prelude::*;
use url::Url;

/// Declarations appended to title and subtitle paragraphs.
pub const HIDE_STYLE: &str = "visibility:hidden;display:none";

const DEFAULT_PARALLEL_DEPTH: usize = 4;
const DEFAULT_REDIRECT_PREFIX: &str = "https://www.google.com/url?";

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Prefix for rewritten image paths, e.g. `assets`.
    pub asset_prefix: String,
    /// Tree depth below which children are visited sequentially.
    pub parallel_depth: usize,
    /// Links starting with this are treated as redirect wrappers.
    pub redirect_prefix: String,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            asset_prefix: String::new(),
            parallel_depth: DEFAULT_PARALLEL_DEPTH,
            redirect_prefix: DEFAULT_REDIRECT_PREFIX.to_string(),
        }
    }
}

struct Context<'a> {
    doc_id: &'a str,
    options: &'a RewriteOptions,
}

/// Rewrite one exported markup document.
///
/// Fails without producing output when the buffer is not UTF-8 or has no
/// `body` element.
pub fn rewrite(
    doc_id: &str,
    markup: &[u8],
    options: &RewriteOptions,
) -> Result<Vec<u8>, RewriteError> {
    let mut document = Document::parse(markup)?;
    if document.body().is_none() {
        return Err(RewriteError::MissingBody);
    }

    let ctx = Context { doc_id, options };
    rewrite_children(&mut document.children, &ctx, 0);
    Ok(document.to_html().into_bytes())
}

fn rewrite_children(children: &mut Vec<Node>, ctx: &Context<'_>, depth: usize) {
    if depth < ctx.options.parallel_depth && children.len() > 1 {
        children
            .par_iter_mut()
            .for_each(|child| rewrite_node(child, ctx, depth));
    } else {
        for child in children.iter_mut() {
            rewrite_node(child, ctx, depth);
        }
    }
    children.retain(|child| !child.is_element("style"));
}

fn rewrite_node(node: &mut Node, ctx: &Context<'_>, depth: usize) {
    if let Node::Element(element) = node {
        rewrite_element(element, ctx);
        rewrite_children(&mut element.children, ctx, depth + 1);
    }
}

fn rewrite_element(element: &mut Element, ctx: &Context<'_>) {
    if let Some(style) = element.attr_mut("style") {
        *style = strip_theme_declarations(style);
    }

    match element.name.as_str() {
        "body" => {
            if let Some(style) = element.attr_mut("style") {
                style.clear();
            }
        }
        "a" => {
            let target = element
                .attr("href")
                .and_then(|href| unwrap_redirect(href, &ctx.options.redirect_prefix));
            if let Some(target) = target {
                element.set_attr("href", target);
            }
        }
        "img" => {
            if let Some(src) = element.attr_mut("src") {
                let normalized = normalized_asset_path(&ctx.options.asset_prefix, ctx.doc_id, src);
                *src = format!("/{normalized}");
            }
        }
        "p" => {
            if is_title_paragraph(element) {
                match element.attr_mut("style") {
                    Some(style) => append_declarations(style, HIDE_STYLE),
                    None => {
                        let mut style = String::new();
                        append_declarations(&mut style, HIDE_STYLE);
                        element.set_attr("style", style);
                    }
                }
            }
        }
        name => {
            if let Some(level) = heading_level(name)
                && level < 6
            {
                element.name = format!("h{}", level + 1);
            }
        }
    }
}

fn is_title_paragraph(element: &Element) -> bool {
    matches!(element.attr("class"), Some("title" | "subtitle"))
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// The `q` parameter of a redirect-wrapper link, if `href` is one.
fn unwrap_redirect(href: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() || !href.starts_with(prefix) {
        return None;
    }
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
}
