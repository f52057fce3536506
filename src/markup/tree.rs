//! Owned markup tree.
//!
//! html5ever's DOM (as exposed by `scraper`) is built on non-atomic string
//! buffers, so it cannot be shared across rayon workers. The parsed document
//! is copied once into plain `String`-backed nodes; after that every subtree
//! is an ordinary `&mut` the traversal can hand to a different thread.

use super::RewriteError;
use maud::Render;
use scraper::{ElementRef, Html};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text content is emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style",
    "script",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "plaintext",
    "noscript",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
}

impl Node {
    pub fn is_element(&self, name: &str) -> bool {
        matches!(self, Node::Element(el) if el.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Local name, lowercase (`p`, `img`, `h1`).
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_mut(&mut self, name: &str) -> Option<&mut String> {
        self.attrs
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Set an attribute, appending it if absent.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attr_mut(name) {
            Some(existing) => *existing = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(&el.children, out),
            _ => {}
        }
    }
}

/// A parsed document: the children of the document root (doctype, `html`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// Parse a byte buffer as an HTML document.
    ///
    /// html5ever recovers from malformed markup the way browsers do; the only
    /// hard failure here is a buffer that is not UTF-8.
    pub fn parse(bytes: &[u8]) -> Result<Self, RewriteError> {
        let text = std::str::from_utf8(bytes)?;
        let html = Html::parse_document(text);
        let children = html
            .tree
            .root()
            .children()
            .filter_map(|child| convert_node(child.value(), ElementRef::wrap(child)))
            .collect();
        Ok(Self { children })
    }

    /// The `html` root element.
    pub fn root_element(&self) -> Option<&Element> {
        self.children.iter().find_map(|n| match n {
            Node::Element(el) if el.name == "html" => Some(el),
            _ => None,
        })
    }

    /// The `body` element directly under the root.
    pub fn body(&self) -> Option<&Element> {
        self.root_element()?
            .children
            .iter()
            .find_map(|n| match n {
                Node::Element(el) if el.name == "body" => Some(el),
                _ => None,
            })
    }

    /// Serialize back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, false, &mut out);
        }
        out
    }
}

fn convert_node(value: &scraper::Node, element: Option<ElementRef<'_>>) -> Option<Node> {
    match value {
        scraper::Node::Element(_) => element.map(|el| Node::Element(convert_element(el))),
        scraper::Node::Text(text) => Some(Node::Text(String::from(&**text))),
        scraper::Node::Comment(comment) => Some(Node::Comment(String::from(&**comment))),
        scraper::Node::Doctype(doctype) => Some(Node::Doctype(doctype.name().to_string())),
        _ => None,
    }
}

fn convert_element(element: ElementRef<'_>) -> Element {
    let value = element.value();
    Element {
        name: value.name().to_string(),
        attrs: value
            .attrs
            .iter()
            .map(|(name, v)| {
                // Foreign attributes inside svg/math carry a prefix (`xlink:href`).
                let name = match &name.prefix {
                    Some(prefix) => format!("{prefix}:{}", name.local),
                    None => name.local.to_string(),
                };
                (name, v.to_string())
            })
            .collect(),
        children: element
            .children()
            .filter_map(|child| convert_node(child.value(), ElementRef::wrap(child)))
            .collect(),
    }
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(el) => write_element(el, out),
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => text.as_str().render_to(out),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Doctype(name) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        value.as_str().render_to(out);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&el.name.as_str()) {
        return;
    }

    let raw_text = RAW_TEXT_ELEMENTS.contains(&el.name.as_str());
    for child in &el.children {
        write_node(child, raw_text, out);
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}
