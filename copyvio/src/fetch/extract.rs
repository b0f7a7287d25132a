//! Plain-text extraction from fetched pages.
//!
//! Picks the main content area of an HTML document, drops boilerplate
//! elements (scripts, styles, navigation, header/footer/aside) and renders
//! block-level elements as separate paragraphs so that unpunctuated headings
//! and list items do not run into the following sentence.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements skipped together with everything inside them.
const SKIPPED: &[&str] = &[
    "aside", "button", "footer", "head", "header", "iframe", "nav", "noscript", "script",
    "select", "style", "svg", "template", "textarea",
];

/// Elements rendered as their own paragraph.
const BLOCKS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Content areas tried in order; the first selector with any text wins and
/// every element it matches is rendered.
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Deeper subtrees are flattened instead of walked.
const MAX_DEPTH: usize = 256;

/// How a response body should be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML or XHTML markup.
    Html,
    /// Any other textual body, passed through.
    Text,
    /// Binary or otherwise unusable content.
    Unsupported,
}

impl ContentKind {
    /// Classifies a `Content-Type` header value. A missing header is treated as HTML.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return Self::Html;
        };
        let mime = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "" | "text/html" | "application/xhtml+xml" => Self::Html,
            m if m.starts_with("text/") => Self::Text,
            _ => Self::Unsupported,
        }
    }
}

/// Extracts readable plain text from an HTML document.
///
/// Paragraphs are separated by a blank line and whitespace inside each
/// paragraph is collapsed. Returns an empty string for pages without text.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let text = document
            .select(&selector)
            .filter(|element| !nested_in_match(*element, &selector))
            .map(render)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !text.is_empty() {
            return text;
        }
    }

    // Fragments without a body still carry text.
    render(document.root_element())
}

/// Normalizes a plain-text body the same way extracted HTML is normalized.
#[must_use]
pub fn plain_text(body: &str) -> String {
    paragraphs(&body.replace("\r\n", "\n"))
}

/// Whether an ancestor of `element` also matches `selector`; its text is
/// already rendered with that ancestor.
fn nested_in_match(element: ElementRef<'_>, selector: &Selector) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| selector.matches(&ancestor))
}

fn render(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    walk(root, 0, &mut raw);
    paragraphs(&raw)
}

fn walk(element: ElementRef<'_>, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        out.extend(element.text());
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED.contains(&name) {
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCKS.contains(&name);
                if is_block {
                    out.push_str("\n\n");
                }
                walk(child_element, depth + 1, out);
                if is_block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

/// Splits on blank lines, collapses whitespace inside each paragraph and
/// drops empty ones.
fn paragraphs(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for paragraph in raw.split("\n\n") {
        let mut words = paragraph.split_whitespace().peekable();
        if words.peek().is_none() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        for (i, word) in words.enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}
