//! Inline HTML sanitising and URL/colour guards for compiled templates.

use super::html::{self, Element, Node};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tags that survive in `text` block content.
pub const INLINE_TAGS: &[&str] = &["b", "strong", "i", "em", "u", "s", "a", "br", "span"];

/// Elements removed together with everything inside them.
const DROP_WITH_CONTENT: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "iframe", "object", "embed", "noscript", "template",
];

static COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#[0-9a-fA-F]{3,8}|rgba?\(\s*[0-9.%\s,]+\)|[a-zA-Z]{3,20})$").expect("valid colour regex")
});

static MERGE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*[A-Za-z_][A-Za-z0-9_.]*\s*\}\}$").expect("valid merge field regex"));

/// A single `{{ name }}` or `{{ a.b }}` reference with nothing around it.
fn is_template_expression(value: &str) -> bool {
    MERGE_FIELD.is_match(value)
}

/// Return the URL if it is safe to place in an `href`/`src`, otherwise `#`.
///
/// Allowed: http, https, mailto and tel, relative references, and a bare `{{ ... }}` merge field.
pub fn safe_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return "#".to_string();
    }
    if is_template_expression(trimmed) {
        return trimmed.to_string();
    }

    // Browsers ignore embedded whitespace and control characters in schemes
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    let has_scheme = match (scheme_end, path_start) {
        (Some(colon), Some(path)) => colon < path,
        (Some(_), None) => true,
        _ => false,
    };

    if !has_scheme {
        return trimmed.to_string();
    }
    if ["http:", "https:", "mailto:", "tel:"].iter().any(|s| compact.starts_with(s)) {
        trimmed.to_string()
    } else {
        "#".to_string()
    }
}

/// Image sources additionally allow inline raster data URIs.
pub fn safe_image_src(src: &str) -> String {
    let trimmed = src.trim();
    let lower = trimmed.to_ascii_lowercase();
    if ["data:image/png", "data:image/jpeg", "data:image/gif", "data:image/webp"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return trimmed.to_string();
    }
    safe_url(trimmed)
}

/// A CSS colour that cannot break out of its declaration: hex, rgb()/rgba() or a keyword.
pub fn safe_color(color: &str) -> Option<&str> {
    let trimmed = color.trim();
    COLOR.is_match(trimmed).then_some(trimmed)
}

/// Drop declarations that can load resources or run script.
pub fn sanitize_style(style: &str) -> String {
    html::parse_style(style)
        .into_iter()
        .filter(|(_, value)| {
            let lower = value.to_ascii_lowercase();
            !(lower.contains("url(")
                || lower.contains("expression(")
                || lower.contains("javascript:")
                || lower.contains('<')
                || lower.contains('\\'))
        })
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Reduce markup to the inline allow-list. Disallowed tags are unwrapped, keeping their text.
pub fn sanitize_inline(markup: &str) -> String {
    let nodes = html::parse(markup);
    let mut clean = Vec::new();
    clean_nodes(nodes, &mut clean);
    html::serialize(&clean)
}

fn clean_nodes(nodes: Vec<Node>, out: &mut Vec<Node>) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(Node::Text(text)),
            Node::Comment(_) => {}
            Node::Element(element) => {
                if DROP_WITH_CONTENT.contains(&element.name.as_str()) {
                    continue;
                }
                if INLINE_TAGS.contains(&element.name.as_str()) {
                    out.push(Node::Element(clean_element(element)));
                } else {
                    clean_nodes(element.children, out);
                }
            }
        }
    }
}

fn clean_element(element: Element) -> Element {
    let mut attrs = Vec::new();
    if element.is("a")
        && let Some(href) = element.attr("href")
    {
        attrs.push(("href".to_string(), safe_url(href)));
    }
    if let Some(style) = element.attr("style") {
        let style = sanitize_style(style);
        if !style.is_empty() {
            attrs.push(("style".to_string(), style));
        }
    }
    let mut children = Vec::new();
    clean_nodes(element.children, &mut children);
    Element {
        name: element.name,
        attrs,
        children,
    }
}
