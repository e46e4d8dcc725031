//! Recover a block tree from arbitrary HTML.
//!
//! Markup produced by [`compile`](super::compile::compile) is decoded exactly from its
//! `data-block` cells. Anything else goes through best-effort heuristics: headings, paragraphs,
//! images, rules, button-like links, spacer cells and two-plus-cell table rows are recognised,
//! layout containers are flattened, and whatever is left becomes a raw `html` block.

use super::blocks::{Align, Block, Column};
use super::html::{self, Element, Node};
use super::sanitize::{INLINE_TAGS, sanitize_inline};
use once_cell::sync::Lazy;
use regex::Regex;

const DROPPED: &[&str] = &["script", "style", "head", "title", "meta", "link"];

const CONTAINERS: &[&str] = &[
    "html", "body", "center", "div", "section", "table", "tbody", "thead", "tfoot", "tr", "td", "th", "article", "main",
    "header", "footer",
];

const DEFAULT_SPACER_HEIGHT: u32 = 24;

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").expect("valid number regex"));

static COLOR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(#[0-9a-fA-F]{3,8}\b|rgba?\([^)]*\))").expect("valid colour token regex")
});

/// Parse HTML into blocks. Never fails; unrecognised markup degrades to `html` blocks.
pub fn parse(markup: &str) -> Vec<Block> {
    let nodes = html::parse(markup);
    let mut blocks = Vec::new();
    map_nodes(&nodes, &mut blocks);
    blocks
}

fn map_nodes(nodes: &[Node], out: &mut Vec<Block>) {
    let mut inline_run: Vec<&Node> = Vec::new();
    for node in nodes {
        match node {
            Node::Comment(_) => {}
            Node::Text(_) => inline_run.push(node),
            Node::Element(el) if is_inline(el) => inline_run.push(node),
            Node::Element(el) => {
                flush_inline(&mut inline_run, out);
                map_element(el, out);
            }
        }
    }
    flush_inline(&mut inline_run, out);
}

fn is_inline(el: &Element) -> bool {
    if !INLINE_TAGS.contains(&el.name.as_str()) {
        return false;
    }
    !(el.is("a") && (is_button(el) || el.find(&|e| e.is("img")).is_some()))
}

/// Loose text and inline elements become one text block. Whitespace-only runs are dropped.
fn flush_inline(run: &mut Vec<&Node>, out: &mut Vec<Block>) {
    if run.is_empty() {
        return;
    }
    let nodes: Vec<Node> = run.drain(..).cloned().collect();
    let content = sanitize_inline(&html::serialize(&nodes));
    push_text(content.trim().to_string(), Align::Left, out);
}

fn push_text(content: String, align: Align, out: &mut Vec<Block>) {
    if has_visible_content(&content) {
        out.push(Block::Text { content, align });
    }
}

fn has_visible_content(markup: &str) -> bool {
    let nodes = html::parse(markup);
    let text: String = nodes
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.clone(),
            Node::Element(e) => e.text_content(),
            Node::Comment(_) => String::new(),
        })
        .collect();
    !text.trim().is_empty()
}

fn map_element(el: &Element, out: &mut Vec<Block>) {
    let name = el.name.as_str();
    if DROPPED.contains(&name) {
        return;
    }

    if let Some(kind) = el.attr("data-block")
        && let Some(block) = decode_marked(kind, el)
    {
        out.push(block);
        return;
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = el.text_content().trim().to_string();
            if !text.is_empty() {
                out.push(Block::Heading {
                    text,
                    level: name[1..].parse().unwrap_or(2),
                    align: align_of(el),
                    color: el.style_value("color"),
                });
            }
        }
        "img" => out.extend(image_from(el, None, Align::Left)),
        "hr" => out.push(divider_from(el)),
        "a" => {
            if let Some(img) = el.find(&|e| e.is("img")) {
                out.extend(image_from(img, el.attr("href"), Align::Left));
            } else {
                out.push(Block::Button {
                    label: el.text_content().trim().to_string(),
                    url: el.attr("href").unwrap_or("#").to_string(),
                    background_color: background_color(el),
                    text_color: el.style_value("color"),
                    align: Align::Left,
                });
            }
        }
        "p" if is_spacer(el) => out.push(spacer_from(el)),
        "p" if el.find(&|e| e.is("img") || (e.is("a") && is_button(e))).is_some() => map_nodes(&el.children, out),
        "p" => push_text(sanitize_inline(&el.inner_html()).trim().to_string(), align_of(el), out),
        "div" | "td" | "th" if is_spacer(el) => out.push(spacer_from(el)),
        "table" => match columns_from(el) {
            Some(columns) => out.push(Block::Columns { columns }),
            None => map_nodes(&el.children, out),
        },
        _ if CONTAINERS.contains(&name) => map_nodes(&el.children, out),
        // Lists, quotes, preformatted text and anything unknown
        _ => out.push(Block::Html {
            html: html::serialize_element(el),
        }),
    }
}

/// Decode a cell written by the compiler. Returns `None` for unknown kinds.
fn decode_marked(kind: &str, el: &Element) -> Option<Block> {
    let align = el.attr("data-align").and_then(Align::parse).unwrap_or_default();
    let data = |name: &str| el.attr(&format!("data-{name}")).map(str::to_string);

    let block = match kind {
        "heading" => {
            let heading = el.find(&|e| matches!(e.name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6"));
            let level = data("level")
                .and_then(|l| l.parse().ok())
                .or_else(|| heading.and_then(|h| h.name[1..].parse().ok()))
                .unwrap_or(2);
            Block::Heading {
                text: heading.map(Element::text_content).unwrap_or_else(|| el.text_content()),
                level,
                align,
                color: data("color"),
            }
        }
        "text" => {
            let body = el.child_elements().find(|e| e.is("div")).unwrap_or(el);
            Block::Text {
                content: body.inner_html(),
                align,
            }
        }
        "button" => {
            let link = el.find(&|e| e.is("a"));
            Block::Button {
                label: link.map(Element::text_content).unwrap_or_default(),
                url: link.and_then(|a| a.attr("href")).unwrap_or("#").to_string(),
                background_color: data("background-color"),
                text_color: data("text-color"),
                align,
            }
        }
        "image" => {
            let img = el.find(&|e| e.is("img"))?;
            Block::Image {
                src: img.attr("src").unwrap_or_default().to_string(),
                alt: img.attr("alt").map(str::to_string),
                width: data("width").and_then(|w| w.parse().ok()),
                align,
                link: el.find(&|e| e.is("a")).and_then(|a| a.attr("href")).map(str::to_string),
            }
        }
        "divider" => Block::Divider {
            color: data("color"),
            thickness: data("thickness").and_then(|t| t.parse().ok()),
        },
        "spacer" => Block::Spacer {
            height: data("height")
                .and_then(|h| h.parse().ok())
                .unwrap_or(DEFAULT_SPACER_HEIGHT),
        },
        "columns" => {
            let table = el.find(&|e| e.is("table"))?;
            let row = table_rows(table).into_iter().next()?;
            let columns = cells(row)
                .into_iter()
                .map(|cell| Column {
                    width: cell.attr("data-width").and_then(|w| w.parse().ok()),
                    blocks: {
                        let mut blocks = Vec::new();
                        map_nodes(&cell.children, &mut blocks);
                        blocks
                    },
                })
                .collect();
            Block::Columns { columns }
        }
        "html" => Block::Html { html: el.inner_html() },
        _ => return None,
    };
    Some(block)
}

fn align_of(el: &Element) -> Align {
    el.style_value("text-align")
        .as_deref()
        .and_then(Align::parse)
        .or_else(|| el.attr("align").and_then(Align::parse))
        .unwrap_or_default()
}

fn leading_number(value: &str) -> Option<u32> {
    LEADING_NUMBER
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn is_button(a: &Element) -> bool {
    let style = a.style();
    let styled = style.iter().any(|(k, v)| {
        k == "background-color"
            || k == "background"
            || k.starts_with("padding")
            || (k == "display" && v.to_ascii_lowercase().contains("inline-block"))
    });
    let classed = a.attr("class").is_some_and(|c| {
        let c = c.to_ascii_lowercase();
        c.contains("button") || c.contains("btn")
    });
    styled || classed
}

fn background_color(a: &Element) -> Option<String> {
    a.style_value("background-color").or_else(|| {
        a.style_value("background")
            .and_then(|bg| bg.split_whitespace().next().map(str::to_string))
    })
}

/// A layout cell that only reserves vertical space.
fn is_spacer(el: &Element) -> bool {
    let has_height = el.style().iter().any(|(k, _)| k.contains("height"));
    has_height && el.text_content().trim().is_empty() && el.find(&|e| e.is("img")).is_none()
}

fn spacer_from(el: &Element) -> Block {
    let style = el.style();
    let height = style
        .iter()
        .find(|(k, _)| k == "height")
        .or_else(|| style.iter().find(|(k, _)| k.ends_with("height")))
        .and_then(|(_, v)| leading_number(v))
        .or_else(|| el.attr("height").and_then(leading_number))
        .unwrap_or(DEFAULT_SPACER_HEIGHT);
    Block::Spacer { height }
}

fn image_from(img: &Element, link: Option<&str>, align: Align) -> Option<Block> {
    let src = img.attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    let width = img
        .attr("width")
        .filter(|w| !w.contains('%'))
        .and_then(leading_number)
        .or_else(|| img.style_value("width").filter(|w| w.contains("px")).and_then(|w| leading_number(&w)));
    Some(Block::Image {
        src: src.to_string(),
        alt: img.attr("alt").map(str::to_string),
        width,
        align,
        link: link.map(str::to_string),
    })
}

fn divider_from(hr: &Element) -> Block {
    let style = hr.style();
    let lookup = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| style.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()))
    };
    let border = lookup(&["border-top", "border", "border-bottom"]);

    let thickness = lookup(&["border-top-width", "height"])
        .or_else(|| border.clone())
        .and_then(|v| {
            v.split_whitespace()
                .find(|t| t.ends_with("px"))
                .and_then(leading_number)
        })
        .and_then(|t| u8::try_from(t).ok());

    let color = lookup(&["border-top-color", "border-color", "background-color"])
        .or_else(|| {
            border
                .as_deref()
                .and_then(|b| COLOR_TOKEN.find(b))
                .map(|m| m.as_str().to_string())
        })
        .or_else(|| hr.attr("color").map(str::to_string));

    Block::Divider { color, thickness }
}

fn table_rows(table: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for child in table.child_elements() {
        match child.name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(child.child_elements().filter(|e| e.is("tr"))),
            _ => {}
        }
    }
    rows
}

fn cells(row: &Element) -> Vec<&Element> {
    row.child_elements().filter(|e| e.is("td") || e.is("th")).collect()
}

/// A table with exactly one row of two or more cells is a column layout.
fn columns_from(table: &Element) -> Option<Vec<Column>> {
    let rows = table_rows(table);
    let [row] = rows.as_slice() else {
        return None;
    };
    let cells = cells(row);
    if cells.len() < 2 {
        return None;
    }
    Some(
        cells
            .into_iter()
            .map(|cell| {
                let width = cell
                    .attr("width")
                    .map(str::to_string)
                    .or_else(|| cell.style_value("width"))
                    .filter(|w| w.trim_end().ends_with('%'))
                    .and_then(|w| leading_number(&w))
                    .and_then(|w| u8::try_from(w).ok())
                    .filter(|w| (1..=100).contains(w));
                let mut blocks = Vec::new();
                map_nodes(&cell.children, &mut blocks);
                Column { width, blocks }
            })
            .collect(),
    )
}
