//! Compile a block tree into an email-safe HTML document.
//!
//! Layout uses nested presentation tables with inline styles, the lowest common denominator
//! across mail clients. Every block is rendered as a `<td data-block="...">` cell whose `data-*`
//! attributes carry the block's settings so the parser can recover it exactly.

use super::blocks::{Align, Block, Column};
use super::html::{escape_attr, escape_text};
use super::sanitize::{safe_color, safe_image_src, safe_url, sanitize_inline};
use std::fmt::Write;

pub const CONTAINER_WIDTH: u32 = 600;
const FONT_STACK: &str = "Helvetica, Arial, sans-serif";
const BODY_BACKGROUND: &str = "#f4f4f5";
const DEFAULT_TEXT_COLOR: &str = "#1f2937";
const DEFAULT_HEADING_COLOR: &str = "#111827";
const DEFAULT_BUTTON_BACKGROUND: &str = "#2563eb";
const DEFAULT_BUTTON_TEXT: &str = "#ffffff";
const DEFAULT_DIVIDER_COLOR: &str = "#e5e7eb";
const HEADING_SIZES: [u32; 6] = [32, 26, 22, 18, 16, 14];
const TABLE_ATTRS: &str = r#"role="presentation" cellpadding="0" cellspacing="0" border="0""#;

/// Compile blocks into a complete HTML document.
pub fn compile(blocks: &[Block]) -> String {
    let mut out = String::with_capacity(1024 + blocks.len() * 256);
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html><head><meta charset=\"utf-8\">");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"></head>\n");
    let _ = writeln!(out, "<body style=\"margin:0;padding:0;background-color:{BODY_BACKGROUND};\">");
    let _ = writeln!(
        out,
        "<table {TABLE_ATTRS} width=\"100%\" style=\"background-color:{BODY_BACKGROUND};\"><tr><td align=\"center\" style=\"padding:24px 0;\">"
    );
    let _ = writeln!(
        out,
        "<table {TABLE_ATTRS} width=\"{CONTAINER_WIDTH}\" style=\"width:{CONTAINER_WIDTH}px;max-width:{CONTAINER_WIDTH}px;background-color:#ffffff;\">"
    );
    for block in blocks {
        write_row(&mut out, block);
    }
    out.push_str("</table>\n</td></tr></table>\n</body></html>\n");
    out
}

fn write_row(out: &mut String, block: &Block) {
    out.push_str("<tr>");
    write_block(out, block);
    out.push_str("</tr>\n");
}

fn color_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.and_then(safe_color).unwrap_or(default)
}

/// ` data-name="value"` when the value is present.
fn data_attr(out: &mut String, name: &str, value: Option<impl ToString>) {
    if let Some(value) = value {
        let _ = write!(out, " data-{name}=\"{}\"", escape_attr(&value.to_string()));
    }
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading {
            text,
            level,
            align,
            color,
        } => {
            let level = (*level).clamp(1, 6);
            let size = HEADING_SIZES[usize::from(level - 1)];
            let _ = write!(out, "<td data-block=\"heading\" data-level=\"{level}\" data-align=\"{}\"", align.as_str());
            data_attr(out, "color", color.as_deref());
            let _ = write!(
                out,
                " style=\"padding:8px 24px;\"><h{level} style=\"margin:0;font-family:{FONT_STACK};font-size:{size}px;line-height:1.3;color:{};text-align:{};\">{}</h{level}></td>",
                color_or(color.as_deref(), DEFAULT_HEADING_COLOR),
                align.as_str(),
                escape_text(text),
            );
        }
        Block::Text { content, align } => {
            let _ = write!(
                out,
                "<td data-block=\"text\" data-align=\"{align}\" style=\"padding:8px 24px;\"><div style=\"font-family:{FONT_STACK};font-size:16px;line-height:1.5;color:{DEFAULT_TEXT_COLOR};text-align:{align};\">{}</div></td>",
                sanitize_inline(content),
                align = align.as_str(),
            );
        }
        Block::Button {
            label,
            url,
            background_color,
            text_color,
            align,
        } => {
            let _ = write!(out, "<td data-block=\"button\" data-align=\"{}\"", align.as_str());
            data_attr(out, "background-color", background_color.as_deref());
            data_attr(out, "text-color", text_color.as_deref());
            let _ = write!(
                out,
                " align=\"{}\" style=\"padding:12px 24px;\"><a href=\"{}\" style=\"display:inline-block;padding:12px 24px;background-color:{};color:{};font-family:{FONT_STACK};font-size:16px;font-weight:600;text-decoration:none;border-radius:4px;\">{}</a></td>",
                align.as_str(),
                escape_attr(&safe_url(url)),
                color_or(background_color.as_deref(), DEFAULT_BUTTON_BACKGROUND),
                color_or(text_color.as_deref(), DEFAULT_BUTTON_TEXT),
                escape_text(label),
            );
        }
        Block::Image {
            src,
            alt,
            width,
            align,
            link,
        } => {
            let _ = write!(out, "<td data-block=\"image\" data-align=\"{}\"", align.as_str());
            data_attr(out, "width", *width);
            let _ = write!(out, " align=\"{}\" style=\"padding:8px 24px;\">", align.as_str());
            if let Some(link) = link {
                let _ = write!(out, "<a href=\"{}\">", escape_attr(&safe_url(link)));
            }
            let _ = write!(out, "<img src=\"{}\"", escape_attr(&safe_image_src(src)));
            if let Some(alt) = alt {
                let _ = write!(out, " alt=\"{}\"", escape_attr(alt));
            }
            match width {
                Some(w) => {
                    let _ = write!(out, " width=\"{w}\" style=\"display:block;border:0;width:{w}px;max-width:100%;height:auto;\">");
                }
                None => out.push_str(" style=\"display:block;border:0;max-width:100%;height:auto;\">"),
            }
            if link.is_some() {
                out.push_str("</a>");
            }
            out.push_str("</td>");
        }
        Block::Divider { color, thickness } => {
            out.push_str("<td data-block=\"divider\"");
            data_attr(out, "color", color.as_deref());
            data_attr(out, "thickness", *thickness);
            let _ = write!(
                out,
                " style=\"padding:12px 24px;\"><hr style=\"border:0;border-top:{}px solid {};margin:0;\"></td>",
                thickness.unwrap_or(1),
                color_or(color.as_deref(), DEFAULT_DIVIDER_COLOR),
            );
        }
        Block::Spacer { height } => {
            let _ = write!(
                out,
                "<td data-block=\"spacer\" data-height=\"{height}\" height=\"{height}\" style=\"height:{height}px;line-height:{height}px;font-size:0;\">&nbsp;</td>"
            );
        }
        Block::Columns { columns } => {
            out.push_str("<td data-block=\"columns\" style=\"padding:0 12px;\">");
            let _ = write!(out, "<table {TABLE_ATTRS} width=\"100%\"><tr>");
            let shares = column_widths(columns);
            for (column, share) in columns.iter().zip(shares) {
                out.push_str("<td data-column=\"true\"");
                data_attr(out, "width", column.width);
                let _ = write!(out, " width=\"{share}%\" valign=\"top\" style=\"vertical-align:top;\">");
                let _ = write!(out, "<table {TABLE_ATTRS} width=\"100%\">");
                for block in &column.blocks {
                    write_row(out, block);
                }
                out.push_str("</table></td>");
            }
            out.push_str("</tr></table></td>");
        }
        Block::Html { html } => {
            out.push_str("<td data-block=\"html\">");
            out.push_str(html);
            out.push_str("</td>");
        }
    }
}

/// Explicit widths are kept; the remaining percentage is split evenly among the rest.
fn column_widths(columns: &[Column]) -> Vec<u32> {
    let fixed: u32 = columns.iter().filter_map(|c| c.width).map(u32::from).sum();
    let flexible = columns.iter().filter(|c| c.width.is_none()).count() as u32;
    let share = if flexible == 0 {
        0
    } else {
        100u32.saturating_sub(fixed) / flexible
    };
    columns.iter().map(|c| c.width.map_or(share, u32::from)).collect()
}
