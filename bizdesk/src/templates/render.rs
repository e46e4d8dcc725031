//! Merge-field rendering for template subjects and bodies.

use super::{
    html::decode_entities,
    sanitize::{safe_image_src, safe_url},
};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

static URL_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\s(href|src)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid url attribute regex")
});

#[derive(Debug, thiserror::Error)]
#[error("could not render template {part}: {message}")]
pub struct RenderError {
    pub part: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

fn environment(escape_html: bool, strict: bool) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(if strict {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Chainable
    });
    let escape = if escape_html { AutoEscape::Html } else { AutoEscape::None };
    env.set_auto_escape_callback(move |_| escape.clone());
    env
}

/// Merge fields can place any value in a link or image target, so check them again once filled.
fn scrub_urls(html: &str) -> String {
    URL_ATTR
        .replace_all(html, |caps: &Captures| {
            let raw = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
            let value = decode_entities(raw);
            let checked = if caps[2].eq_ignore_ascii_case("src") {
                safe_image_src(&value)
            } else {
                safe_url(&value)
            };
            if checked == "#" && value.trim() != "#" {
                format!("{}\"#\"", &caps[1])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Fill `{{ ... }}` merge fields. The subject is plain text; the body is HTML-escaped.
///
/// Undefined variables render as empty strings unless `strict` is set, in which case they fail.
/// Link and image targets in the rendered body fall back to `#` when a value made them unsafe.
pub fn render<S: Serialize>(subject: &str, html: &str, context: &S, strict: bool) -> Result<Rendered, RenderError> {
    let subject = environment(false, strict)
        .render_str(subject, context)
        .map_err(|e| RenderError {
            part: "subject",
            message: e.to_string(),
        })?;
    let html = environment(true, strict)
        .render_str(html, context)
        .map_err(|e| RenderError {
            part: "body",
            message: e.to_string(),
        })?;
    Ok(Rendered {
        subject,
        html: scrub_urls(&html),
    })
}
