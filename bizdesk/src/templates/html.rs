//! A small, forgiving HTML tokenizer and tree builder.
//!
//! Good enough for email markup and editor output: void elements, implicit closes for the common
//! cases (`p`, `li`, table parts), comments, raw-text `script`/`style`, and character references.
//! Malformed input never fails; unmatched end tags are ignored and open elements close at EOF.

use std::borrow::Cow;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Start tags that implicitly close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "div", "dl", "fieldset", "figure", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            name: name.to_string(),
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Depth-first search for the first descendant matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        serialize(&self.children)
    }

    /// CSS declarations of the `style` attribute, property names lowercased.
    pub fn style(&self) -> Vec<(String, String)> {
        self.attr("style").map(parse_style).unwrap_or_default()
    }

    pub fn style_value(&self, property: &str) -> Option<String> {
        self.style().into_iter().find(|(k, _)| k == property).map(|(_, v)| v)
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if !RAW_TEXT_ELEMENTS.contains(&e.name.as_str()) => collect_text(&e.children, out),
            _ => {}
        }
    }
}

pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Split markup into tokens. Doctypes and processing instructions are skipped.
pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    let flush_text = |tokens: &mut Vec<Token>, from: usize, to: usize| {
        if to > from {
            tokens.push(Token::Text(decode_entities(&input[from..to]).into_owned()));
        }
    };

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &input[i..];
        let next = bytes.get(i + 1).copied();

        if rest.starts_with("<!--") {
            flush_text(&mut tokens, text_start, i);
            let body_start = i + 4;
            let (body_end, resume) = match input[body_start..].find("-->") {
                Some(off) => (body_start + off, body_start + off + 3),
                None => (bytes.len(), bytes.len()),
            };
            tokens.push(Token::Comment(input[body_start..body_end].to_string()));
            i = resume;
            text_start = i;
        } else if matches!(next, Some(b'!') | Some(b'?')) {
            flush_text(&mut tokens, text_start, i);
            i = input[i..].find('>').map_or(bytes.len(), |off| i + off + 1);
            text_start = i;
        } else if next == Some(b'/') && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic) {
            flush_text(&mut tokens, text_start, i);
            let name_start = i + 2;
            let name_end = scan_name(bytes, name_start);
            let name = input[name_start..name_end].to_ascii_lowercase();
            i = input[name_end..].find('>').map_or(bytes.len(), |off| name_end + off + 1);
            tokens.push(Token::EndTag { name });
            text_start = i;
        } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
            flush_text(&mut tokens, text_start, i);
            let (token, resume) = read_start_tag(input, i + 1);
            i = resume;
            let raw_text_name = match &token {
                Token::StartTag { name, self_closing: false, .. } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => {
                    Some(name.clone())
                }
                _ => None,
            };
            tokens.push(token);

            if let Some(name) = raw_text_name {
                let close = format!("</{name}");
                let end = find_ignore_case(&input[i..], &close).map_or(bytes.len(), |off| i + off);
                if end > i {
                    tokens.push(Token::Text(input[i..end].to_string()));
                }
                i = input[end..].find('>').map_or(bytes.len(), |off| end + off + 1);
                tokens.push(Token::EndTag { name });
            }
            text_start = i;
        } else {
            // A lone '<' is text
            i += 1;
        }
    }
    flush_text(&mut tokens, text_start, bytes.len());
    tokens
}

fn scan_name(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b':' | b'_')) {
        i += 1;
    }
    i
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

/// Read a start tag whose name begins at `start`. Returns the token and the index after `>`.
fn read_start_tag(input: &str, start: usize) -> (Token, usize) {
    let bytes = input.as_bytes();
    let name_end = scan_name(bytes, start);
    let name = input[start..name_end].to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    let mut i = name_end;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                i += 1;
                if bytes.get(i) == Some(&b'>') {
                    self_closing = true;
                    i += 1;
                    break;
                }
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        if i == attr_start {
            // Stray '=' with no name
            i += 1;
            continue;
        }
        let attr_name = input[attr_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let mut value = String::new();
        if bytes.get(j) == Some(&b'=') {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            match bytes.get(j) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let value_start = j + 1;
                    let value_end = input[value_start..]
                        .find(quote as char)
                        .map_or(bytes.len(), |off| value_start + off);
                    value = decode_entities(&input[value_start..value_end]).into_owned();
                    i = (value_end + 1).min(bytes.len());
                }
                Some(_) => {
                    let value_start = j;
                    while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    value = decode_entities(&input[value_start..j]).into_owned();
                    i = j;
                }
                None => i = j,
            }
        }

        if !attrs.iter().any(|(k, _)| *k == attr_name) {
            attrs.push((attr_name, value));
        }
    }

    (
        Token::StartTag {
            name,
            attrs,
            self_closing,
        },
        i,
    )
}

struct TreeBuilder {
    /// `stack[0]` is the synthetic root and is never popped.
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Element::new("#root", Vec::new())],
        }
    }

    fn append(&mut self, node: Node) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    fn pop(&mut self) {
        if self.stack.len() > 1
            && let Some(el) = self.stack.pop()
        {
            self.append(Node::Element(el));
        }
    }

    fn close_to(&mut self, index: usize) {
        while self.stack.len() > index.max(1) {
            self.pop();
        }
    }

    /// Index of the nearest open `names` element, not looking past any `boundaries`.
    fn find_open(&self, names: &[&str], boundaries: &[&str]) -> Option<usize> {
        for (index, el) in self.stack.iter().enumerate().skip(1).rev() {
            if names.contains(&el.name.as_str()) {
                return Some(index);
            }
            if boundaries.contains(&el.name.as_str()) {
                return None;
            }
        }
        None
    }

    fn implicit_close(&mut self, name: &str) {
        let target = match name {
            "li" => self.find_open(&["li"], &["ul", "ol", "table"]),
            "dd" | "dt" => self.find_open(&["dd", "dt"], &["dl", "table"]),
            "tr" => self.find_open(&["tr"], &["table"]),
            "td" | "th" => self.find_open(&["td", "th"], &["tr", "table"]),
            "thead" | "tbody" | "tfoot" => self.find_open(&["thead", "tbody", "tfoot"], &["table"]),
            "option" => self.find_open(&["option"], &["select"]),
            _ => None,
        };
        if let Some(index) = target {
            self.close_to(index);
        }
        if CLOSES_P.contains(&name)
            && let Some(index) = self.find_open(&["p"], &["table", "td", "th", "button"])
        {
            self.close_to(index);
        }
    }

    fn start(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool) {
        self.implicit_close(&name);
        let element = Element::new(&name, attrs);
        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            self.append(Node::Element(element));
        } else {
            self.stack.push(element);
        }
    }

    fn end(&mut self, name: &str) {
        if let Some(index) = self.find_open(&[name], &[]) {
            self.close_to(index);
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_to(1);
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }
}

/// Build a node forest from markup. Works for whole documents and fragments alike.
pub fn parse(input: &str) -> Vec<Node> {
    let mut builder = TreeBuilder::new();
    for token in tokenize(input) {
        match token {
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => builder.start(name, attrs, self_closing),
            Token::EndTag { name } => builder.end(&name),
            Token::Text(text) => builder.append(Node::Text(text)),
            Token::Comment(text) => builder.append(Node::Comment(text)),
        }
    }
    builder.finish()
}

pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        serialize_node(node, false, &mut out);
    }
    out
}

pub fn serialize_element(element: &Element) -> String {
    let mut out = String::new();
    write_element(element, &mut out);
    out
}

fn serialize_node(node: &Node, raw: bool, out: &mut String) {
    match node {
        Node::Text(t) if raw => out.push_str(t),
        Node::Text(t) => out.push_str(&escape_text(t)),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Element(e) => write_element(e, out),
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&element.name.as_str()) {
        return;
    }
    let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
    for child in &element.children {
        serialize_node(child, raw, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

pub fn escape_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn escape_attr(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "bull" => '•',
        "middot" => '·',
        "euro" => '€',
        "pound" => '£',
        _ => return None,
    })
}

/// Decode character references. Unknown or malformed references are left as written.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..].find(';').filter(|&end| end <= 10).and_then(|end| {
            let body = &rest[1..1 + end];
            let ch = if let Some(num) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
            } else if let Some(num) = body.strip_prefix('#') {
                num.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            ch.map(|c| (c, end + 2))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
