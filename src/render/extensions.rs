//! Tree passes for the dialect extensions comrak lacks.
//!
//! Each pass rewrites nodes in place. Nodes that need attributes or whole
//! generated markup are rendered on their own and turned into raw HTML
//! blocks, which comrak then emits verbatim.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use comrak::Options;
use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use regex::Regex;

use super::{Extension, ExtensionSet, RenderError};

static ABBR_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}\*\[([^\]]+)\]:[ \t]*(.*?)[ \t]*$").expect("valid abbreviation regex")
});

static TRAILING_ATTRIBUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[ \t]+)\{(:?)[ \t]*([^{}\n]+?)[ \t]*\}[ \t]*$")
        .expect("valid attribute list regex")
});

/// Markdown with abbreviation definitions removed.
#[derive(Debug)]
pub(super) struct Stripped {
    pub(super) text: String,
    pub(super) abbreviations: Vec<(String, String)>,
}

/// Remove `*[ABBR]: Expansion` lines outside fenced code and collect them.
pub(super) fn strip_abbreviations(text: &str) -> Stripped {
    let mut out = String::with_capacity(text.len());
    let mut abbreviations = Vec::new();
    let mut fence: Option<String> = None;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();

        if let Some(marker) = fence.as_deref() {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            out.push_str(line);
            continue;
        }
        if let Some(marker) = fence_marker(trimmed) {
            fence = Some(marker);
            out.push_str(line);
            continue;
        }
        if let Some(caps) = ABBR_DEFINITION.captures(content) {
            abbreviations.push((caps[1].trim().to_string(), caps[2].to_string()));
            continue;
        }
        out.push_str(line);
    }

    Stripped {
        text: out,
        abbreviations,
    }
}

fn fence_marker(line: &str) -> Option<String> {
    ['`', '~'].into_iter().find_map(|fence_char| {
        let run = line.chars().take_while(|c| *c == fence_char).count();
        (run >= 3).then(|| fence_char.to_string().repeat(run))
    })
}

/// Run every enabled pass over a parsed document.
pub(super) fn apply<'a>(
    root: &'a AstNode<'a>,
    options: &Options,
    extensions: ExtensionSet,
    abbreviations: &[(String, String)],
) -> Result<(), RenderError> {
    let attr_list = extensions.contains(Extension::AttrList);
    let toc = extensions.contains(Extension::Toc);

    // Planning reads heading text before abbreviations turn it into markup.
    let headings = plan_headings(root, attr_list, toc);
    let paragraphs = if attr_list {
        plan_paragraphs(root)
    } else {
        Vec::new()
    };
    let toc_markers = if toc {
        find_toc_markers(root)
    } else {
        Vec::new()
    };

    if !abbreviations.is_empty() {
        expand_abbreviations(root, abbreviations)?;
    }

    for heading in &headings {
        if !heading.attributes.is_empty() {
            let tag = format!("h{}", heading.level);
            splice_block(heading.node, options, &tag, &heading.attributes)?;
        }
    }
    for (node, attributes) in &paragraphs {
        splice_block(node, options, "p", attributes)?;
    }
    if !toc_markers.is_empty() {
        let html = toc_html(&headings);
        for marker in toc_markers {
            replace_with_html_block(marker, html.clone());
        }
    }

    if !extensions.contains(Extension::FencedCode) {
        for node in root.descendants() {
            if let NodeValue::CodeBlock(block) = &mut node.data.borrow_mut().value {
                block.info.clear();
            }
        }
    }
    if extensions.contains(Extension::CodeHilite) {
        highlight_code_blocks(root);
    }
    Ok(())
}

struct PlannedHeading<'a> {
    node: &'a AstNode<'a>,
    level: u8,
    text: String,
    attributes: Attributes,
}

fn plan_headings<'a>(root: &'a AstNode<'a>, attr_list: bool, toc: bool) -> Vec<PlannedHeading<'a>> {
    let mut used_ids = HashSet::new();
    let mut planned = Vec::new();

    for node in root.descendants() {
        let level = match &node.data.borrow().value {
            NodeValue::Heading(heading) => heading.level,
            _ => continue,
        };
        let mut attributes = if attr_list {
            take_trailing_attributes(node).unwrap_or_default()
        } else {
            Attributes::default()
        };
        let text = extract_text(node).trim().to_string();

        if let Some(id) = &attributes.id {
            used_ids.insert(id.clone());
        } else if toc {
            attributes.id = Some(unique_id(&slugify(&text), &mut used_ids));
        }

        planned.push(PlannedHeading {
            node,
            level,
            text,
            attributes,
        });
    }
    planned
}

/// Strip a trailing attribute list from the last text of `node`.
fn take_trailing_attributes<'a>(node: &'a AstNode<'a>) -> Option<Attributes> {
    let last = node.last_child()?;
    let mut data = last.data.borrow_mut();
    let NodeValue::Text(text) = &mut data.value else {
        return None;
    };
    let (rest, attributes) = split_trailing_attributes(text)?;
    *text = rest;
    Some(attributes)
}

fn split_trailing_attributes(text: &str) -> Option<(String, Attributes)> {
    let caps = TRAILING_ATTRIBUTES.captures(text)?;
    let body = caps.get(2)?.as_str();
    let has_colon = !caps[1].is_empty();
    if !has_colon && !body.starts_with(['#', '.']) {
        return None;
    }
    let start = caps.get(0)?.start();
    Some((text[..start].to_string(), Attributes::parse(body)))
}

/// Paragraphs whose last line is only an attribute list.
fn plan_paragraphs<'a>(root: &'a AstNode<'a>) -> Vec<(&'a AstNode<'a>, Attributes)> {
    let mut planned = Vec::new();
    for node in root.descendants() {
        if !matches!(node.data.borrow().value, NodeValue::Paragraph) {
            continue;
        }
        let Some(last) = node.last_child() else {
            continue;
        };
        let Some(previous) = last.previous_sibling() else {
            continue;
        };
        if !matches!(previous.data.borrow().value, NodeValue::SoftBreak) {
            continue;
        }
        let attributes = match &last.data.borrow().value {
            NodeValue::Text(text) => match split_trailing_attributes(text) {
                Some((rest, attributes)) if rest.trim().is_empty() => attributes,
                _ => continue,
            },
            _ => continue,
        };
        last.detach();
        previous.detach();
        planned.push((node, attributes));
    }
    planned
}

fn find_toc_markers<'a>(root: &'a AstNode<'a>) -> Vec<&'a AstNode<'a>> {
    root.descendants()
        .filter(|node| matches!(node.data.borrow().value, NodeValue::Paragraph))
        .filter(|node| extract_text(node).trim() == "[TOC]")
        .collect()
}

fn toc_html(headings: &[PlannedHeading<'_>]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for heading in headings {
        let Some(id) = &heading.attributes.id else {
            continue;
        };
        match open.last() {
            Some(&top) if heading.level <= top => {
                while open.len() > 1 && heading.level <= open[open.len() - 2] {
                    open.pop();
                    html.push_str("</li>\n</ul>\n");
                }
                html.push_str("</li>\n");
                if let Some(top) = open.last_mut() {
                    *top = heading.level;
                }
            }
            _ => {
                html.push_str("<ul>\n");
                open.push(heading.level);
            }
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(id),
            escape_html(&heading.text)
        ));
    }
    for _ in open {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>\n");
    html
}

fn expand_abbreviations<'a>(
    root: &'a AstNode<'a>,
    abbreviations: &[(String, String)],
) -> Result<(), RenderError> {
    let titles: HashMap<&str, &str> = abbreviations
        .iter()
        .map(|(abbr, title)| (abbr.as_str(), title.as_str()))
        .collect();
    let mut terms: Vec<&str> = titles.keys().copied().collect();
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
        .map_err(|err| RenderError::Capability(err.to_string()))?;

    let text_nodes: Vec<_> = root
        .descendants()
        .filter(|node| matches!(node.data.borrow().value, NodeValue::Text(_)))
        .filter(|node| {
            !node
                .ancestors()
                .any(|ancestor| matches!(ancestor.data.borrow().value, NodeValue::Image(_)))
        })
        .collect();

    for node in text_nodes {
        let replaced = match &node.data.borrow().value {
            NodeValue::Text(text) => wrap_abbreviations(text, &pattern, &titles),
            _ => None,
        };
        if let Some(html) = replaced {
            node.data.borrow_mut().value = NodeValue::HtmlInline(html);
        }
    }
    Ok(())
}

fn wrap_abbreviations(text: &str, pattern: &Regex, titles: &HashMap<&str, &str>) -> Option<String> {
    let mut html = String::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        let title = titles.get(found.as_str())?;
        html.push_str(&escape_html(&text[last..found.start()]));
        html.push_str(&format!(
            "<abbr title=\"{}\">{}</abbr>",
            escape_html(title),
            escape_html(found.as_str())
        ));
        last = found.end();
    }
    if last == 0 {
        return None;
    }
    html.push_str(&escape_html(&text[last..]));
    Some(html)
}

fn highlight_code_blocks<'a>(root: &'a AstNode<'a>) {
    let blocks: Vec<_> = root
        .descendants()
        .filter(|node| matches!(node.data.borrow().value, NodeValue::CodeBlock(_)))
        .collect();
    for node in blocks {
        let highlighted = match &node.data.borrow().value {
            NodeValue::CodeBlock(block) => {
                let language = block.info.split_whitespace().next();
                crate::highlight::highlight_html(language, &block.literal)
            }
            _ => None,
        };
        if let Some(html) = highlighted {
            replace_with_html_block(node, format!("<div class=\"codehilite\">{html}</div>\n"));
        }
    }
}

/// Render `node` alone, add `attributes` to its opening tag, and replace it
/// with the result.
fn splice_block<'a>(
    node: &'a AstNode<'a>,
    options: &Options,
    tag: &str,
    attributes: &Attributes,
) -> Result<(), RenderError> {
    let mut buffer = Vec::new();
    comrak::format_html(node, options, &mut buffer)?;
    let html = String::from_utf8(buffer).map_err(|err| RenderError::Capability(err.to_string()))?;
    let open_tag = format!("<{tag}>");
    let html = match html.strip_prefix(&open_tag) {
        Some(rest) => format!("<{tag}{}>{rest}", attributes.to_html()),
        // Tight list items render paragraphs without a tag to attach to.
        None => html,
    };
    replace_with_html_block(node, html);
    Ok(())
}

fn replace_with_html_block<'a>(node: &'a AstNode<'a>, html: String) {
    let children: Vec<_> = node.children().collect();
    for child in children {
        child.detach();
    }
    node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
        block_type: 6,
        literal: html,
    });
}

fn extract_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    extract_text_recursive(node, &mut text);
    text
}

fn extract_text_recursive<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => text.push_str(t),
        NodeValue::Code(code) => text.push_str(&code.literal),
        NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
        _ => {
            for child in node.children() {
                extract_text_recursive(child, text);
            }
        }
    }
}

/// Attributes from a `{: #id .class key=value}` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Attributes {
    id: Option<String>,
    classes: Vec<String>,
    pairs: Vec<(String, String)>,
}

impl Attributes {
    fn parse(body: &str) -> Self {
        let mut attributes = Self::default();
        for token in tokenize_attributes(body) {
            if let Some(id) = token.strip_prefix('#') {
                attributes.id = Some(id.to_string());
            } else if let Some(class) = token.strip_prefix('.') {
                attributes.classes.push(class.to_string());
            } else if let Some((key, value)) = token.split_once('=') {
                let value = value.trim_matches(['"', '\'']);
                attributes.pairs.push((key.to_string(), value.to_string()));
            } else {
                attributes.pairs.push((token.clone(), token));
            }
        }
        attributes
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.classes.is_empty() && self.pairs.is_empty()
    }

    fn to_html(&self) -> String {
        let mut html = String::new();
        if let Some(id) = &self.id {
            html.push_str(&format!(" id=\"{}\"", escape_html(id)));
        }
        if !self.classes.is_empty() {
            html.push_str(&format!(" class=\"{}\"", escape_html(&self.classes.join(" "))));
        }
        for (key, value) in &self.pairs {
            html.push_str(&format!(" {}=\"{}\"", escape_html(key), escape_html(value)));
        }
        html
    }
}

/// Split on whitespace, keeping quoted values together.
fn tokenize_attributes(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in body.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                current.push(ch);
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

fn unique_id(base: &str, used: &mut HashSet<String>) -> String {
    let mut id = base.to_string();
    let mut n = 1;
    while used.contains(&id) {
        id = format!("{base}_{n}");
        n += 1;
    }
    used.insert(id.clone());
    id
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
