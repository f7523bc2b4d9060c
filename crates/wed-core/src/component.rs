//! Component source parsing.
//!
//! A component file (`*.wed.html`) is made of up to three top-level blocks:
//!
//! ```html
//! <html type="static">...</html>
//! <style>...</style>
//! <script require="icon tooltip" preload type="module">...</script>
//! ```
//!
//! Block bodies are kept verbatim. Only the markup is checked for
//! well-formedness since it is later compiled as a template and inlined into
//! pages.

use std::{fmt, sync::LazyLock};

use quick_xml::{Reader, events::Event};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::COMPONENT_CLASS;

/// Component parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The source has no `<html>` block (or an empty one).
    #[error("component '{name}' has no 'html' block")]
    MissingMarkup { name: String },

    /// A block type appears more than once.
    #[error("component '{name}' declares <{tag}> more than once")]
    DuplicateBlock { name: String, tag: String },

    /// The `type` attribute of the markup block is not recognized.
    #[error(
        "component '{name}' has invalid 'type' attribute '{value}', allowed only 'static' (default), 'dynamic' and 'hybrid'"
    )]
    InvalidType { name: String, value: String },

    /// The `type` attribute of the script block is not recognized.
    #[error(
        "component '{name}' has unsupported module type '{value}', allowed only 'text/javascript' (default) or 'module'"
    )]
    InvalidModuleKind { name: String, value: String },

    /// The source or its markup is not well formed.
    #[error("malformed '{name}' component: {message}")]
    MalformedMarkup { name: String, message: String },
}

/// Result type for component parsing.
pub type Result<T> = std::result::Result<T, ComponentError>;

/// How a component reaches the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Inlined into the page markup.
    #[default]
    Static,
    /// Shipped as a `<template>` and instantiated at runtime.
    Dynamic,
    /// Both inlined and shipped as a `<template>`.
    Hybrid,
}

impl ComponentKind {
    /// Parse the value of a markup `type` attribute.
    ///
    /// An empty value means [`ComponentKind::Static`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim_matches(['"', '\'']).to_ascii_lowercase().as_str() {
            "" | "static" => Some(Self::Static),
            "dynamic" => Some(Self::Dynamic),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Whether the component can be inlined into page markup.
    #[must_use]
    pub fn is_static(self) -> bool {
        matches!(self, Self::Static | Self::Hybrid)
    }

    /// Whether the component ships a runtime `<template>`.
    #[must_use]
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic | Self::Hybrid)
    }

    /// Attribute value for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script module kind, emitted as the `type` of `<script>` tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleKind {
    /// `text/javascript`
    #[default]
    Classic,
    /// `module`
    EsModule,
}

impl ModuleKind {
    /// Parse a script `type` value. `ecma` is accepted as an alias of `module`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim_matches(['"', '\'']).to_ascii_lowercase().as_str() {
            "" | "text/javascript" => Some(Self::Classic),
            "module" | "ecma" => Some(Self::EsModule),
            _ => None,
        }
    }

    /// Attribute value for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "text/javascript",
            Self::EsModule => "module",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ModuleKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| {
            format!("unsupported module type '{value}', allowed only 'text/javascript' or 'module'")
        })
    }
}

impl From<ModuleKind> for String {
    fn from(kind: ModuleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A parsed component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Unique name across the site, taken from the file name.
    pub name: String,

    /// Inner markup of the `<html>` block.
    pub html: String,

    /// Inner text of the `<style>` block.
    pub style: Option<String>,

    /// Inner text of the `<script>` block.
    pub script: Option<String>,

    /// Names of the required components, in declaration order.
    pub requires: Vec<String>,

    /// Rendering kind.
    pub kind: ComponentKind,

    /// Load the script eagerly instead of deferring it.
    pub preload: bool,

    /// Module kind override; the site default applies when unset.
    pub module: Option<ModuleKind>,
}

impl Component {
    /// Parse one component source.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let blocks = split_blocks(&name, source)?;

        let mut component = Self {
            name,
            html: String::new(),
            style: None,
            script: None,
            requires: Vec::new(),
            kind: ComponentKind::Static,
            preload: false,
            module: None,
        };

        for block in blocks {
            match block.tag {
                BlockTag::Html => {
                    if let Some(value) = block.attr("type") {
                        component.kind =
                            ComponentKind::parse(value).ok_or_else(|| ComponentError::InvalidType {
                                name: component.name.clone(),
                                value: value.to_string(),
                            })?;
                    }
                    component.html = block.inner.to_string();
                }
                BlockTag::Style => component.style = Some(block.inner.to_string()),
                BlockTag::Script => {
                    if let Some(value) = block.attr("require") {
                        component.requires = value.split_whitespace().map(str::to_string).collect();
                    }
                    if let Some(value) = block.attr("preload") {
                        component.preload = value.is_empty() || value.eq_ignore_ascii_case("true");
                    }
                    if let Some(value) = block.attr("type") {
                        let module = ModuleKind::parse(value).ok_or_else(|| {
                            ComponentError::InvalidModuleKind {
                                name: component.name.clone(),
                                value: value.to_string(),
                            }
                        })?;
                        component.module = Some(module);
                    }
                    component.script = Some(block.inner.to_string());
                }
            }
        }

        if component.html.trim().is_empty() {
            return Err(ComponentError::MissingMarkup {
                name: component.name,
            });
        }

        check_markup(&component.html).map_err(|message| ComponentError::MalformedMarkup {
            name: component.name.clone(),
            message,
        })?;

        Ok(component)
    }

    /// Whether the component has a non-empty style block.
    #[must_use]
    pub fn has_style(&self) -> bool {
        self.style.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Whether the component has a non-empty script block.
    #[must_use]
    pub fn has_script(&self) -> bool {
        self.script.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Module kind of the script, falling back to the site default.
    #[must_use]
    pub fn module_or(&self, default: ModuleKind) -> ModuleKind {
        self.module.unwrap_or(default)
    }

    /// CSS class identifying the component wrapper.
    #[must_use]
    pub fn class_name(&self) -> String {
        format!("{}-component", self.name)
    }

    /// Style scoped under the component wrapper selector.
    #[must_use]
    pub fn wrapped_style(&self) -> Option<String> {
        if !self.has_style() {
            return None;
        }
        let style = self.style.as_deref().unwrap_or_default();
        Some(format!(
            ".{}.{COMPONENT_CLASS} {{\n{}\n}}\n",
            self.class_name(),
            style.trim_matches('\n')
        ))
    }

    /// Markup wrapped for inline use.
    #[must_use]
    pub fn wrapped_static_html(&self) -> String {
        format!(
            r#"<div class="{} {COMPONENT_CLASS}">{}</div>"#,
            self.class_name(),
            self.html
        )
    }

    /// Markup wrapped in a `<template>` for runtime instantiation.
    #[must_use]
    pub fn wrapped_dynamic_html(&self) -> String {
        format!(
            r#"<template id="{class}"><div class="{class} {COMPONENT_CLASS}">{html}</div></template>"#,
            class = self.class_name(),
            html = self.html
        )
    }

    /// Render the component back to its source form.
    #[must_use]
    pub fn to_source(&self) -> String {
        let mut out = format!(r#"<html type="{}">{}</html>"#, self.kind, self.html);

        if let Some(style) = &self.style {
            out.push_str("\n<style>");
            out.push_str(style);
            out.push_str("</style>");
        }

        if let Some(script) = &self.script {
            out.push_str("\n<script");
            if !self.requires.is_empty() {
                out.push_str(&format!(r#" require="{}""#, self.requires.join(" ")));
            }
            if self.preload {
                out.push_str(" preload");
            }
            if let Some(module) = self.module {
                out.push_str(&format!(r#" type="{module}""#));
            }
            out.push('>');
            out.push_str(script);
            out.push_str("</script>");
        }

        out
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c<{}>{}{:?}", self.kind, self.name, self.requires)?;
        let js = if self.has_script() { "js" } else { "" };
        let css = if self.has_style() { "css" } else { "" };
        write!(f, "{{{js}|{css}}}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockTag {
    Html,
    Style,
    Script,
}

impl BlockTag {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "html" => Some(Self::Html),
            "style" => Some(Self::Style),
            "script" => Some(Self::Script),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Style => "style",
            Self::Script => "script",
        }
    }

    fn closing(self) -> &'static Regex {
        static HTML: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)</html\s*>").expect("valid regex"));
        static STYLE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)</style\s*>").expect("valid regex"));
        static SCRIPT: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)</script\s*>").expect("valid regex"));

        match self {
            Self::Html => &HTML,
            Self::Style => &STYLE,
            Self::Script => &SCRIPT,
        }
    }
}

/// One top-level block of a component source.
#[derive(Debug)]
struct Block<'a> {
    tag: BlockTag,
    attrs: Vec<(String, String)>,
    inner: &'a str,
}

impl Block<'_> {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<([A-Za-z][A-Za-z0-9-]*)((?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?)>"#)
        .expect("valid regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});

/// Split a component source into its top-level blocks.
fn split_blocks<'a>(name: &str, source: &'a str) -> Result<Vec<Block<'a>>> {
    let malformed = |message: String| ComponentError::MalformedMarkup {
        name: name.to_string(),
        message,
    };

    let mut blocks: Vec<Block<'a>> = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];

        let Some(lt) = rest.find('<') else {
            break;
        };
        let rest = &rest[lt..];
        pos += lt;

        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or_else(|| malformed("unterminated comment".to_string()))?;
            pos += end + 3;
            continue;
        }

        if let Some(close) = rest.strip_prefix("</") {
            let tag: String = close
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            return Err(malformed(format!("cannot close <{tag}> tag, missing opening")));
        }

        let Some(caps) = OPEN_TAG.captures(rest) else {
            // A lone '<' in free text.
            pos += 1;
            continue;
        };

        let tag_name = &caps[1];
        let tag = BlockTag::from_name(tag_name).ok_or_else(|| {
            malformed(format!(
                "unallowed tag <{tag_name}> allowed only: 'html', 'style', 'script'"
            ))
        })?;

        if blocks.iter().any(|b| b.tag == tag) {
            return Err(ComponentError::DuplicateBlock {
                name: name.to_string(),
                tag: tag.as_str().to_string(),
            });
        }

        let open_len = caps[0].len();
        let raw_attrs = caps.get(2).map_or("", |m| m.as_str()).trim();
        let (raw_attrs, self_closing) = match raw_attrs.strip_suffix('/') {
            Some(attrs) => (attrs, true),
            None => (raw_attrs, false),
        };
        let attrs = parse_attrs(raw_attrs);

        let body_start = pos + open_len;
        let (inner, next) = if self_closing {
            ("", body_start)
        } else {
            let found = tag
                .closing()
                .find(&source[body_start..])
                .ok_or_else(|| malformed(format!("unclosed <{}> tag", tag.as_str())))?;
            (
                &source[body_start..body_start + found.start()],
                body_start + found.end(),
            )
        };

        blocks.push(Block { tag, attrs, inner });
        pos = next;
    }

    Ok(blocks)
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (key, value.to_string())
        })
        .collect()
}

/// Elements that never have a closing tag in HTML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Check that tags in the markup nest and close properly.
fn check_markup(markup: &str) -> std::result::Result<(), String> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut open: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
                if !VOID_ELEMENTS.contains(&tag.as_str()) {
                    open.push(tag);
                }
            }
            Ok(Event::End(end)) => {
                let tag = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    continue;
                }
                match open.pop() {
                    Some(expected) if expected == tag => {}
                    Some(expected) => {
                        return Err(format!("expected </{expected}> but found </{tag}>"));
                    }
                    None => return Err(format!("cannot close </{tag}>, missing opening")),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(format!("at byte {}: {err}", reader.error_position()));
            }
        }
    }

    match open.pop() {
        Some(tag) => Err(format!("unclosed <{tag}> tag")),
        None => Ok(()),
    }
}
