//! Second-pass directives.
//!
//! After components are expanded, a page may still contain directives inside
//! `{!{ ... }!}`:
//!
//! - `import "styles"`, `import "scripts"`, `import "dynamics"` place the
//!   collected imports (`import("styles")` is accepted too)
//! - `page "blog/index.html"` moves the page's output location

use std::fmt;

use crate::helpers::{Result, TemplateError};

const OPEN: &str = "{!{";
const CLOSE: &str = "}!}";

/// Which collected fragment an `import` directive places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Styles,
    Scripts,
    Dynamics,
}

impl ImportKind {
    /// Parse an `import` value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "styles" => Ok(Self::Styles),
            "scripts" => Ok(Self::Scripts),
            "dynamics" => Ok(Self::Dynamics),
            other => Err(TemplateError::UnknownImport(other.to_string())),
        }
    }

    /// Directive value for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Dynamics => "dynamics",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three fragments substituted by `import` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imports {
    pub styles: String,
    pub scripts: String,
    pub dynamics: String,
}

impl Imports {
    fn get(&self, kind: ImportKind) -> &str {
        match kind {
            ImportKind::Styles => &self.styles,
            ImportKind::Scripts => &self.scripts,
            ImportKind::Dynamics => &self.dynamics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Import(ImportKind),
}

/// A page after expansion, split around its second-pass directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTemplate {
    segments: Vec<Segment>,
    location: Option<String>,
}

impl ImportTemplate {
    /// Parse the directives of an expanded page.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut location = None;
        let mut pos = 0;

        while let Some(start) = source[pos..].find(OPEN) {
            let start = pos + start;
            let end = source[start..].find(CLOSE).ok_or_else(|| {
                TemplateError::InvalidDirective(format!("unclosed {OPEN} delimiter"))
            })?;
            let end = start + end + CLOSE.len();

            if start > pos {
                segments.push(Segment::Text(source[pos..start].to_string()));
            }

            let body = source[start + OPEN.len()..end - CLOSE.len()].trim();
            let (directive, argument) = split_directive(body)?;
            match directive {
                "import" => segments.push(Segment::Import(ImportKind::parse(&argument)?)),
                "page" => location = Some(argument),
                other => {
                    return Err(TemplateError::InvalidDirective(format!(
                        "\"{other}\" is not a directive, expected import or page"
                    )));
                }
            }

            pos = end;
        }

        if pos < source.len() {
            segments.push(Segment::Text(source[pos..].to_string()));
        }

        Ok(Self { segments, location })
    }

    /// Output location set by a `page` directive, the last one wins.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Whether the page places the given import.
    #[must_use]
    pub fn uses(&self, kind: ImportKind) -> bool {
        self.segments.contains(&Segment::Import(kind))
    }

    /// Substitute the collected imports.
    #[must_use]
    pub fn render(&self, imports: &Imports) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Import(kind) => out.push_str(imports.get(*kind)),
            }
        }
        out
    }
}

fn split_directive(body: &str) -> Result<(&str, String)> {
    let name_end = body
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(body.len());
    let (name, rest) = body.split_at(name_end);
    if name.is_empty() {
        return Err(TemplateError::InvalidDirective("empty directive".to_string()));
    }

    let mut argument = rest.trim();
    if let Some(inner) = argument
        .strip_prefix('(')
        .and_then(|a| a.strip_suffix(')'))
    {
        argument = inner.trim();
    }

    let unquoted = ['"', '\'', '`'].iter().find_map(|q| {
        argument
            .strip_prefix(*q)
            .and_then(|a| a.strip_suffix(*q))
    });

    match unquoted {
        Some(value) if argument.len() >= 2 => Ok((name, value.to_string())),
        _ => Err(TemplateError::InvalidDirective(format!(
            "{name} expects one quoted argument, got `{argument}`"
        ))),
    }
}
